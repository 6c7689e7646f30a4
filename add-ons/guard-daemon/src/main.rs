//! room-guard daemon
//!
//! Loads `.env` and `config/guard.toml`, wires the camera, face gallery, microphone,
//! language model and speech output into a `GuardOrchestrator`, and runs the guard loop
//! on a blocking thread until Ctrl-C.
//!
//! Exit codes: 0 normal shutdown, 1 camera failure, 2 configuration error.

use anyhow::Context;
use guard_core::{
    Collaborators, Credentials, EscalationMachine, GuardConfig, GuardError, GuardOrchestrator,
    LlmSynthesizer, OrchestratorConfig,
};
use guard_vision::{FaceGallery, GalleryClassifier, HttpFaceEmbedder, HttpSnapshotCamera};
use guard_voice::{create_announcer, create_stt, EarConfig, VoiceListener};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EXIT_CAMERA: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[room-guard] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("room-guard stopped: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = GuardConfig::load().context("loading guard configuration")?;
    let credentials = Credentials::from_env().context("reading API credentials")?;
    let grace = config.shutdown_grace();

    tracing::info!(
        camera = %config.camera_url,
        faces_dir = %config.faces_dir.display(),
        announcer = ?config.announcer,
        "room-guard starting"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    let runtime = Handle::current();
    let loop_flag = Arc::clone(&shutdown);

    // The collaborators use blocking HTTP clients, so they are built, run and dropped
    // off the async runtime.
    let mut guard = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut orchestrator = build_orchestrator(&config, &credentials, runtime)?;
        orchestrator.run(&loop_flag)?;
        Ok(())
    });

    let result = tokio::select! {
        res = &mut guard => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("CTRL-C received; finishing the current cycle");
            shutdown.store(true, Ordering::SeqCst);
            guard.await
        }
    };

    // Let the detached shutdown announcement finish speaking.
    tokio::time::sleep(grace).await;
    result.context("guard loop panicked")?
}

fn build_orchestrator(
    config: &GuardConfig,
    credentials: &Credentials,
    runtime: Handle,
) -> anyhow::Result<GuardOrchestrator> {
    let synthesizer = LlmSynthesizer::new(credentials.llm_api_key.clone(), config.llm_timeout())?
        .with_base_url(config.llm_api_url.clone())
        .with_model(config.llm_model.clone());
    tracing::info!(model = %synthesizer.model(), "Message synthesizer ready");

    let camera = HttpSnapshotCamera::open(config.camera_url.clone(), config.camera_timeout())
        .map_err(GuardError::from)
        .context("opening camera")?;

    let embedder = HttpFaceEmbedder::new(config.face_api_url.clone(), config.face_api_timeout())
        .map_err(GuardError::from)?;
    let gallery = FaceGallery::enroll(&config.faces_dir, &embedder)
        .map_err(GuardError::from)
        .context("enrolling known faces")?;
    let classifier = GalleryClassifier::new(gallery, Box::new(embedder), config.match_tolerance);

    let stt = create_stt(config, credentials).map_err(GuardError::from)?;
    let ear = EarConfig {
        phrase_limit: config.command_phrase_limit(),
        ..Default::default()
    };
    let listener = VoiceListener::new(ear, stt)
        .with_keyword_phrase_limit(config.command_phrase_limit());

    let announcer = create_announcer(config, credentials, runtime).map_err(GuardError::from)?;

    let machine = EscalationMachine::new(Box::new(synthesizer));
    Ok(GuardOrchestrator::new(
        OrchestratorConfig::from(config),
        machine,
        Collaborators {
            camera: Box::new(camera),
            classifier: Box::new(classifier),
            commands: Box::new(listener.clone()),
            keywords: Box::new(listener),
            announcer,
        },
    ))
}

/// Camera failures exit 1, configuration problems exit 2.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<GuardError>() {
        Some(GuardError::Config(_)) => EXIT_CONFIG,
        _ => EXIT_CAMERA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_kind() {
        let config: anyhow::Error = GuardError::Config("GROQ_API_KEY missing".into()).into();
        assert_eq!(exit_code(&config), EXIT_CONFIG);

        let camera = anyhow::Error::from(GuardError::Camera("unplugged".into())).context("opening camera");
        assert_eq!(exit_code(&camera), EXIT_CAMERA);

        let wrapped = anyhow::Error::from(GuardError::Config("bad".into())).context("loading");
        assert_eq!(exit_code(&wrapped), EXIT_CONFIG);
    }
}
