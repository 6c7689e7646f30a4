//! Fire-and-forget speech output.
//!
//! Every announcement runs on its own detached tokio task; `speak` returns as soon as the
//! task is spawned and failures are only logged. Overlapping announcements are allowed.

use crate::error::{VoiceError, VoiceResult};
use crate::voice_output::{OpenAiCompatibleTts, TtsBackend, VoiceOutput};
use guard_core::{AnnouncerKind, Credentials, GuardConfig, VoiceAnnouncer};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Upper bound on one external TTS process.
const SPEECH_TIMEOUT: Duration = Duration::from_secs(30);

/// Speaks through an external program: `<command> <args...> <text>`.
pub struct CommandAnnouncer {
    runtime: Handle,
    command: String,
    args: Vec<String>,
}

impl CommandAnnouncer {
    pub fn new(runtime: Handle, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            runtime,
            command: command.into(),
            args,
        }
    }

    /// Spawn the speech task. `None` for blank text.
    pub fn dispatch(&self, text: &str) -> Option<JoinHandle<()>> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let program = self.command.clone();

        Some(self.runtime.spawn(async move {
            if let Err(e) = run_speech_process(command, &program).await {
                warn!("Announcement failed: {}", e);
            }
        }))
    }
}

async fn run_speech_process(mut command: Command, program: &str) -> VoiceResult<()> {
    let child = command
        .spawn()
        .map_err(|e| VoiceError::Tts(format!("Failed to spawn {}: {}", program, e)))?;
    let output = tokio::time::timeout(SPEECH_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| {
            VoiceError::Tts(format!(
                "{} timed out after {} seconds",
                program,
                SPEECH_TIMEOUT.as_secs()
            ))
        })?
        .map_err(|e| VoiceError::Tts(format!("Failed to wait for {}: {}", program, e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoiceError::Tts(format!("{} failed: {}", program, stderr.trim())));
    }
    Ok(())
}

impl VoiceAnnouncer for CommandAnnouncer {
    fn speak(&self, text: &str) {
        if self.dispatch(text).is_some() {
            debug!(%text, "Announcement dispatched");
        }
    }
}

/// Synthesizes through a `TtsBackend` and plays locally with rodio.
pub struct PlaybackAnnouncer {
    runtime: Handle,
    tts: Arc<dyn TtsBackend>,
}

impl PlaybackAnnouncer {
    pub fn new(runtime: Handle, tts: Arc<dyn TtsBackend>) -> Self {
        Self { runtime, tts }
    }

    pub fn dispatch(&self, text: &str) -> Option<JoinHandle<()>> {
        let text = text.trim().to_string();
        if text.is_empty() {
            return None;
        }
        let tts = Arc::clone(&self.tts);
        // rodio's output stream is not Send; it lives and dies on the blocking thread.
        Some(self.runtime.spawn_blocking(move || {
            let result = VoiceOutput::new().and_then(|out| out.speak_blocking(&text, tts.as_ref()));
            if let Err(e) = result {
                warn!("Announcement failed: {}", e);
            }
        }))
    }
}

impl VoiceAnnouncer for PlaybackAnnouncer {
    fn speak(&self, text: &str) {
        if self.dispatch(text).is_some() {
            debug!(%text, "Announcement dispatched");
        }
    }
}

/// Logs what would have been said. For headless runs.
#[derive(Debug, Default)]
pub struct LogAnnouncer;

impl VoiceAnnouncer for LogAnnouncer {
    fn speak(&self, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            info!(%text, "🔊 (silent) announcement");
        }
    }
}

/// Build the announcer selected by `config.announcer`.
pub fn create_announcer(
    config: &GuardConfig,
    credentials: &Credentials,
    runtime: Handle,
) -> VoiceResult<Box<dyn VoiceAnnouncer>> {
    match config.announcer {
        AnnouncerKind::Command => {
            info!(command = %config.tts_command, "Speaking through external TTS command");
            Ok(Box::new(CommandAnnouncer::new(
                runtime,
                config.tts_command.clone(),
                config.tts_args.clone(),
            )))
        }
        AnnouncerKind::Api => {
            let key = credentials.tts_api_key.clone().ok_or_else(|| {
                VoiceError::Config(
                    "announcer = \"api\" requires GUARD_TTS_API_KEY or OPENAI_API_KEY".to_string(),
                )
            })?;
            let tts = OpenAiCompatibleTts::new(
                config.tts_api_url.clone(),
                key,
                config.tts_model.clone(),
                config.llm_timeout(),
            )?
            .with_voice(config.tts_voice.clone());
            info!(model = %tts.model, voice = %tts.voice, "Speaking through TTS API");
            Ok(Box::new(PlaybackAnnouncer::new(runtime, Arc::new(tts))))
        }
        AnnouncerKind::Silent => Ok(Box::new(LogAnnouncer)),
    }
}
