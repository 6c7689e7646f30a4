//! Guard Orchestrator - the control loop
//!
//! A single control thread sequences sensing, fusion, escalation and announcement:
//!
//! ```text
//!  disarmed:  listen_command ──► arm phrase? ──► arm + confirm
//!
//!  armed:     read_frame ─► classify ─► transition ─► cooldown ─► speak (detached)
//!                                                        │
//!             listen(stop word) ◄────────────────────────┘
//!                 └─► stop word + trusted face in this frame? ─► stand down
//! ```
//!
//! The two listen calls are the only suspension points and both carry a timeout. Each cycle
//! is padded to a minimum period so failing collaborators cannot make the loop spin.
//! Escalation state and the cooldown stamp are touched by this thread only.

use crate::collaborators::{
    CommandListener, FrameSource, IdentityClassifier, KeywordSpotter, VoiceAnnouncer,
};
use crate::config::{GuardConfig, StopAction};
use crate::cooldown::{Cooldown, DEFAULT_COOLDOWN};
use crate::error::GuardResult;
use crate::escalation::{EscalationMachine, GuardState, DEFAULT_SILENCE_TIMEOUT};
use crate::types::{DetectionEvent, EscalationMessage, Heard, Label};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const STARTUP_ANNOUNCEMENT: &str = "AI Guard is online. Say 'activate guard' to begin.";
pub const ARMED_ANNOUNCEMENT: &str = "Guard mode activated. I am now monitoring the room.";
pub const STAND_DOWN_ANNOUNCEMENT: &str = "Deactivating guard mode. Standing down.";
pub const SHUTDOWN_ANNOUNCEMENT: &str = "AI Guard is shutting down. Goodbye!";

/// Default lower bound on one loop cycle.
pub const DEFAULT_MIN_CYCLE: Duration = Duration::from_secs(1);

/// Rough speaking time per word for the guard's own voice (espeak talks at ~175 wpm).
const PLAYBACK_PER_WORD: Duration = Duration::from_millis(400);

/// How long an announcement keeps the microphone busy after dispatch.
fn playback_estimate(text: &str) -> Duration {
    PLAYBACK_PER_WORD * text.split_whitespace().count() as u32
}

/// Timing and vocabulary for the control loop.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub arm_phrase: String,
    pub stop_keywords: Vec<String>,
    pub stop_action: StopAction,
    pub command_timeout: Duration,
    pub keyword_timeout: Duration,
    pub silence_timeout: Duration,
    pub cooldown: Duration,
    /// Cycles that finish sooner sleep for the remainder.
    pub min_cycle: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            arm_phrase: "activate guard".to_string(),
            stop_keywords: vec!["stop".to_string()],
            stop_action: StopAction::Disarm,
            command_timeout: Duration::from_secs(5),
            keyword_timeout: Duration::from_secs(8),
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            cooldown: DEFAULT_COOLDOWN,
            min_cycle: DEFAULT_MIN_CYCLE,
        }
    }
}

impl From<&GuardConfig> for OrchestratorConfig {
    fn from(cfg: &GuardConfig) -> Self {
        Self {
            arm_phrase: cfg.arm_phrase.trim().to_lowercase(),
            stop_keywords: cfg
                .stop_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            stop_action: cfg.stop_action,
            command_timeout: cfg.command_timeout(),
            keyword_timeout: cfg.keyword_timeout(),
            silence_timeout: cfg.silence_timeout(),
            cooldown: cfg.cooldown(),
            min_cycle: cfg.min_cycle(),
        }
    }
}

/// The sensors and effectors the loop drives.
pub struct Collaborators {
    pub camera: Box<dyn FrameSource>,
    pub classifier: Box<dyn IdentityClassifier>,
    pub commands: Box<dyn CommandListener>,
    pub keywords: Box<dyn KeywordSpotter>,
    pub announcer: Box<dyn VoiceAnnouncer>,
}

/// Counters reported at shutdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub frames: u64,
    pub messages_dispatched: u64,
    pub messages_suppressed: u64,
    pub collaborator_errors: u64,
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleReport {
    /// Voice standby: the command heard (if any) and whether it armed the guard.
    Standby { command: Option<String>, armed: bool },
    /// One armed detection cycle.
    Armed {
        labels: Vec<Label>,
        message: Option<EscalationMessage>,
        dispatched: bool,
        heard: Heard,
        stood_down: bool,
    },
}

/// Owns the guard state, the cooldown, and the collaborator handles.
pub struct GuardOrchestrator {
    config: OrchestratorConfig,
    machine: EscalationMachine,
    cooldown: Cooldown,
    collaborators: Collaborators,
    intruder_spoke: bool,
    /// Phrases starting before this instant are the guard hearing itself.
    echo_until: Option<Instant>,
    shutdown_requested: bool,
    stats: CycleStats,
}

impl GuardOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        machine: EscalationMachine,
        collaborators: Collaborators,
    ) -> Self {
        let machine = machine.with_silence_timeout(config.silence_timeout);
        let cooldown = Cooldown::new(config.cooldown);
        Self {
            config,
            machine,
            cooldown,
            collaborators,
            intruder_spoke: false,
            echo_until: None,
            shutdown_requested: false,
            stats: CycleStats::default(),
        }
    }

    pub fn state(&self) -> &GuardState {
        self.machine.state()
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    /// True once a stop action asked the loop to end.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Run until `shutdown` is set or a stop action ends the loop. Only camera failures
    /// are returned as errors; the current cycle always completes first.
    pub fn run(&mut self, shutdown: &AtomicBool) -> GuardResult<()> {
        info!(
            arm_phrase = %self.config.arm_phrase,
            stop_keywords = ?self.config.stop_keywords,
            min_cycle_ms = self.config.min_cycle.as_millis() as u64,
            "Guard loop starting"
        );
        self.announce_now(STARTUP_ANNOUNCEMENT);

        let result = loop {
            if shutdown.load(Ordering::SeqCst) || self.shutdown_requested {
                break Ok(());
            }
            let started = Instant::now();
            if let Err(e) = self.run_cycle() {
                error!("Guard loop stopped: {}", e);
                break Err(e);
            }
            let elapsed = started.elapsed();
            if elapsed < self.config.min_cycle {
                std::thread::sleep(self.config.min_cycle - elapsed);
            }
        };

        self.announce_now(SHUTDOWN_ANNOUNCEMENT);
        info!(
            cycles = self.stats.cycles,
            frames = self.stats.frames,
            dispatched = self.stats.messages_dispatched,
            suppressed = self.stats.messages_suppressed,
            collaborator_errors = self.stats.collaborator_errors,
            "Guard loop finished"
        );
        result
    }

    /// Run exactly one cycle (standby or armed, depending on state).
    pub fn run_cycle(&mut self) -> GuardResult<CycleReport> {
        self.stats.cycles += 1;
        if self.machine.is_armed() {
            self.armed_cycle()
        } else {
            Ok(self.standby_cycle())
        }
    }

    fn standby_cycle(&mut self) -> CycleReport {
        let command = match self.collaborators.commands.listen_command(self.config.command_timeout) {
            Ok(command) => command,
            Err(e) => {
                self.stats.collaborator_errors += 1;
                warn!("Command listener failed: {}", e);
                None
            }
        };

        let armed = command
            .as_deref()
            .map(|c| c.to_lowercase().contains(&self.config.arm_phrase))
            .unwrap_or(false);
        if armed {
            info!(command = ?command, "Arm phrase recognized");
            self.machine.arm();
            self.intruder_spoke = false;
            self.announce_now(ARMED_ANNOUNCEMENT);
        } else if let Some(ref c) = command {
            debug!(command = %c, "Ignoring command while disarmed");
        }
        CycleReport::Standby { command, armed }
    }

    fn armed_cycle(&mut self) -> GuardResult<CycleReport> {
        // (a) Frame read failure is fatal.
        let frame = self.collaborators.camera.read_frame()?;
        self.stats.frames += 1;

        // (b)
        let labels = match self.collaborators.classifier.classify(&frame) {
            Ok(labels) => labels,
            Err(e) => {
                self.stats.collaborator_errors += 1;
                warn!("Classifier failed, treating frame as empty: {}", e);
                Vec::new()
            }
        };
        if !labels.is_empty() {
            debug!(labels = ?labels, "Faces in frame");
        }

        // (c)
        let now = Instant::now();
        let message = self.machine.transition(&labels, self.intruder_spoke, now);

        // (d)
        let mut dispatched = false;
        if let Some(ref msg) = message {
            if self.cooldown.try_acquire(now) {
                info!(level = msg.level, text = %msg.text, "Speaking");
                self.speak(&msg.text, now);
                self.stats.messages_dispatched += 1;
                dispatched = true;
            } else {
                self.stats.messages_suppressed += 1;
                debug!(level = msg.level, "Announcement suppressed by cooldown");
                if msg.level == 0 {
                    self.machine.forget_welcome();
                }
            }
        }

        // (e)
        let heard = match self
            .collaborators
            .keywords
            .listen(&self.config.stop_keywords, self.config.keyword_timeout)
        {
            Ok(heard) => heard,
            Err(e) => {
                self.stats.collaborator_errors += 1;
                warn!("Keyword spotter failed: {}", e);
                Heard::nothing()
            }
        };
        self.intruder_spoke = self.machine.state().intruder_present && self.someone_else_spoke(&heard);

        // (f)
        let mut stood_down = false;
        if let Some(ref keyword) = heard.keyword {
            let event = DetectionEvent::new(labels.clone());
            if event.has_known() {
                info!(keyword = %keyword, trusted = ?event.first_known(), "Stop word from trusted identity");
                self.stand_down();
                stood_down = true;
            } else {
                warn!(keyword = %keyword, "Stop word ignored: no trusted identity in frame");
            }
        }

        Ok(CycleReport::Armed {
            labels,
            message,
            dispatched,
            heard,
            stood_down,
        })
    }

    fn stand_down(&mut self) {
        self.machine.disarm();
        self.intruder_spoke = false;
        self.announce_now(STAND_DOWN_ANNOUNCEMENT);
        if self.config.stop_action == StopAction::Shutdown {
            info!("Stop action is shutdown; ending loop after this cycle");
            self.shutdown_requested = true;
        }
    }

    /// Lifecycle announcements bypass the cooldown and do not stamp it.
    fn announce_now(&mut self, text: &str) {
        self.speak(text, Instant::now());
    }

    fn speak(&mut self, text: &str, now: Instant) {
        self.echo_until = Some(now + playback_estimate(text));
        self.collaborators.announcer.speak(text);
    }

    /// Speech counts only if its latest phrase began after our own announcement ended.
    fn someone_else_spoke(&self, heard: &Heard) -> bool {
        if !heard.speech_detected {
            return false;
        }
        match (heard.last_phrase_started, self.echo_until) {
            (Some(started), Some(echo_until)) if started < echo_until => {
                debug!("Ignoring speech that overlapped our own announcement");
                false
            }
            _ => true,
        }
    }
}
