//! Escalation state machine.
//!
//! Owns [`GuardState`] and is the only place it changes. Each call to
//! [`EscalationMachine::transition`] commits its state change before any message is
//! phrased, so a failing synthesizer can never leave the encounter half-applied.
//!
//! Intruder departure is not a transition: once an encounter starts it persists until a
//! trusted match or an explicit disarm. Frames without an unknown face leave it untouched,
//! so the silence clock only advances against a stranger who is actually in view.

use crate::collaborators::MessageSynthesizer;
use crate::types::{DetectionEvent, EscalationMessage, Label, PromptContext, WarningTier};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Spoken when the synthesizer is unavailable.
pub const FALLBACK_MESSAGE: &str = "I am having trouble thinking right now.";

/// Default silence window before the next escalation step.
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(15);

/// Guard mode and the current intruder encounter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardState {
    pub armed: bool,
    pub intruder_present: bool,
    pub escalation_level: u32,
    /// Last detection/speech/escalation event of the current encounter.
    pub last_event_at: Option<Instant>,
    /// Trusted identity most recently welcomed; keeps the welcome one-time.
    pub welcomed: Option<String>,
}

impl GuardState {
    /// Check the two state invariants. Used by tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let level_implies_intruder = self.escalation_level == 0 || self.intruder_present;
        let disarmed_is_clear =
            self.armed || (self.escalation_level == 0 && !self.intruder_present);
        level_implies_intruder && disarmed_is_clear
    }

    fn clear_encounter(&mut self) {
        self.intruder_present = false;
        self.escalation_level = 0;
        self.last_event_at = None;
    }
}

/// What a transition asked to be said, before phrasing.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Utterance {
    Welcome(String),
    Warning(PromptContext),
}

/// The escalation state machine plus the synthesizer used to phrase its warnings.
pub struct EscalationMachine {
    state: GuardState,
    silence_timeout: Duration,
    synthesizer: Box<dyn MessageSynthesizer>,
}

impl EscalationMachine {
    /// Start disarmed with no encounter.
    pub fn new(synthesizer: Box<dyn MessageSynthesizer>) -> Self {
        Self {
            state: GuardState::default(),
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            synthesizer,
        }
    }

    pub fn with_silence_timeout(mut self, timeout: Duration) -> Self {
        self.silence_timeout = timeout;
        self
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    pub fn arm(&mut self) {
        if !self.state.armed {
            info!("Guard armed");
        }
        self.state.armed = true;
    }

    /// Disarm and forget the current encounter.
    pub fn disarm(&mut self) {
        if self.state.armed {
            info!(level = self.state.escalation_level, "Guard disarmed");
        }
        self.state.armed = false;
        self.state.welcomed = None;
        self.state.clear_encounter();
    }

    /// The last welcome was never spoken, so the same identity may be welcomed again.
    pub fn forget_welcome(&mut self) {
        self.state.welcomed = None;
    }

    /// Feed one detection cycle. Returns at most one message.
    pub fn transition(
        &mut self,
        labels: &[Label],
        intruder_spoke: bool,
        now: Instant,
    ) -> Option<EscalationMessage> {
        let event = DetectionEvent::new(labels.to_vec());
        let utterance = self.apply(&event, intruder_spoke, now);
        debug_assert!(self.state.is_consistent());
        utterance.map(|u| self.phrase(u))
    }

    /// Commit the state change for one cycle and report what should be said.
    fn apply(&mut self, event: &DetectionEvent, intruder_spoke: bool, now: Instant) -> Option<Utterance> {
        if let Some(name) = event.first_known() {
            let name = name.to_string();
            if self.state.intruder_present {
                info!(
                    trusted = %name,
                    level = self.state.escalation_level,
                    "Trusted identity present, standing down encounter"
                );
            }
            self.state.armed = true;
            self.state.clear_encounter();
            if self.state.welcomed.as_deref() == Some(name.as_str()) {
                return None;
            }
            self.state.welcomed = Some(name.clone());
            return Some(Utterance::Welcome(name));
        }

        if !self.state.armed {
            return None;
        }

        // Nobody unrecognized in view: the encounter, if any, is left as it is.
        if !event.has_unknown() {
            return None;
        }

        if !self.state.intruder_present {
            self.state.intruder_present = true;
            self.state.escalation_level = 1;
            self.state.last_event_at = Some(now);
            self.state.welcomed = None;
            warn!("Unrecognized person detected, starting encounter");
            return Some(Utterance::Warning(PromptContext::new(WarningTier::IdentityRequest, 1)));
        }

        if intruder_spoke {
            debug!("Intruder spoke, silence clock reset");
            self.state.last_event_at = Some(now);
            return None;
        }

        let since = self
            .state
            .last_event_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        if since <= self.silence_timeout {
            return None;
        }

        self.state.escalation_level += 1;
        self.state.last_event_at = Some(now);
        let level = self.state.escalation_level;
        warn!(level, silent_for = ?since, "Escalating");
        WarningTier::for_level(level).map(|tier| Utterance::Warning(PromptContext::new(tier, level)))
    }

    fn phrase(&self, utterance: Utterance) -> EscalationMessage {
        match utterance {
            Utterance::Welcome(name) => EscalationMessage::new(
                format!("Welcome back, {}. Activating guard mode.", name),
                0,
            ),
            Utterance::Warning(context) => {
                let text = match self.synthesizer.generate(&context) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(level = context.level, "Message synthesis failed: {}", e);
                        FALLBACK_MESSAGE.to_string()
                    }
                };
                EscalationMessage::new(text, context.level)
            }
        }
    }
}
