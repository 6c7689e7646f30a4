//! # Guard Core - room guard orchestration engine
//!
//! Watches a camera feed through an [`IdentityClassifier`], escalates verbal warnings
//! against unrecognized visitors, and stays voice-controllable (arm, emergency stop).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      GuardOrchestrator                       │
//! │  FrameSource → IdentityClassifier → EscalationMachine        │
//! │                                          │                   │
//! │                    MessageSynthesizer ◄──┘                   │
//! │                                          ↓                   │
//! │  CommandListener / KeywordSpotter     Cooldown → Announcer   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sensors and effectors are traits in [`collaborators`]; `guard-vision` and
//! `guard-voice` provide the concrete adapters.

pub mod collaborators;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod escalation;
pub mod orchestrator;
pub mod synthesizer;
pub mod types;

pub use collaborators::{
    CommandListener, FrameSource, IdentityClassifier, KeywordSpotter, MessageSynthesizer,
    VoiceAnnouncer,
};
pub use config::{AnnouncerKind, Credentials, GuardConfig, StopAction};
pub use cooldown::Cooldown;
pub use error::{GuardError, GuardResult};
pub use escalation::{EscalationMachine, GuardState, FALLBACK_MESSAGE};
pub use orchestrator::{Collaborators, CycleReport, CycleStats, GuardOrchestrator, OrchestratorConfig};
pub use synthesizer::LlmSynthesizer;
pub use types::{
    DetectionEvent, EscalationMessage, Frame, Heard, Label, PromptContext, WarningTier,
};
