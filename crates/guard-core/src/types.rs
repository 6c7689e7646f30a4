//! Shared data types flowing between the sensors, the state machine, and the announcer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Identity label for one face in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// A previously enrolled identity.
    Known(String),
    /// A face that matched no enrolled identity.
    Unknown,
}

impl Label {
    pub fn known(name: impl Into<String>) -> Self {
        Label::Known(name.into())
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Label::Known(_))
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Label::Known(name) => Some(name),
            Label::Unknown => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Known(name) => f.write_str(name),
            Label::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Labels for every face found in one frame, in classifier order. Empty means no face.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionEvent {
    pub labels: Vec<Label>,
}

impl DetectionEvent {
    pub fn new(labels: Vec<Label>) -> Self {
        Self { labels }
    }

    /// First trusted identity in the frame, if any.
    pub fn first_known(&self) -> Option<&str> {
        self.labels.iter().find_map(Label::name)
    }

    pub fn has_known(&self) -> bool {
        self.labels.iter().any(Label::is_known)
    }

    pub fn has_unknown(&self) -> bool {
        self.labels.iter().any(|l| *l == Label::Unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl From<Vec<Label>> for DetectionEvent {
    fn from(labels: Vec<Label>) -> Self {
        Self::new(labels)
    }
}

/// One captured camera frame (encoded image bytes).
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    /// MIME type reported by the source (e.g. `image/jpeg`).
    pub content_type: String,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(data: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            data,
            content_type: content_type.into(),
            captured_at: Utc::now(),
        }
    }
}

/// Outcome of one bounded keyword listen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Heard {
    /// The keyword that matched, if any.
    pub keyword: Option<String>,
    /// True when any phrase was heard during the window, understood or not. The
    /// microphone also picks up the guard's own announcements, so this alone does not
    /// mean someone else spoke; see `last_phrase_started`.
    pub speech_detected: bool,
    /// When the most recent phrase began, if the spotter can tell.
    pub last_phrase_started: Option<Instant>,
}

impl Heard {
    pub fn nothing() -> Self {
        Self::default()
    }
}

/// Warning phrasing tier. Levels 3 and above share the final tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningTier {
    IdentityRequest,
    Firm,
    Final,
}

impl WarningTier {
    /// Tier for an escalation level; `None` for level 0.
    pub fn for_level(level: u32) -> Option<Self> {
        match level {
            0 => None,
            1 => Some(WarningTier::IdentityRequest),
            2 => Some(WarningTier::Firm),
            _ => Some(WarningTier::Final),
        }
    }
}

/// Context handed to the message synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub tier: WarningTier,
    pub level: u32,
}

impl PromptContext {
    pub fn new(tier: WarningTier, level: u32) -> Self {
        Self { tier, level }
    }

    /// Instruction text for the language model.
    pub fn prompt(&self) -> &'static str {
        match self.tier {
            WarningTier::IdentityRequest => {
                "You are a friendly but firm AI room guard. An unrecognized person has entered. \
                 Politely greet them and ask for their identity in a concise way. \
                 Keep it limited to 20 words."
            }
            WarningTier::Firm => {
                "As an AI room guard, the unrecognized person is still present. \
                 Your tone is now more firm. State this is a private area and ask them to leave \
                 if unauthorized. Keep it limited to 20 words."
            }
            WarningTier::Final => {
                "As an AI room guard, the intruder has ignored previous warnings. \
                 Issue a final, stern warning. State that the owner is being notified and they \
                 must leave immediately. Keep it limited to 20 words."
            }
        }
    }
}

/// Text produced by a transition, tagged with the level that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationMessage {
    pub text: String,
    /// Escalation level after the transition (0 for welcome messages).
    pub level: u32,
}

impl EscalationMessage {
    pub fn new(text: impl Into<String>, level: u32) -> Self {
        Self {
            text: text.into(),
            level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_event_fusion_helpers() {
        let event = DetectionEvent::new(vec![Label::Unknown, Label::known("harsh")]);
        assert!(event.has_known());
        assert!(event.has_unknown());
        assert_eq!(event.first_known(), Some("harsh"));

        let empty = DetectionEvent::default();
        assert!(empty.is_empty());
        assert!(!empty.has_known());
        assert!(!empty.has_unknown());
    }

    #[test]
    fn tiers_cap_at_final() {
        assert_eq!(WarningTier::for_level(0), None);
        assert_eq!(WarningTier::for_level(1), Some(WarningTier::IdentityRequest));
        assert_eq!(WarningTier::for_level(2), Some(WarningTier::Firm));
        assert_eq!(WarningTier::for_level(3), Some(WarningTier::Final));
        assert_eq!(WarningTier::for_level(9), Some(WarningTier::Final));
    }

    #[test]
    fn label_display_matches_classifier_vocabulary() {
        assert_eq!(Label::Unknown.to_string(), "Unknown");
        assert_eq!(Label::known("ana").to_string(), "ana");
    }
}
