//! Contracts for the sensors and effectors the orchestrator drives.
//!
//! Implementations live in `guard-vision` (camera, classifier) and `guard-voice`
//! (listeners, announcers); the LLM synthesizer lives in [`crate::synthesizer`].
//! Every blocking method takes an explicit timeout or is bounded by its client.

use crate::error::GuardResult;
use crate::types::{Frame, Heard, Label, PromptContext};
use std::time::Duration;

/// Camera handle. Owned by the orchestrator for its lifetime; dropping it releases the device.
pub trait FrameSource: Send {
    /// Capture one frame. Any error here is treated as a device failure.
    fn read_frame(&mut self) -> GuardResult<Frame>;
}

/// Turns a frame into identity labels. Returns an empty list when no face is found.
pub trait IdentityClassifier: Send + Sync {
    fn classify(&self, frame: &Frame) -> GuardResult<Vec<Label>>;
}

/// Transcribes one spoken command, waiting at most `timeout` for speech to start.
pub trait CommandListener: Send + Sync {
    /// `Ok(None)` on timeout or unintelligible speech.
    fn listen_command(&self, timeout: Duration) -> GuardResult<Option<String>>;
}

/// Listens for any of `keywords` for up to `timeout`.
pub trait KeywordSpotter: Send + Sync {
    /// Returns the matched keyword, or `None` when the window closes without a match.
    fn listen_keyword(&self, keywords: &[String], timeout: Duration) -> GuardResult<Option<String>>;

    /// Same listen, also reporting whether any speech was heard. Spotters that can tell
    /// speech from silence should override this; the default only knows about matches.
    fn listen(&self, keywords: &[String], timeout: Duration) -> GuardResult<Heard> {
        let keyword = self.listen_keyword(keywords, timeout)?;
        Ok(Heard {
            speech_detected: keyword.is_some(),
            keyword,
            last_phrase_started: None,
        })
    }
}

/// Phrases an escalation warning.
pub trait MessageSynthesizer: Send + Sync {
    fn generate(&self, context: &PromptContext) -> GuardResult<String>;
}

/// Fire-and-forget speech output. Must return as soon as the utterance is dispatched.
pub trait VoiceAnnouncer: Send + Sync {
    fn speak(&self, text: &str);
}
