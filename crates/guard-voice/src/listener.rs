//! Spoken command and keyword listeners for the guard loop.
//!
//! Each call opens its own listen window, so the microphone is held only while the
//! guard is actually listening.

use crate::ear::{EarConfig, TurnSource, VoiceEar};
use crate::stt::SttBackend;
use guard_core::{CommandListener, GuardResult, Heard, KeywordSpotter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// First keyword (case-insensitive) contained in `text`.
pub fn match_keyword(text: &str, keywords: &[String]) -> Option<String> {
    let text = text.to_lowercase();
    keywords
        .iter()
        .find(|kw| {
            let kw = kw.trim().to_lowercase();
            !kw.is_empty() && text.contains(&kw)
        })
        .cloned()
}

/// Microphone plus transcription, exposed as the guard's command and keyword listeners.
/// Clones share the microphone source and the transcription backend.
#[derive(Clone)]
pub struct VoiceListener {
    source: Arc<dyn TurnSource>,
    stt: Arc<dyn SttBackend>,
    /// Phrase time limit for spoken commands.
    command_phrase_limit: Duration,
    /// Phrase time limit while waiting for a keyword.
    keyword_phrase_limit: Duration,
}

impl VoiceListener {
    /// Listener on the default microphone.
    pub fn new(ear: EarConfig, stt: Box<dyn SttBackend>) -> Self {
        let limit = ear.phrase_limit;
        Self::with_source(Box::new(VoiceEar::new(ear)), stt).with_command_phrase_limit(limit)
    }

    pub fn with_source(source: Box<dyn TurnSource>, stt: Box<dyn SttBackend>) -> Self {
        Self {
            source: Arc::from(source),
            stt: Arc::from(stt),
            command_phrase_limit: Duration::from_secs(4),
            keyword_phrase_limit: Duration::from_secs(4),
        }
    }

    pub fn with_command_phrase_limit(mut self, limit: Duration) -> Self {
        self.command_phrase_limit = limit;
        self
    }

    pub fn with_keyword_phrase_limit(mut self, limit: Duration) -> Self {
        self.keyword_phrase_limit = limit;
        self
    }
}

impl CommandListener for VoiceListener {
    fn listen_command(&self, timeout: Duration) -> GuardResult<Option<String>> {
        let mut window = self.source.open_window(self.command_phrase_limit)?;
        let Some(turn) = window.next_turn(Instant::now() + timeout)? else {
            debug!("No command heard");
            return Ok(None);
        };
        drop(window);

        let text = self.stt.transcribe_turn(&turn)?.trim().to_lowercase();
        if text.is_empty() {
            debug!("Command was unintelligible");
            return Ok(None);
        }
        info!(command = %text, "Heard command");
        Ok(Some(text))
    }
}

impl KeywordSpotter for VoiceListener {
    fn listen_keyword(&self, keywords: &[String], timeout: Duration) -> GuardResult<Option<String>> {
        Ok(self.listen(keywords, timeout)?.keyword)
    }

    fn listen(&self, keywords: &[String], timeout: Duration) -> GuardResult<Heard> {
        let deadline = Instant::now() + timeout;
        let mut window = self.source.open_window(self.keyword_phrase_limit)?;
        let mut heard = Heard::nothing();

        while let Some(turn) = window.next_turn(deadline)? {
            heard.speech_detected = true;
            let now = Instant::now();
            heard.last_phrase_started = Some(now.checked_sub(turn.duration).unwrap_or(now));
            let text = match self.stt.transcribe_turn(&turn) {
                Ok(text) => text,
                Err(e) => {
                    // One bad upload should not close the whole keyword window.
                    warn!("Transcription failed during keyword listen: {}", e);
                    continue;
                }
            };
            debug!(heard = %text, "Keyword window phrase");
            if let Some(keyword) = match_keyword(&text, keywords) {
                info!(%keyword, "Stop keyword heard");
                heard.keyword = Some(keyword);
                break;
            }
        }
        Ok(heard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kws(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn keyword_match_is_case_insensitive_substring() {
        assert_eq!(match_keyword("Please STOP now", &kws(&["stop"])), Some("stop".to_string()));
        assert_eq!(match_keyword("stopping", &kws(&["stop"])), Some("stop".to_string()));
        assert_eq!(match_keyword("go away", &kws(&["stop"])), None);
    }

    #[test]
    fn keyword_match_returns_configured_spelling() {
        assert_eq!(
            match_keyword("okay halt", &kws(&["Stop", "Halt"])),
            Some("Halt".to_string())
        );
    }

    #[test]
    fn blank_keywords_never_match() {
        assert_eq!(match_keyword("anything", &kws(&["", "  "])), None);
        assert_eq!(match_keyword("", &kws(&["stop"])), None);
    }
}
