//! Listener behaviour over scripted listen windows.
//!
//! The microphone is replaced by a `TurnSource` that replays phrases, so these run
//! without audio hardware. The last test uses the real microphone and is ignored.

use chrono::Utc;
use guard_core::{CommandListener, GuardError, KeywordSpotter};
use guard_voice::{
    AudioTurn, EarConfig, PlaceholderStt, SttBackend, TurnSource, TurnWindow, VoiceError,
    VoiceListener, VoiceResult,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn phrase() -> AudioTurn {
    AudioTurn {
        samples: vec![0.2; 4800],
        timestamp: Utc::now(),
        duration: Duration::from_millis(300),
        sample_rate: 16000,
    }
}

/// Replays `phrases` turns, then reports silence until the deadline.
struct ScriptedSource {
    phrases: usize,
    fail_open: bool,
    limits: Arc<Mutex<Vec<Duration>>>,
}

struct ScriptedWindow {
    remaining: usize,
}

impl TurnWindow for ScriptedWindow {
    fn next_turn(&mut self, _start_deadline: Instant) -> VoiceResult<Option<AudioTurn>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Ok(Some(phrase()))
    }
}

impl TurnSource for ScriptedSource {
    fn open_window(&self, phrase_limit: Duration) -> VoiceResult<Box<dyn TurnWindow>> {
        if self.fail_open {
            return Err(VoiceError::AudioDevice("No input device available".to_string()));
        }
        self.limits.lock().unwrap().push(phrase_limit);
        Ok(Box::new(ScriptedWindow {
            remaining: self.phrases,
        }))
    }
}

/// Returns transcripts in order; `Err` entries simulate upload failures.
struct ScriptedStt {
    transcripts: Mutex<VecDeque<Result<String, String>>>,
}

impl ScriptedStt {
    fn new(items: Vec<Result<&str, &str>>) -> Self {
        Self {
            transcripts: Mutex::new(
                items
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
        }
    }
}

impl SttBackend for ScriptedStt {
    fn transcribe_turn(&self, _turn: &AudioTurn) -> VoiceResult<String> {
        match self.transcripts.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(VoiceError::Stt(e)),
            None => Ok(String::new()),
        }
    }
}

fn listener(phrases: usize, stt: impl SttBackend + 'static) -> (VoiceListener, Arc<Mutex<Vec<Duration>>>) {
    let limits = Arc::new(Mutex::new(Vec::new()));
    let source = ScriptedSource {
        phrases,
        fail_open: false,
        limits: Arc::clone(&limits),
    };
    let listener = VoiceListener::with_source(Box::new(source), Box::new(stt))
        .with_command_phrase_limit(Duration::from_secs(4))
        .with_keyword_phrase_limit(Duration::from_secs(3));
    (listener, limits)
}

fn stop() -> Vec<String> {
    vec!["stop".to_string()]
}

#[test]
fn command_is_lowercased_and_trimmed() {
    let (listener, limits) = listener(1, PlaceholderStt::with_response("  Activate Guard "));
    let heard = listener.listen_command(Duration::from_secs(5)).unwrap();
    assert_eq!(heard.as_deref(), Some("activate guard"));
    assert_eq!(*limits.lock().unwrap(), vec![Duration::from_secs(4)]);
}

#[test]
fn command_timeout_is_none() {
    let (listener, _) = listener(0, PlaceholderStt::with_response("activate guard"));
    assert_eq!(listener.listen_command(Duration::from_millis(10)).unwrap(), None);
}

#[test]
fn unintelligible_command_is_none() {
    let (listener, _) = listener(1, PlaceholderStt::new());
    assert_eq!(listener.listen_command(Duration::from_secs(5)).unwrap(), None);
}

#[test]
fn command_transcription_failure_is_listener_error() {
    let (listener, _) = listener(1, ScriptedStt::new(vec![Err("503")]));
    let err = listener.listen_command(Duration::from_secs(5)).unwrap_err();
    assert!(matches!(err, GuardError::Listener(_)));
    assert!(!err.is_fatal());
}

#[test]
fn missing_microphone_is_listener_error() {
    let source = ScriptedSource {
        phrases: 0,
        fail_open: true,
        limits: Arc::new(Mutex::new(Vec::new())),
    };
    let listener = VoiceListener::with_source(Box::new(source), Box::new(PlaceholderStt::new()));
    let err = listener.listen_command(Duration::from_secs(1)).unwrap_err();
    assert!(matches!(err, GuardError::Listener(_)));
}

#[test]
fn keyword_found_in_later_phrase() {
    let (listener, limits) = listener(
        3,
        ScriptedStt::new(vec![Ok("who is there"), Ok("please STOP that"), Ok("never reached")]),
    );
    let heard = listener.listen(&stop(), Duration::from_secs(8)).unwrap();
    assert_eq!(heard.keyword.as_deref(), Some("stop"));
    assert!(heard.speech_detected);
    assert_eq!(*limits.lock().unwrap(), vec![Duration::from_secs(3)]);
}

#[test]
fn speech_without_keyword_is_reported() {
    let (listener, _) = listener(2, ScriptedStt::new(vec![Ok("I live here"), Ok("")]));
    let before = Instant::now();
    let heard = listener.listen(&stop(), Duration::from_secs(8)).unwrap();
    assert_eq!(heard.keyword, None);
    assert!(heard.speech_detected);
    // Phrase start is backdated by the 300ms phrase length.
    let started = heard.last_phrase_started.expect("phrase start recorded");
    assert!(started <= Instant::now() - Duration::from_millis(300));
    assert!(started + Duration::from_millis(300) >= before);
}

#[test]
fn silent_window_hears_nothing() {
    let (listener, _) = listener(0, PlaceholderStt::new());
    let heard = listener.listen(&stop(), Duration::from_millis(10)).unwrap();
    assert_eq!(heard.keyword, None);
    assert!(!heard.speech_detected);
    assert!(heard.last_phrase_started.is_none());
    assert_eq!(listener.listen_keyword(&stop(), Duration::from_millis(10)).unwrap(), None);
}

#[test]
fn transcription_failure_does_not_end_keyword_window() {
    let (listener, _) = listener(2, ScriptedStt::new(vec![Err("timeout"), Ok("stop")]));
    let keyword = listener.listen_keyword(&stop(), Duration::from_secs(8)).unwrap();
    assert_eq!(keyword.as_deref(), Some("stop"));
}

#[test]
#[ignore] // Requires audio hardware
fn microphone_listen_respects_timeout() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let listener = VoiceListener::new(EarConfig::default(), Box::new(PlaceholderStt::new()));
    let started = Instant::now();
    let heard = listener.listen(&stop(), Duration::from_millis(500)).unwrap();
    assert_eq!(heard.keyword, None);
    assert!(started.elapsed() < Duration::from_secs(6));
}
