//! Integration tests for the guard control loop, driven by scripted collaborators.
//!
//! ## Scenarios
//! 1. Standby: the arm phrase arms the guard, anything else does not.
//! 2. Cooldown: a second message inside the window is dropped, bookkeeping still advances.
//!    Lifecycle announcements never hold back the first warning or welcome.
//! 3. Stop word: only honoured when a trusted face is in the same frame.
//! 4. Failure injection: classifier, listener and synthesizer errors never end the loop.
//! 5. Camera failure is fatal.
//! 6. Shutdown: external flag and the `shutdown` stop action.

use guard_core::{
    CommandListener, Collaborators, CycleReport, EscalationMachine, Frame, FrameSource,
    GuardError, GuardOrchestrator, GuardResult, Heard, IdentityClassifier, KeywordSpotter, Label,
    MessageSynthesizer, OrchestratorConfig, PromptContext, StopAction, VoiceAnnouncer,
    FALLBACK_MESSAGE,
};
use guard_core::orchestrator::{
    ARMED_ANNOUNCEMENT, SHUTDOWN_ANNOUNCEMENT, STAND_DOWN_ANNOUNCEMENT, STARTUP_ANNOUNCEMENT,
};
use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Scripted collaborators
// ---------------------------------------------------------------------------

struct ScriptedCamera {
    frames: VecDeque<GuardResult<Frame>>,
}

impl FrameSource for ScriptedCamera {
    fn read_frame(&mut self) -> GuardResult<Frame> {
        self.frames
            .pop_front()
            .unwrap_or_else(|| Ok(Frame::new(vec![0xff, 0xd8], "image/jpeg")))
    }
}

struct ScriptedClassifier {
    results: Mutex<VecDeque<GuardResult<Vec<Label>>>>,
}

impl IdentityClassifier for ScriptedClassifier {
    fn classify(&self, _frame: &Frame) -> GuardResult<Vec<Label>> {
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct ScriptedCommands {
    results: Mutex<VecDeque<GuardResult<Option<String>>>>,
}

impl CommandListener for ScriptedCommands {
    fn listen_command(&self, _timeout: Duration) -> GuardResult<Option<String>> {
        self.results.lock().unwrap().pop_front().unwrap_or(Ok(None))
    }
}

struct ScriptedKeywords {
    results: Mutex<VecDeque<GuardResult<Heard>>>,
}

impl KeywordSpotter for ScriptedKeywords {
    fn listen_keyword(&self, keywords: &[String], timeout: Duration) -> GuardResult<Option<String>> {
        Ok(self.listen(keywords, timeout)?.keyword)
    }

    fn listen(&self, _keywords: &[String], _timeout: Duration) -> GuardResult<Heard> {
        self.results.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Heard::nothing()))
    }
}

#[derive(Clone, Default)]
struct RecordingAnnouncer {
    spoken: Arc<Mutex<Vec<String>>>,
}

impl RecordingAnnouncer {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl VoiceAnnouncer for RecordingAnnouncer {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

struct FixedSynth;

impl MessageSynthesizer for FixedSynth {
    fn generate(&self, context: &PromptContext) -> GuardResult<String> {
        Ok(format!("warning level {}", context.level))
    }
}

struct DownSynth;

impl MessageSynthesizer for DownSynth {
    fn generate(&self, _context: &PromptContext) -> GuardResult<String> {
        Err(GuardError::Synthesizer("503 Service Unavailable".into()))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Script {
    frames: Vec<GuardResult<Frame>>,
    labels: Vec<GuardResult<Vec<Label>>>,
    commands: Vec<GuardResult<Option<String>>>,
    heard: Vec<GuardResult<Heard>>,
    armed: bool,
    failing_synth: bool,
    config: Option<OrchestratorConfig>,
}

fn test_config() -> OrchestratorConfig {
    OrchestratorConfig {
        min_cycle: Duration::ZERO,
        ..Default::default()
    }
}

fn build(script: Script) -> (GuardOrchestrator, RecordingAnnouncer) {
    let announcer = RecordingAnnouncer::default();
    let synth: Box<dyn MessageSynthesizer> = if script.failing_synth {
        Box::new(DownSynth)
    } else {
        Box::new(FixedSynth)
    };
    let mut machine = EscalationMachine::new(synth);
    if script.armed {
        machine.arm();
    }
    let collaborators = Collaborators {
        camera: Box::new(ScriptedCamera {
            frames: script.frames.into(),
        }),
        classifier: Box::new(ScriptedClassifier {
            results: Mutex::new(script.labels.into()),
        }),
        commands: Box::new(ScriptedCommands {
            results: Mutex::new(script.commands.into()),
        }),
        keywords: Box::new(ScriptedKeywords {
            results: Mutex::new(script.heard.into()),
        }),
        announcer: Box::new(announcer.clone()),
    };
    let config = script.config.unwrap_or_else(test_config);
    (GuardOrchestrator::new(config, machine, collaborators), announcer)
}

fn stop_heard() -> GuardResult<Heard> {
    Ok(Heard {
        keyword: Some("stop".to_string()),
        speech_detected: true,
        last_phrase_started: None,
    })
}

// ===========================================================================
// 1. Standby
// ===========================================================================

#[test]
fn arm_phrase_arms_the_guard() {
    let (mut guard, announcer) = build(Script {
        commands: vec![Ok(Some("okay Activate Guard please".to_string()))],
        ..Default::default()
    });

    let report = guard.run_cycle().unwrap();
    assert!(matches!(report, CycleReport::Standby { armed: true, .. }));
    assert!(guard.state().armed);
    assert_eq!(announcer.spoken(), vec![ARMED_ANNOUNCEMENT.to_string()]);
}

#[test]
fn other_commands_and_silence_leave_guard_disarmed() {
    let (mut guard, announcer) = build(Script {
        commands: vec![Ok(Some("what time is it".to_string())), Ok(None)],
        ..Default::default()
    });

    for _ in 0..2 {
        let report = guard.run_cycle().unwrap();
        assert!(matches!(report, CycleReport::Standby { armed: false, .. }));
    }
    assert!(!guard.state().armed);
    assert!(announcer.spoken().is_empty());
    assert_eq!(guard.stats().frames, 0, "no video while disarmed");
}

#[test]
fn command_listener_error_is_absorbed() {
    let (mut guard, _) = build(Script {
        commands: vec![
            Err(GuardError::Listener("microphone busy".into())),
            Ok(Some("activate guard".to_string())),
        ],
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    assert!(!guard.state().armed);
    guard.run_cycle().unwrap();
    assert!(guard.state().armed);
    assert_eq!(guard.stats().collaborator_errors, 1);
}

// ===========================================================================
// 2. Cooldown
// ===========================================================================

#[test]
fn second_message_inside_cooldown_is_dropped() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::Unknown]), Ok(vec![Label::known("harsh")])],
        ..Default::default()
    });

    let first = guard.run_cycle().unwrap();
    match first {
        CycleReport::Armed { message, dispatched, .. } => {
            assert_eq!(message.map(|m| m.level), Some(1));
            assert!(dispatched);
        }
        other => panic!("unexpected report {:?}", other),
    }

    let second = guard.run_cycle().unwrap();
    match second {
        CycleReport::Armed { message, dispatched, .. } => {
            assert!(message.is_some(), "welcome was generated");
            assert!(!dispatched, "but dropped by the cooldown");
        }
        other => panic!("unexpected report {:?}", other),
    }

    // Bookkeeping advanced even though nothing was said.
    assert!(!guard.state().intruder_present);
    assert_eq!(guard.state().escalation_level, 0);
    assert_eq!(guard.state().welcomed, None, "unspoken welcome stays pending");
    assert_eq!(announcer.spoken(), vec!["warning level 1".to_string()]);
    assert_eq!(guard.stats().messages_dispatched, 1);
    assert_eq!(guard.stats().messages_suppressed, 1);
}

#[test]
fn dropped_welcome_is_spoken_once_the_cooldown_clears() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        labels: vec![
            Ok(vec![Label::Unknown]),
            Ok(vec![Label::known("harsh")]),
            Ok(vec![Label::known("harsh")]),
            Ok(vec![Label::known("harsh")]),
        ],
        config: Some(OrchestratorConfig {
            cooldown: Duration::from_millis(50),
            ..test_config()
        }),
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    guard.run_cycle().unwrap();
    std::thread::sleep(Duration::from_millis(60));
    guard.run_cycle().unwrap();
    guard.run_cycle().unwrap();

    let welcome = "Welcome back, harsh. Activating guard mode.".to_string();
    assert_eq!(announcer.spoken(), vec!["warning level 1".to_string(), welcome]);
    assert_eq!(guard.state().welcomed.as_deref(), Some("harsh"));
}

#[test]
fn intruder_in_view_at_arming_hears_the_identity_request() {
    let (mut guard, announcer) = build(Script {
        commands: vec![Ok(Some("activate guard".to_string()))],
        labels: vec![Ok(vec![Label::Unknown])],
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    match guard.run_cycle().unwrap() {
        CycleReport::Armed { message, dispatched, .. } => {
            assert_eq!(message.map(|m| m.level), Some(1));
            assert!(dispatched);
        }
        other => panic!("unexpected report {:?}", other),
    }
    assert_eq!(
        announcer.spoken(),
        vec![ARMED_ANNOUNCEMENT.to_string(), "warning level 1".to_string()]
    );
}

#[test]
fn owner_in_view_at_arming_is_welcomed() {
    let (mut guard, announcer) = build(Script {
        commands: vec![Ok(Some("activate guard".to_string()))],
        labels: vec![Ok(vec![Label::known("harsh")])],
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    guard.run_cycle().unwrap();
    assert_eq!(
        announcer.spoken().last().map(String::as_str),
        Some("Welcome back, harsh. Activating guard mode.")
    );
}

// ===========================================================================
// 3. Stop word
// ===========================================================================

#[test]
fn stop_word_with_trusted_face_stands_down() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::Unknown, Label::known("harsh")])],
        heard: vec![stop_heard()],
        ..Default::default()
    });

    let report = guard.run_cycle().unwrap();
    assert!(matches!(report, CycleReport::Armed { stood_down: true, .. }));
    let state = guard.state();
    assert!(!state.armed);
    assert!(!state.intruder_present);
    assert_eq!(state.escalation_level, 0);
    assert_eq!(announcer.spoken().last().map(String::as_str), Some(STAND_DOWN_ANNOUNCEMENT));
    assert!(!guard.shutdown_requested());
}

#[test]
fn stop_word_from_unknown_only_frame_is_ignored() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::Unknown, Label::Unknown])],
        heard: vec![stop_heard()],
        ..Default::default()
    });

    let report = guard.run_cycle().unwrap();
    assert!(matches!(report, CycleReport::Armed { stood_down: false, .. }));
    assert!(guard.state().armed);
    assert!(guard.state().intruder_present);
    assert_eq!(guard.state().escalation_level, 1);
}

#[test]
fn stop_word_with_empty_frame_is_ignored() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![Ok(Vec::new())],
        heard: vec![stop_heard()],
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    assert!(guard.state().armed);
}

#[test]
fn intruder_speech_holds_escalation() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![
            Ok(vec![Label::Unknown]),
            Ok(vec![Label::Unknown]),
            Ok(vec![Label::Unknown]),
        ],
        heard: vec![
            Ok(Heard {
                keyword: None,
                speech_detected: true,
                last_phrase_started: None,
            }),
            Ok(Heard::nothing()),
        ],
        config: Some(OrchestratorConfig {
            silence_timeout: Duration::ZERO,
            ..test_config()
        }),
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    assert_eq!(guard.state().escalation_level, 1);
    // Speech heard after cycle 1 resets the clock in cycle 2.
    guard.run_cycle().unwrap();
    assert_eq!(guard.state().escalation_level, 1);
    // Silence after cycle 2 lets cycle 3 escalate.
    std::thread::sleep(Duration::from_millis(2));
    guard.run_cycle().unwrap();
    assert_eq!(guard.state().escalation_level, 2);
}

#[test]
fn guard_hearing_its_own_warning_is_not_intruder_speech() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::Unknown]), Ok(vec![Label::Unknown])],
        heard: vec![Ok(Heard {
            keyword: None,
            speech_detected: true,
            last_phrase_started: Some(Instant::now()),
        })],
        config: Some(OrchestratorConfig {
            silence_timeout: Duration::ZERO,
            ..test_config()
        }),
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    std::thread::sleep(Duration::from_millis(2));
    guard.run_cycle().unwrap();
    assert_eq!(guard.state().escalation_level, 2);
}

#[test]
fn speech_after_the_warning_ends_still_holds_escalation() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::Unknown]), Ok(vec![Label::Unknown])],
        heard: vec![Ok(Heard {
            keyword: None,
            speech_detected: true,
            last_phrase_started: Some(Instant::now() + Duration::from_secs(10)),
        })],
        config: Some(OrchestratorConfig {
            silence_timeout: Duration::ZERO,
            ..test_config()
        }),
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    std::thread::sleep(Duration::from_millis(2));
    guard.run_cycle().unwrap();
    assert_eq!(guard.state().escalation_level, 1);
}

#[test]
fn empty_frames_during_an_encounter_do_not_escalate() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        labels: vec![
            Ok(vec![Label::Unknown]),
            Ok(Vec::new()),
            Err(GuardError::Classifier("embedding service timed out".into())),
        ],
        config: Some(OrchestratorConfig {
            silence_timeout: Duration::ZERO,
            cooldown: Duration::ZERO,
            ..test_config()
        }),
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    std::thread::sleep(Duration::from_millis(2));
    guard.run_cycle().unwrap();
    guard.run_cycle().unwrap();
    assert!(guard.state().intruder_present);
    assert_eq!(guard.state().escalation_level, 1);
    assert_eq!(announcer.spoken(), vec!["warning level 1".to_string()]);
}

// ===========================================================================
// 4. Failure injection
// ===========================================================================

#[test]
fn classifier_failure_is_an_empty_frame() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![
            Err(GuardError::Classifier("embedding service timed out".into())),
            Ok(vec![Label::Unknown]),
        ],
        ..Default::default()
    });

    match guard.run_cycle().unwrap() {
        CycleReport::Armed { labels, message, .. } => {
            assert!(labels.is_empty());
            assert!(message.is_none());
        }
        other => panic!("unexpected report {:?}", other),
    }
    guard.run_cycle().unwrap();
    assert_eq!(guard.state().escalation_level, 1);
    assert_eq!(guard.stats().collaborator_errors, 1);
}

#[test]
fn synthesizer_failure_speaks_fallback() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        failing_synth: true,
        labels: vec![Ok(vec![Label::Unknown])],
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    assert_eq!(announcer.spoken(), vec![FALLBACK_MESSAGE.to_string()]);
    assert_eq!(guard.state().escalation_level, 1);
}

#[test]
fn keyword_spotter_failure_is_nothing_heard() {
    let (mut guard, _) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::known("harsh")])],
        heard: vec![Err(GuardError::Listener("stream closed".into()))],
        ..Default::default()
    });

    guard.run_cycle().unwrap();
    assert!(guard.state().armed);
    assert_eq!(guard.stats().collaborator_errors, 1);
}

// ===========================================================================
// 5. Camera failure
// ===========================================================================

#[test]
fn frame_read_failure_is_fatal() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        frames: vec![Err(GuardError::Camera("could not read frame".into()))],
        ..Default::default()
    });

    let shutdown = AtomicBool::new(false);
    let err = guard.run(&shutdown).unwrap_err();
    assert!(err.is_fatal());
    let spoken = announcer.spoken();
    assert_eq!(spoken.first().map(String::as_str), Some(STARTUP_ANNOUNCEMENT));
    assert_eq!(spoken.last().map(String::as_str), Some(SHUTDOWN_ANNOUNCEMENT));
}

// ===========================================================================
// 6. Shutdown
// ===========================================================================

#[test]
fn shutdown_flag_ends_loop_before_first_cycle() {
    let (mut guard, announcer) = build(Script::default());
    let shutdown = AtomicBool::new(true);
    guard.run(&shutdown).unwrap();
    assert_eq!(guard.stats().cycles, 0);
    assert_eq!(
        announcer.spoken(),
        vec![STARTUP_ANNOUNCEMENT.to_string(), SHUTDOWN_ANNOUNCEMENT.to_string()]
    );
}

#[test]
fn shutdown_stop_action_ends_loop_after_stand_down() {
    let (mut guard, announcer) = build(Script {
        armed: true,
        labels: vec![Ok(vec![Label::known("harsh")])],
        heard: vec![stop_heard()],
        config: Some(OrchestratorConfig {
            stop_action: StopAction::Shutdown,
            ..test_config()
        }),
        ..Default::default()
    });

    let shutdown = AtomicBool::new(false);
    guard.run(&shutdown).unwrap();
    assert_eq!(guard.stats().cycles, 1);
    assert!(!guard.state().armed);
    assert!(announcer.spoken().contains(&STAND_DOWN_ANNOUNCEMENT.to_string()));
}
