//! End-to-end tests of the frame pipeline: raw sensor JSON in, ticks out.

use leap_gesture_agent::classifier::Classifier;
use leap_gesture_agent::config::{Config, ConfigError};
use leap_gesture_agent::core::window::WindowTensor;
use leap_gesture_agent::core::{
    unpack_frame, DerivedFeatureSet, Hand, OneHandedFeature, RefreshPolicy, TwoHandedFeature,
    UnpackContext,
};
use leap_gesture_agent::error::ClassifierError;
use leap_gesture_agent::params::ParameterSet;
use leap_gesture_agent::sensor::RawFrame;
use leap_gesture_agent::{Session, TickStatus};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

const GESTURES: [&str; 3] = ["no_gesture", "wave", "pinch"];

/// Records every window it is asked to classify.
struct Probe {
    shape: (usize, usize),
    seen: Arc<Mutex<Vec<WindowTensor>>>,
}

impl Classifier for Probe {
    fn input_shape(&self) -> (usize, usize) {
        self.shape
    }

    fn predict(&mut self, window: &WindowTensor) -> Result<Vec<f32>, ClassifierError> {
        self.seen.lock().unwrap().push(window.clone());
        Ok(vec![0.1, 0.7, 0.2])
    }
}

fn params_with(voi: &[&str]) -> ParameterSet {
    let mut params = ParameterSet {
        voi: voi.iter().map(|s| s.to_string()).collect(),
        voi_drop: Vec::new(),
        derived: DerivedFeatureSet {
            one_handed: vec![
                OneHandedFeature::InterfingerDistances,
                OneHandedFeature::PalmSpeed,
            ],
            two_handed: vec![TwoHandedFeature::PalmDistance],
        },
        gestures: GESTURES.iter().map(|s| s.to_string()).collect(),
        ..ParameterSet::default()
    };
    for name in params.expected_schema(&Hand::BOTH).names() {
        params.means.insert(name.clone(), 0.0);
        params.stds.insert(name.clone(), 1.0);
    }
    params
}

fn params() -> ParameterSet {
    params_with(&["palmPosition_0", "palmPosition_1", "palmPosition_2", "grabStrength"])
}

fn config(sequence_length: usize) -> Config {
    let mut config = Config::default();
    config.pipeline.frame_stride = 1;
    config.model.sequence_length = sequence_length;
    config
}

fn hand(tag: &str, id: i64, t: f64) -> Value {
    let x = if tag == "left" { -80.0 } else { 80.0 };
    json!({
        "type": tag,
        "id": id,
        "grabStrength": t / 100.0,
        "palmPosition": [x + t, 200.0, 0.0],
        "palmNormal": [0.0, -1.0, 0.0],
        "palmVelocity": [10.0 * t, 0.0, 0.0],
    })
}

fn fingers(hand_id: i64, t: f64) -> Vec<Value> {
    (0..5)
        .map(|finger| {
            json!({
                "type": finger,
                "handId": hand_id,
                "extended": true,
                "tipPosition": [20.0 * finger as f64 + t, 250.0, 0.0],
            })
        })
        .collect()
}

/// A sensor frame at step `t` with the chosen hands.
fn raw_frame(t: usize, left: bool, right: bool, timestamp: Option<i64>) -> RawFrame {
    serde_json::from_value(frame_json(t, left, right, timestamp)).unwrap()
}

fn frame_json(t: usize, left: bool, right: bool, timestamp: Option<i64>) -> Value {
    let t = t as f64;
    let mut hands = Vec::new();
    let mut pointables = Vec::new();
    if left {
        hands.push(hand("left", 1, t));
        pointables.extend(fingers(1, t));
    }
    if right {
        hands.push(hand("right", 2, t));
        pointables.extend(fingers(2, t));
    }
    let mut value = json!({
        "currentFrameRate": 110.0,
        "hands": hands,
        "pointables": pointables,
    });
    if let Some(ts) = timestamp {
        value["timestamp"] = json!(ts);
    }
    value
}

/// Two hands at step `t`, neither reporting `grabStrength`.
fn frame_without_grab(t: usize) -> RawFrame {
    let mut value = frame_json(t, true, true, None);
    for hand in value["hands"].as_array_mut().unwrap() {
        hand.as_object_mut().unwrap().remove("grabStrength");
    }
    serde_json::from_value(value).unwrap()
}

fn tick(session: &mut Session, t: usize, left: bool, right: bool) -> leap_gesture_agent::TickReport {
    let flat = unpack_frame(&raw_frame(t, left, right, None), &UnpackContext::default());
    session.tick(flat).unwrap()
}

#[test]
fn test_thirty_frames_yield_one_prediction() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let params = params();
    let features = params.expected_schema(&Hand::BOTH).len();
    // 8 predictors, 2 x 4 fingertip gaps, 2 palm speeds, 1 palm distance
    assert_eq!(features, 19);

    let probe = Probe {
        shape: (25, features),
        seen: seen.clone(),
    };
    let mut session = Session::new(&config(25), &params, Some(Box::new(probe))).unwrap();

    let predictions: Vec<usize> = (1..=30)
        .filter(|&t| tick(&mut session, t, true, true).prediction.is_some())
        .collect();
    assert_eq!(predictions, vec![25]);

    let windows = seen.lock().unwrap();
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].shape(), (25, 19));

    // oldest row is the first frame, newest the 25th
    let grab = session.schema().index_of("left_grabStrength").unwrap();
    assert!((windows[0].row(0)[grab] - 0.01).abs() < 1e-6);
    assert!((windows[0].row(24)[grab] - 0.25).abs() < 1e-6);
}

#[test]
fn test_prediction_is_labelled_and_accepted() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe {
        shape: (5, 19),
        seen,
    };
    let mut session = Session::new(&config(5), &params(), Some(Box::new(probe))).unwrap();

    let report = (1..=5).map(|t| tick(&mut session, t, true, true)).last().unwrap();
    let prediction = report.prediction.unwrap();
    assert_eq!(prediction.label, "wave");
    assert!(prediction.accepted);
    assert!((prediction.probability - 0.7).abs() < 1e-6);
}

#[test]
fn test_missing_hand_is_filled_from_last_complete_frame() {
    let mut session = Session::new(&config(25), &params(), None).unwrap();
    for t in 1..=5 {
        assert_eq!(tick(&mut session, t, true, true).status, TickStatus::Tracking);
    }

    for t in 6..=8 {
        let report = tick(&mut session, t, false, true);
        assert_eq!(report.status, TickStatus::HandMissing);
        assert_eq!(report.frames_recorded, t as u64);

        let resolved = report.resolved.unwrap();
        assert_eq!(resolved.filled, vec![Hand::Left]);
        // left hand frozen at frame 5, right hand current
        assert_eq!(resolved.frame.get("left_palmPosition_0"), Some(-75.0));
        assert_eq!(resolved.frame.get("right_palmPosition_0"), Some(80.0 + t as f64));
    }
}

#[test]
fn test_no_hands_at_start() {
    let mut session = Session::new(&config(25), &params(), None).unwrap();

    let report = tick(&mut session, 1, false, true);
    assert_eq!(report.status, TickStatus::WaitingForHands);
    assert!(report.resolved.is_none());

    let report = session.tick(None).unwrap();
    assert_eq!(report.status, TickStatus::WaitingForHands);
    assert!(!session.schema_fixed());

    let report = tick(&mut session, 2, true, true);
    assert_eq!(report.status, TickStatus::Tracking);
    assert_eq!(report.frames_recorded, 1);
    assert!(session.schema_fixed());
}

#[test]
fn test_break_delays_next_prediction() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe {
        shape: (10, 19),
        seen: seen.clone(),
    };
    let mut session = Session::new(&config(10), &params(), Some(Box::new(probe))).unwrap();

    for t in 1..=7 {
        assert!(tick(&mut session, t, true, true).prediction.is_none());
    }
    let flat = unpack_frame(&frame_without_grab(8), &UnpackContext::default());
    let report = session.tick(flat).unwrap();
    assert_eq!(report.status, TickStatus::Incomplete);
    assert_eq!(report.frames_recorded, 0);

    let predicted_at: Vec<usize> = (1..=10)
        .filter(|&t| tick(&mut session, 100 + t, true, true).prediction.is_some())
        .collect();
    assert_eq!(predicted_at, vec![10]);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(session.stats().snapshot().continuity_breaks, 1);
}

#[test]
fn test_empty_frame_mid_run_keeps_the_count() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let probe = Probe {
        shape: (10, 19),
        seen: seen.clone(),
    };
    let mut session = Session::new(&config(10), &params(), Some(Box::new(probe))).unwrap();

    for t in 1..=7 {
        tick(&mut session, t, true, true);
    }
    let report = tick(&mut session, 8, false, false);
    assert_eq!(report.status, TickStatus::Skipped);
    assert_eq!(report.frames_recorded, 7);

    let predicted_at: Vec<usize> = (9..=11)
        .filter(|&t| tick(&mut session, t, true, true).prediction.is_some())
        .collect();
    assert_eq!(predicted_at, vec![11]);
    assert_eq!(seen.lock().unwrap().len(), 1);
    assert_eq!(session.stats().snapshot().continuity_breaks, 0);
}

fn single_hand_run(policy: RefreshPolicy) -> Vec<Option<f64>> {
    let mut config = config(25);
    config.pipeline.refresh_policy = policy;
    let mut session = Session::new(&config, &params(), None).unwrap();
    let ctx = UnpackContext::default();

    let frames = [
        raw_frame(1, true, true, Some(1_000)),
        raw_frame(2, false, true, Some(2_000)),
        raw_frame(3, false, true, None),
        raw_frame(4, false, true, None),
    ];
    frames
        .iter()
        .map(|raw| {
            let report = session.tick(unpack_frame(raw, &ctx)).unwrap();
            assert_ne!(report.status, TickStatus::WaitingForHands);
            report.resolved.and_then(|r| r.frame.get("timestamp"))
        })
        .collect()
}

#[test]
fn test_single_hand_sequence_complete_only() {
    // previous frame stays the last two-handed one
    assert_eq!(
        single_hand_run(RefreshPolicy::CompleteOnly),
        vec![Some(1_000.0), Some(2_000.0), Some(1_000.0), Some(1_000.0)]
    );
}

#[test]
fn test_single_hand_sequence_always_refresh() {
    // previous frame follows every resolved frame
    assert_eq!(
        single_hand_run(RefreshPolicy::Always),
        vec![Some(1_000.0), Some(2_000.0), Some(2_000.0), Some(2_000.0)]
    );
}

#[test]
fn test_schema_mismatch_is_fatal() {
    let params = params_with(&["palmPosition_0", "pinchStrength"]);
    let mut session = Session::new(&config(25), &params, None).unwrap();

    let flat = unpack_frame(&raw_frame(1, true, true, None), &UnpackContext::default());
    match session.tick(flat) {
        Err(ConfigError::SchemaMismatch(diff)) => {
            assert_eq!(diff, vec!["left_pinchStrength", "right_pinchStrength"]);
        }
        other => panic!("expected schema mismatch, got {other:?}"),
    }
}
