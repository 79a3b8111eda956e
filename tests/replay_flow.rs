mod common;

use std::time::Duration;

use handpose_quiz::game::GameSettings;
use handpose_quiz::geometry::Point;
use handpose_quiz::replay::{self, ReplayOptions};
use tokio::sync::broadcast;

use common::fixtures::{hand_frame_line, ms, one_two_three};

const ZONES: [Point; 3] = [
    Point { x: 160.0, y: 120.0 },
    Point { x: 320.0, y: 120.0 },
    Point { x: 480.0, y: 120.0 },
];
const AWAY: Point = Point { x: 320.0, y: 400.0 };

fn settings() -> GameSettings {
    GameSettings {
        mirror: false,
        cooldown: ms(300),
        ..GameSettings::default()
    }
}

fn recording_text() -> String {
    let mut lines = vec![
        hand_frame_line(0, ZONES[0]),
        hand_frame_line(200, AWAY),
        hand_frame_line(1200, ZONES[1]),
        hand_frame_line(1400, AWAY),
        hand_frame_line(2400, ZONES[2]),
        hand_frame_line(2600, AWAY),
    ];
    lines.push(r#"{"atMs":2700,"type":"detectorError","message":"camera busy"}"#.to_string());
    lines.push(r#"{"atMs":3000,"type":"key","key":"s"}"#.to_string());
    lines.push(r#"{"atMs":3100,"type":"key","key":"x"}"#.to_string());
    lines.push(hand_frame_line(3600, AWAY));
    lines.join("\n")
}

fn options(capture_dir: &std::path::Path) -> ReplayOptions {
    ReplayOptions {
        frame_interval: Duration::from_millis(10),
        paced: false,
        capture_dir: capture_dir.to_path_buf(),
        seed: Some(7),
    }
}

#[tokio::test]
async fn replay_touches_each_option_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("session.jsonl");
    std::fs::write(&path, recording_text()).expect("write recording");

    let recording = replay::load_recording(&path).expect("load");
    let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let capture_dir = dir.path().join("captures");

    let summary = replay::run(settings(), one_two_three(), recording, options(&capture_dir), shutdown_rx)
        .await
        .expect("replay");

    assert!(!summary.interrupted);
    assert_eq!(summary.hits, 3);
    assert_eq!(summary.correct + summary.incorrect + summary.ignored, 3);
    assert!(summary.score >= 1);
    assert_eq!(summary.score, summary.correct);
    assert!(summary.detector_failures >= 1);
    assert!(summary.frames > 360);

    assert_eq!(summary.captures.len(), 1);
    let saved = std::fs::read_to_string(&summary.captures[0]).expect("capture file");
    let json: serde_json::Value = serde_json::from_str(&saved).expect("capture json");
    assert_eq!(json["frameTimeMs"], 3000);
    assert_eq!(json["score"].as_u64(), Some(u64::from(summary.score)));
}

#[tokio::test]
async fn replay_stops_on_shutdown_signal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let recording = replay::parse_recording(&recording_text()).expect("parse");
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    shutdown_tx.send(()).expect("send shutdown");

    let summary = replay::run(settings(), one_two_three(), recording, options(dir.path()), shutdown_rx)
        .await
        .expect("replay");

    assert!(summary.interrupted);
    assert_eq!(summary.frames, 0);
    assert_eq!(summary.score, 0);
}
