//! 录制回放
//!
//! 录制文件为 JSON lines，每行一个事件，`atMs` 为会话开始后的毫秒数：
//!
//! ```text
//! {"atMs":0,"type":"frame","width":640,"height":480,"hands":[...],"faces":[...]}
//! {"atMs":120,"type":"click","x":160,"y":120}
//! {"atMs":300,"type":"key","key":"s"}
//! {"atMs":400,"type":"resize","width":1280,"height":960}
//! {"atMs":500,"type":"detectorError","message":"camera busy"}
//! ```
//!
//! `frame` 的坐标默认是视频像素坐标，`"normalized": true` 时为 0..1。
//! 回放按固定帧间隔推进模拟时钟，检测结果经 `DetectionPump` 异步送达。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::{self, BoxFuture, FutureExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::Config;
use crate::detection::{CoordinateSpace, DetectionFrame, EntityKind, RawEntity};
use crate::detector::{DetectRequest, DetectionPump, Detector, DetectorError};
use crate::game::{CommandOutcome, FrameInput, GameSettings, QuizGame, Snapshot};
use crate::geometry::Point;
use crate::input::Command;
use crate::quiz::{QuestionPool, RandRoundRng, Resolution, SessionEvent};
use crate::transform::Size;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read recording {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: invalid entry: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayEntry {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReplayEvent {
    Frame {
        width: f64,
        height: f64,
        #[serde(default)]
        normalized: bool,
        #[serde(default)]
        hands: Vec<RawEntity>,
        #[serde(default)]
        faces: Vec<RawEntity>,
    },
    Key {
        key: String,
    },
    Click {
        x: f64,
        y: f64,
    },
    Resize {
        width: f64,
        height: f64,
    },
    DetectorError {
        message: String,
    },
}

/// 某一时刻检测器的录制输出
#[derive(Debug, Clone)]
pub struct RecordedFrame {
    pub video: Size,
    pub outcome: Result<DetectionFrame, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key(String),
    Click(Point),
    Resize(Size),
}

#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub frames: BTreeMap<u64, RecordedFrame>,
    /// 按时间排序，同一时刻保持文件中的顺序
    pub inputs: Vec<(u64, InputEvent)>,
    pub duration_ms: u64,
}

impl Recording {
    /// 截至 `at_ms` 的最新视频尺寸
    pub fn video_at(&self, at_ms: u64) -> Option<Size> {
        self.frames
            .range(..=at_ms)
            .next_back()
            .map(|(_, frame)| frame.video)
    }
}

pub fn parse_recording(raw: &str) -> Result<Recording, ReplayError> {
    let mut recording = Recording::default();

    for (idx, text) in raw.lines().enumerate() {
        let line = idx + 1;
        if text.trim().is_empty() {
            continue;
        }
        let entry: ReplayEntry =
            serde_json::from_str(text).map_err(|source| ReplayError::Parse { line, source })?;
        recording.duration_ms = recording.duration_ms.max(entry.at_ms);

        match entry.event {
            ReplayEvent::Frame {
                width,
                height,
                normalized,
                hands,
                faces,
            } => {
                let space = if normalized {
                    CoordinateSpace::Normalized
                } else {
                    CoordinateSpace::Pixels { width, height }
                };
                let submitted = hands.len() + faces.len();
                let mut frame = DetectionFrame::from_raw(EntityKind::Hand, space, hands);
                frame
                    .entities
                    .extend(DetectionFrame::from_raw(EntityKind::Face, space, faces).entities);
                if frame.entities.len() < submitted {
                    tracing::warn!(
                        line,
                        dropped = submitted - frame.entities.len(),
                        "Recording frame has malformed entities"
                    );
                }
                recording.frames.insert(
                    entry.at_ms,
                    RecordedFrame {
                        video: Size::new(width, height),
                        outcome: Ok(frame),
                    },
                );
            }
            ReplayEvent::DetectorError { message } => {
                // 检测失败时沿用上一帧的视频尺寸
                let video = recording
                    .video_at(entry.at_ms)
                    .unwrap_or(Size::new(0.0, 0.0));
                recording.frames.insert(
                    entry.at_ms,
                    RecordedFrame {
                        video,
                        outcome: Err(message),
                    },
                );
            }
            ReplayEvent::Key { key } => recording.inputs.push((entry.at_ms, InputEvent::Key(key))),
            ReplayEvent::Click { x, y } => recording
                .inputs
                .push((entry.at_ms, InputEvent::Click(Point::new(x, y)))),
            ReplayEvent::Resize { width, height } => recording
                .inputs
                .push((entry.at_ms, InputEvent::Resize(Size::new(width, height)))),
        }
    }

    recording.inputs.sort_by_key(|(at, _)| *at);
    Ok(recording)
}

pub fn load_recording(path: impl AsRef<Path>) -> Result<Recording, ReplayError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let recording = parse_recording(&raw)?;
    tracing::info!(
        path = %path.display(),
        frames = recording.frames.len(),
        inputs = recording.inputs.len(),
        duration_ms = recording.duration_ms,
        "Recording loaded"
    );
    Ok(recording)
}

/// 以录制数据充当检测器：返回请求时刻之前最近的一帧
pub struct RecordedDetector {
    frames: Arc<BTreeMap<u64, RecordedFrame>>,
}

impl RecordedDetector {
    pub fn new(frames: BTreeMap<u64, RecordedFrame>) -> Self {
        Self {
            frames: Arc::new(frames),
        }
    }
}

impl Detector for RecordedDetector {
    fn detect(&self, request: DetectRequest) -> BoxFuture<'static, Result<DetectionFrame, DetectorError>> {
        let at_ms = u64::try_from(request.at.as_millis()).unwrap_or(u64::MAX);
        let result = match self.frames.range(..=at_ms).next_back() {
            Some((_, recorded)) => recorded
                .outcome
                .clone()
                .map_err(DetectorError::Rejected),
            None => Ok(DetectionFrame::empty(CoordinateSpace::Normalized)),
        };
        future::ready(result).boxed()
    }
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub frame_interval: Duration,
    /// 按帧间隔实时推进；关闭时尽快跑完（测试用）
    pub paced: bool,
    pub capture_dir: PathBuf,
    pub seed: Option<u64>,
}

impl ReplayOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            frame_interval: Duration::from_millis(config.replay.frame_interval_ms.max(1)),
            paced: true,
            capture_dir: PathBuf::from(&config.replay.capture_dir),
            seed: config.quiz.seed,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    pub session_id: String,
    pub frames: u64,
    pub hits: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub ignored: u32,
    pub rounds: u64,
    pub score: u32,
    pub detector_failures: u64,
    pub captures: Vec<PathBuf>,
    pub interrupted: bool,
}

impl ReplaySummary {
    fn record_resolution(&mut self, resolution: &Resolution) {
        match resolution {
            Resolution::Correct { .. } => self.correct += 1,
            Resolution::Incorrect { .. } => self.incorrect += 1,
            Resolution::Ignored => self.ignored += 1,
        }
    }
}

/// 回放一段录制，直到录制结束（留出一个过渡延时 + 冷却时间的尾巴）或收到停止信号
pub async fn run(
    settings: GameSettings,
    pool: QuestionPool,
    recording: Recording,
    options: ReplayOptions,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<ReplaySummary, ReplayError> {
    let session_id = Uuid::new_v4();
    let span = tracing::info_span!("replay", session_id = %session_id);

    async move {
        let mut rng = match options.seed {
            Some(seed) => RandRoundRng(StdRng::seed_from_u64(seed)),
            None => RandRoundRng(StdRng::from_entropy()),
        };
        let tail = settings.quiz.advance_delay + settings.cooldown;
        let end = Duration::from_millis(recording.duration_ms) + tail;
        let fallback_video = settings.canvas;

        let mut game = QuizGame::new(settings, pool, &mut rng, Duration::ZERO);
        let mut pump = DetectionPump::new(RecordedDetector::new(recording.frames.clone()));
        let mut summary = ReplaySummary {
            session_id: session_id.to_string(),
            rounds: 1,
            ..ReplaySummary::default()
        };

        tracing::info!(
            prompt = %game.session().round().prompt,
            instruction = game.ui_text().instruction,
            end_ms = end.as_millis() as u64,
            "Replay started"
        );

        let mut interval = tokio::time::interval(options.frame_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let step_ms = u64::try_from(options.frame_interval.as_millis()).unwrap_or(u64::MAX);
        let mut next_input = 0;
        let mut tick: u64 = 0;

        loop {
            if options.paced {
                tokio::select! {
                    _ = interval.tick() => {}
                    Ok(()) = shutdown_rx.recv() => {
                        summary.interrupted = true;
                        break;
                    }
                }
            } else {
                // 让出执行权，派生的检测任务得以完成
                tokio::task::yield_now().await;
                if matches!(shutdown_rx.try_recv(), Ok(())) {
                    summary.interrupted = true;
                    break;
                }
            }

            let now_ms = tick.saturating_mul(step_ms);
            let now = Duration::from_millis(now_ms);
            if now > end {
                break;
            }
            tick += 1;

            while let Some((at, input)) = recording.inputs.get(next_input) {
                if *at > now_ms {
                    break;
                }
                next_input += 1;
                match input {
                    InputEvent::Click(point) => {
                        let outcome = game.on_click(*point, now);
                        if let Some(hit) = &outcome.hit {
                            summary.hits += 1;
                            tracing::info!(label = %hit.label, correct = hit.correct, at_ms = now_ms, "Click hit");
                        }
                        if let Some(resolution) = &outcome.resolution {
                            summary.record_resolution(resolution);
                        }
                    }
                    InputEvent::Resize(canvas) => {
                        tracing::debug!(width = canvas.width, height = canvas.height, "Canvas resized");
                        game.resize(*canvas);
                    }
                    InputEvent::Key(key) => {
                        let Some(command) = Command::from_key(key) else {
                            tracing::debug!(key = %key, "Unmapped key ignored");
                            continue;
                        };
                        match game.on_command(command, now, Utc::now(), &mut rng) {
                            CommandOutcome::Captured { snapshot } => {
                                match write_capture(&options.capture_dir, &snapshot).await {
                                    Ok(path) => summary.captures.push(path),
                                    Err(e) => tracing::warn!(error = %e, "Failed to write capture"),
                                }
                            }
                            CommandOutcome::Restarted { round_id } => {
                                summary.rounds += 1;
                                tracing::info!(round_id, "Session restarted");
                            }
                            CommandOutcome::Dumped { .. } => {}
                        }
                    }
                }
            }

            let video = recording.video_at(now_ms).unwrap_or(fallback_video);
            pump.request(now, video);
            let latest = pump.latest();

            let outcome = game.on_frame(
                FrameInput {
                    now,
                    video,
                    detection: latest.frame.as_ref(),
                },
                &mut rng,
            );
            summary.frames += 1;

            if let Some(hit) = &outcome.hit {
                summary.hits += 1;
                tracing::info!(label = %hit.label, correct = hit.correct, at_ms = now_ms, "Touch hit");
            }
            if let Some(resolution) = &outcome.resolution {
                summary.record_resolution(resolution);
                tracing::info!(score = outcome.score, ?resolution, "Answer resolved");
            }
            for event in &outcome.events {
                if let SessionEvent::RoundStarted { round_id, prompt } = event {
                    summary.rounds += 1;
                    tracing::info!(round_id, prompt = %prompt, "Round started");
                }
            }
            summary.score = outcome.score;
        }

        summary.score = game.session().score();
        summary.detector_failures = pump.failures();
        tracing::info!(
            frames = summary.frames,
            hits = summary.hits,
            score = summary.score,
            rounds = summary.rounds,
            interrupted = summary.interrupted,
            "Replay finished"
        );
        Ok(summary)
    }
    .instrument(span)
    .await
}

async fn write_capture(dir: &Path, snapshot: &Snapshot) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let name = format!(
        "capture-{}-r{}.json",
        snapshot.captured_at.format("%Y%m%dT%H%M%S%.3f"),
        snapshot.round_id
    );
    let path = dir.join(name);
    let json = serde_json::to_vec_pretty(snapshot)?;
    tokio::fs::write(&path, json).await?;
    tracing::info!(path = %path.display(), "Capture saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_entries_and_skips_blank_lines() {
        let raw = r#"
{"atMs":0,"type":"frame","width":640,"height":480,"hands":[]}

{"atMs":40,"type":"click","x":10,"y":20}
{"atMs":20,"type":"key","key":"r"}
{"atMs":60,"type":"detectorError","message":"busy"}
{"atMs":80,"type":"resize","width":800,"height":600}
"#;
        let rec = parse_recording(raw).expect("parse");
        assert_eq!(rec.frames.len(), 2);
        assert_eq!(rec.duration_ms, 80);
        assert_eq!(rec.inputs.len(), 3);
        assert_eq!(rec.inputs[0], (20, InputEvent::Key("r".into())));
        assert_eq!(rec.inputs[1], (40, InputEvent::Click(Point::new(10.0, 20.0))));
        let failed = rec.frames.get(&60).expect("error frame");
        assert_eq!(failed.video, Size::new(640.0, 480.0));
        assert!(failed.outcome.is_err());
    }

    #[test]
    fn reports_line_of_bad_entry() {
        let raw = "{\"atMs\":0,\"type\":\"key\",\"key\":\"r\"}\n{\"atMs\":\"soon\"}\n";
        let err = parse_recording(raw).expect_err("bad line");
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn malformed_entities_do_not_abort_recording() {
        let hand: Vec<[f64; 2]> = (0..21).map(|i| [i as f64, 10.0]).collect();
        let face: Vec<[f64; 3]> = (0..478).map(|i| [i as f64, 5.0, 0.0]).collect();
        let good = serde_json::json!({
            "atMs": 0, "type": "frame", "width": 640, "height": 480,
            "hands": [[[1, 2], [3, 4]], hand],
        });
        let refined = serde_json::json!({
            "atMs": 16, "type": "frame", "width": 640, "height": 480,
            "faces": [face],
        });
        let raw = format!("{good}\n{refined}\n");

        let rec = parse_recording(&raw).expect("parse");
        let first = rec.frames.get(&0).expect("first frame");
        let kept = first.outcome.as_ref().expect("frame");
        assert_eq!(kept.entities.len(), 1);
        assert_eq!(kept.hands().count(), 1);

        let second = rec.frames.get(&16).expect("second frame");
        assert_eq!(second.outcome.as_ref().expect("frame").faces().count(), 1);
    }

    #[test]
    fn recorded_detector_returns_latest_frame_before_request() {
        let raw = r#"{"atMs":0,"type":"frame","width":640,"height":480}
{"atMs":100,"type":"detectorError","message":"lost"}"#;
        let rec = parse_recording(raw).expect("parse");
        let detector = RecordedDetector::new(rec.frames);
        let video = Size::new(640.0, 480.0);

        let early = tokio_test::block_on(detector.detect(DetectRequest {
            seq: 1,
            at: Duration::from_millis(50),
            video,
        }));
        assert!(early.is_ok());

        let late = tokio_test::block_on(detector.detect(DetectRequest {
            seq: 2,
            at: Duration::from_millis(150),
            video,
        }));
        assert!(matches!(late, Err(DetectorError::Rejected(ref m)) if m == "lost"));
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_recording(dir.path().join("nope.jsonl")).expect_err("missing");
        assert!(matches!(err, ReplayError::Io { .. }));
    }
}
