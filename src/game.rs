//! 帧驱动的问答游戏
//!
//! 每一帧：触发到期的延时事件 → 计算显示变换 → 选出指针（食指指尖或鼻尖）→
//! 命中检测 → 结算答案 → 生成叠加层。检测结果可能比当前视频帧滞后几帧，这里
//! 不做同步，直接使用最近一次可用的结果。

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::constants::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_HIT_COOLDOWN_MS, DEFAULT_HIT_RADIUS};
use crate::content::{UiLanguage, UiText};
use crate::detection::{landmarks, DetectionFrame, EntityKind};
use crate::geometry::Point;
use crate::hit_test::{first_hit, HitEvent, HitState, HitTestEngine};
use crate::input::Command;
use crate::overlay::{self, DrawCommand, OverlayStyle};
use crate::quiz::{
    OptionLayout, QuestionPool, QuizConfig, QuizSession, Resolution, RoundPhase, RoundRng,
    SessionEvent,
};
use crate::transform::{DisplayTransform, Size, Viewport};

/// 指针来源：某只手的关键点，或人脸网格的关键点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PointerSource {
    Hand { landmark: usize },
    Face { landmark: usize },
}

impl Default for PointerSource {
    fn default() -> Self {
        Self::Hand {
            landmark: landmarks::INDEX_FINGER_TIP,
        }
    }
}

impl FromStr for PointerSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index_tip" | "index" => Ok(Self::Hand {
                landmark: landmarks::INDEX_FINGER_TIP,
            }),
            "thumb_tip" | "thumb" => Ok(Self::Hand {
                landmark: landmarks::THUMB_TIP,
            }),
            "nose_tip" | "nose" => Ok(Self::Face {
                landmark: landmarks::FACE_NOSE_TIP,
            }),
            other => Err(format!("unknown pointer source: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameSettings {
    pub canvas: Size,
    pub mirror: bool,
    pub hit_radius: f64,
    pub cooldown: Duration,
    pub quiz: QuizConfig,
    pub pointer: PointerSource,
    pub overlay: OverlayStyle,
    pub language: UiLanguage,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            canvas: Size::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT),
            mirror: true,
            hit_radius: DEFAULT_HIT_RADIUS,
            cooldown: Duration::from_millis(DEFAULT_HIT_COOLDOWN_MS),
            quiz: QuizConfig::default(),
            pointer: PointerSource::default(),
            overlay: OverlayStyle::default(),
            language: UiLanguage::default(),
        }
    }
}

/// 单帧输入
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// 会话开始以来的时间
    pub now: Duration,
    /// 当前视频帧尺寸
    pub video: Size,
    /// 最近一次可用的检测结果，没有则为 `None`
    pub detection: Option<&'a DetectionFrame>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutcome {
    pub pointer: Option<Point>,
    pub hovered: Option<usize>,
    pub hit: Option<HitEvent>,
    pub resolution: Option<Resolution>,
    /// 本帧作答的提示文案（答对 / 再试一次）
    pub feedback: Option<&'static str>,
    pub events: Vec<SessionEvent>,
    pub score: u32,
    pub round_id: u64,
    pub prompt: String,
    pub options: Vec<String>,
    pub phase: RoundPhase,
    /// 显示变换不可用（视频或画布尺寸为零），本帧未做坐标映射
    pub mapping_skipped: bool,
    pub overlay: Vec<DrawCommand>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    pub hit: Option<HitEvent>,
    pub resolution: Option<Resolution>,
    pub feedback: Option<&'static str>,
}

/// 拍照指令保存的会话快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub frame_time_ms: u64,
    pub score: u32,
    pub round_id: u64,
    pub prompt: String,
    pub options: Vec<String>,
    pub phase: RoundPhase,
    pub pointer: Option<Point>,
    pub hit_state: HitState,
    pub transform: Option<DisplayTransform>,
    pub detection: Option<DetectionFrame>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum CommandOutcome {
    Restarted { round_id: u64 },
    Captured { snapshot: Box<Snapshot> },
    Dumped { entities: usize },
}

pub struct QuizGame {
    settings: GameSettings,
    viewport: Viewport,
    hit: HitTestEngine,
    session: QuizSession,
    last_detection: Option<DetectionFrame>,
    last_pointer: Option<Point>,
    frames: u64,
}

impl QuizGame {
    pub fn new<R: RoundRng + ?Sized>(
        settings: GameSettings,
        pool: QuestionPool,
        rng: &mut R,
        now: Duration,
    ) -> Self {
        let layout = OptionLayout::row(settings.canvas, settings.hit_radius);
        let session = QuizSession::new(pool, layout, settings.quiz.clone(), rng, now);
        Self {
            viewport: Viewport::new(settings.canvas, settings.mirror),
            hit: HitTestEngine::new(settings.cooldown),
            session,
            settings,
            last_detection: None,
            last_pointer: None,
            frames: 0,
        }
    }

    pub fn session(&self) -> &QuizSession {
        &self.session
    }

    pub fn hit_engine(&self) -> &HitTestEngine {
        &self.hit
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn ui_text(&self) -> UiText {
        UiText::for_language(self.settings.language)
    }

    pub fn set_language(&mut self, language: UiLanguage) {
        self.settings.language = language;
    }

    pub fn set_overlay_style(&mut self, style: OverlayStyle) {
        self.settings.overlay = style;
    }

    fn feedback(&self, resolution: Option<&Resolution>) -> Option<&'static str> {
        let text = self.ui_text();
        match resolution? {
            Resolution::Correct { .. } => Some(text.correct),
            Resolution::Incorrect { .. } => Some(text.incorrect),
            Resolution::Ignored => None,
        }
    }

    /// 画布尺寸变化：重算变换并重新排布选项位置
    pub fn resize(&mut self, canvas: Size) {
        self.settings.canvas = canvas;
        self.viewport.resize_canvas(canvas);
        self.session
            .set_layout(OptionLayout::row(canvas, self.settings.hit_radius));
    }

    pub fn on_frame<R: RoundRng + ?Sized>(&mut self, input: FrameInput<'_>, rng: &mut R) -> FrameOutcome {
        self.frames += 1;
        let events = self.session.tick(input.now, rng);

        let transform = self.viewport.observe_video(input.video).copied();
        let mapping_skipped = transform.is_none();
        let pointer = match (&transform, input.detection) {
            (Some(t), Some(frame)) => select_pointer(frame, t, self.settings.pointer, self.settings.overlay.min_hand_confidence),
            _ => None,
        };

        let hovered = pointer.and_then(|p| first_hit(self.session.zones(), &p));
        let hit = self.hit.update(pointer, self.session.zones(), input.now);
        let resolution = hit
            .as_ref()
            .map(|h| self.session.resolve(&h.label, input.now));

        let feedback = self.feedback(resolution.as_ref());
        let overlay = overlay::frame_commands(
            input.detection,
            transform.as_ref(),
            self.session.zones(),
            hovered,
            pointer,
            &self.settings.overlay,
        );

        self.last_detection = input.detection.cloned();
        self.last_pointer = pointer;

        let round = self.session.round();
        FrameOutcome {
            pointer,
            hovered,
            hit,
            resolution,
            feedback,
            events,
            score: self.session.score(),
            round_id: round.id,
            prompt: round.prompt.clone(),
            options: round.options.clone(),
            phase: self.session.phase(),
            mapping_skipped,
            overlay,
        }
    }

    /// 鼠标 / 触摸点击，坐标为画布坐标
    pub fn on_click(&mut self, point: Point, now: Duration) -> ClickOutcome {
        let hit = self.hit.click(point, self.session.zones(), now);
        let resolution = hit.as_ref().map(|h| self.session.resolve(&h.label, now));
        let feedback = self.feedback(resolution.as_ref());
        ClickOutcome {
            hit,
            resolution,
            feedback,
        }
    }

    pub fn on_command<R: RoundRng + ?Sized>(
        &mut self,
        command: Command,
        now: Duration,
        captured_at: DateTime<Utc>,
        rng: &mut R,
    ) -> CommandOutcome {
        match command {
            Command::Restart => {
                self.hit.reset();
                let round_id = self.session.restart(rng, now).id;
                CommandOutcome::Restarted { round_id }
            }
            Command::Capture => CommandOutcome::Captured {
                snapshot: Box::new(self.snapshot(now, captured_at)),
            },
            Command::DumpDetections => {
                let entities = self
                    .last_detection
                    .as_ref()
                    .map_or(0, |d| d.entities.len());
                match self.last_detection.as_ref().map(serde_json::to_string) {
                    Some(Ok(json)) => tracing::info!(entities, detection = %json, "Latest detection"),
                    Some(Err(e)) => tracing::warn!(error = %e, "Failed to serialize detection"),
                    None => tracing::info!("No detection available"),
                }
                CommandOutcome::Dumped { entities }
            }
        }
    }

    pub fn snapshot(&self, now: Duration, captured_at: DateTime<Utc>) -> Snapshot {
        let round = self.session.round();
        Snapshot {
            captured_at,
            frame_time_ms: u64::try_from(now.as_millis()).unwrap_or(u64::MAX),
            score: self.session.score(),
            round_id: round.id,
            prompt: round.prompt.clone(),
            options: round.options.clone(),
            phase: self.session.phase(),
            pointer: self.last_pointer,
            hit_state: self.hit.state(),
            transform: self.viewport.transform().copied(),
            detection: self.last_detection.clone(),
        }
    }
}

/// 选出指针位置：第一个满足置信度的实体上的指定关键点
pub fn select_pointer(
    frame: &DetectionFrame,
    transform: &DisplayTransform,
    source: PointerSource,
    min_hand_confidence: f64,
) -> Option<Point> {
    let (kind, landmark) = match source {
        PointerSource::Hand { landmark } => (EntityKind::Hand, landmark),
        PointerSource::Face { landmark } => (EntityKind::Face, landmark),
    };
    frame
        .entities
        .iter()
        .filter(|e| e.kind == kind)
        .filter(|e| kind != EntityKind::Hand || e.is_confident(min_hand_confidence))
        .find_map(|e| e.keypoint(landmark))
        .and_then(|k| transform.map_keypoint(k, frame.space))
}
