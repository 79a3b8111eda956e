//! 问答会话的浏览器接口
//!
//! 页面在每次绘制时调用 `frame`，传入检测器最近一次给出的手部 / 人脸结果
//! （检测器回调与绘制循环不同步，结果滞后几帧属于正常情况）。返回值是普通
//! JS 对象，包含指针位置、命中事件、分数、当前题目和叠加层绘制指令。

use std::time::Duration;

use chrono::{DateTime, Utc};
use handpose_quiz::content::{PoolKind, UiLanguage};
use handpose_quiz::detection::{CoordinateSpace, DetectionFrame, EntityKind, RawEntity};
use handpose_quiz::game::{FrameInput, GameSettings, QuizGame};
use handpose_quiz::geometry::Point;
use handpose_quiz::input::Command;
use handpose_quiz::overlay::OverlayStyle;
use handpose_quiz::quiz::RandRoundRng;
use handpose_quiz::transform::Size;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// 问答引擎
#[wasm_bindgen]
pub struct QuizEngine {
    game: QuizGame,
    rng: RandRoundRng<StdRng>,
    /// 第一帧的页面时间戳，之后的时间都相对它计算
    origin_ms: Option<f64>,
    last_now: Duration,
    normalized_input: bool,
}

#[wasm_bindgen]
impl QuizEngine {
    /// 创建引擎
    ///
    /// # 参数
    /// - `canvas_width` / `canvas_height`: 画布尺寸
    /// - `mirror`: 是否水平镜像（前置摄像头通常为 true）
    /// - `pool`: 内置题库名称，`number_words` 或 `chinese_numerals`
    #[wasm_bindgen(constructor)]
    pub fn new(canvas_width: f64, canvas_height: f64, mirror: bool, pool: Option<String>) -> Result<QuizEngine, JsError> {
        let kind = match pool.as_deref() {
            Some(name) => name.parse::<PoolKind>().map_err(|e| JsError::new(&e))?,
            None => PoolKind::NumberWords,
        };
        let settings = GameSettings {
            canvas: Size::new(canvas_width, canvas_height),
            mirror,
            ..GameSettings::default()
        };
        let mut rng = RandRoundRng(StdRng::from_entropy());
        let game = QuizGame::new(settings, kind.pool(), &mut rng, Duration::ZERO);
        Ok(Self {
            game,
            rng,
            origin_ms: None,
            last_now: Duration::ZERO,
            normalized_input: false,
        })
    }

    /// 检测器输出为 0..1 归一化坐标时设为 true，默认按视频像素坐标处理
    #[wasm_bindgen(js_name = setNormalizedInput)]
    pub fn set_normalized_input(&mut self, normalized: bool) {
        self.normalized_input = normalized;
    }

    /// 处理一帧
    ///
    /// `hands` / `faces` 为检测器原始结果数组，可以为 `null`。
    pub fn frame(
        &mut self,
        hands: JsValue,
        faces: JsValue,
        video_width: f64,
        video_height: f64,
        timestamp_ms: f64,
    ) -> Result<JsValue, JsError> {
        let now = self.elapsed(timestamp_ms);
        let space = if self.normalized_input {
            CoordinateSpace::Normalized
        } else {
            CoordinateSpace::Pixels {
                width: video_width,
                height: video_height,
            }
        };

        let detection = merge_detection(space, raw_entities(hands), raw_entities(faces));

        let outcome = self.game.on_frame(
            FrameInput {
                now,
                video: Size::new(video_width, video_height),
                detection: detection.as_ref(),
            },
            &mut self.rng,
        );
        to_js(&outcome)
    }

    /// 鼠标 / 触摸点击（画布坐标）
    pub fn click(&mut self, x: f64, y: f64, timestamp_ms: f64) -> Result<JsValue, JsError> {
        let now = self.elapsed(timestamp_ms);
        let outcome = self.game.on_click(Point::new(x, y), now);
        to_js(&outcome)
    }

    /// 键盘指令，未绑定的按键返回 `null`
    pub fn key(&mut self, key: &str, timestamp_ms: f64) -> Result<JsValue, JsError> {
        let Some(command) = Command::from_key(key) else {
            return Ok(JsValue::NULL);
        };
        let now = self.elapsed(timestamp_ms);
        let captured_at = DateTime::<Utc>::from_timestamp_millis(js_sys::Date::now() as i64).unwrap_or_default();
        let outcome = self.game.on_command(command, now, captured_at, &mut self.rng);
        to_js(&outcome)
    }

    /// 控制叠加层是否绘制手部骨架 / 人脸关键点
    #[wasm_bindgen(js_name = setOverlay)]
    pub fn set_overlay(&mut self, draw_skeleton: bool, draw_faces: bool) {
        self.game.set_overlay_style(OverlayStyle {
            draw_skeleton,
            draw_faces,
            ..self.game.settings().overlay
        });
    }

    /// 切换界面语言，`zh-hant` 或 `en`
    #[wasm_bindgen(js_name = setLanguage)]
    pub fn set_language(&mut self, language: &str) -> Result<(), JsError> {
        let language = language.parse::<UiLanguage>().map_err(|e| JsError::new(&e))?;
        self.game.set_language(language);
        Ok(())
    }

    /// 当前语言的界面文字（说明、重新开始提示、分数标签、答题反馈）
    #[wasm_bindgen(js_name = uiText)]
    pub fn ui_text(&self) -> Result<JsValue, JsError> {
        to_js(&self.game.ui_text())
    }

    pub fn resize(&mut self, canvas_width: f64, canvas_height: f64) {
        self.game.resize(Size::new(canvas_width, canvas_height));
    }

    pub fn score(&self) -> u32 {
        self.game.session().score()
    }

    pub fn prompt(&self) -> String {
        self.game.session().round().prompt.clone()
    }

    pub fn options(&self) -> Vec<String> {
        self.game.session().round().options.clone()
    }

    #[wasm_bindgen(js_name = roundId)]
    pub fn round_id(&self) -> u64 {
        self.game.session().round().id
    }
}

impl QuizEngine {
    /// 页面时间戳 → 会话内时间；时间戳回退或非法时沿用上一次的值
    fn elapsed(&mut self, timestamp_ms: f64) -> Duration {
        let now = session_time(&mut self.origin_ms, timestamp_ms).max(self.last_now);
        self.last_now = now;
        now
    }
}

fn session_time(origin_ms: &mut Option<f64>, timestamp_ms: f64) -> Duration {
    if !timestamp_ms.is_finite() {
        return Duration::ZERO;
    }
    let origin = *origin_ms.get_or_insert(timestamp_ms);
    Duration::from_secs_f64((timestamp_ms - origin).max(0.0) / 1000.0)
}

fn raw_entities(value: JsValue) -> Result<Vec<RawEntity>, serde_wasm_bindgen::Error> {
    if value.is_null() || value.is_undefined() {
        return Ok(Vec::new());
    }
    serde_wasm_bindgen::from_value(value)
}

/// 合并手部与人脸结果
///
/// 任一数组无法解析时只记日志并返回 `None`，本帧按无检测处理，计时器和
/// 叠加层照常推进。单个实体的关键点不合法时由 `DetectionFrame::from_raw` 丢弃。
fn merge_detection<E: std::fmt::Display>(
    space: CoordinateSpace,
    hands: Result<Vec<RawEntity>, E>,
    faces: Result<Vec<RawEntity>, E>,
) -> Option<DetectionFrame> {
    match (hands, faces) {
        (Ok(hands), Ok(faces)) => {
            let mut frame = DetectionFrame::from_raw(EntityKind::Hand, space, hands);
            frame
                .entities
                .extend(DetectionFrame::from_raw(EntityKind::Face, space, faces).entities);
            Some(frame)
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Unreadable detector payload, frame treated as empty");
            None
        }
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsError::new(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_timestamp_becomes_origin() {
        let mut origin = None;
        assert_eq!(session_time(&mut origin, 5000.0), Duration::ZERO);
        assert_eq!(session_time(&mut origin, 5250.0), Duration::from_millis(250));
        assert_eq!(session_time(&mut origin, 4000.0), Duration::ZERO);
        assert_eq!(session_time(&mut origin, f64::NAN), Duration::ZERO);
    }

    fn entities(json: &str) -> Vec<RawEntity> {
        serde_json::from_str(json).expect("raw entities")
    }

    fn hand_json(points: usize) -> String {
        let keypoints: Vec<String> = (0..points).map(|i| format!("[{i}, {i}]")).collect();
        format!(r#"{{"keypoints": [{}]}}"#, keypoints.join(","))
    }

    #[test]
    fn bad_entity_is_dropped_but_frame_survives() {
        let hands = entities(&format!("[{}, {}]", hand_json(5), hand_json(21)));
        let frame = merge_detection::<String>(CoordinateSpace::Normalized, Ok(hands), Ok(Vec::new()))
            .expect("frame kept");
        assert_eq!(frame.entities.len(), 1);
        assert_eq!(frame.entities[0].kind, EntityKind::Hand);
    }

    #[test]
    fn unreadable_payload_becomes_absent_detection() {
        let hands = entities(&format!("[{}]", hand_json(21)));
        let frame = merge_detection(
            CoordinateSpace::Normalized,
            Ok(hands),
            Err("expected a sequence".to_string()),
        );
        assert!(frame.is_none());
    }
}
