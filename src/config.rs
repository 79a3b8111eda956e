use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_ADVANCE_DELAY_MS, DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH,
    DEFAULT_FRAME_INTERVAL_MS, DEFAULT_HIT_COOLDOWN_MS, DEFAULT_HIT_RADIUS,
    DEFAULT_MIN_HAND_CONFIDENCE,
};
use crate::content::{PoolKind, UiLanguage};
use crate::game::{GameSettings, PointerSource};
use crate::overlay::OverlayStyle;
use crate::quiz::{QuestionPool, QuizConfig, QuizError, RetryPolicy};
use crate::transform::Size;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub canvas: CanvasConfig,
    pub hit: HitConfig,
    pub quiz: QuizEnvConfig,
    pub pointer: PointerConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone)]
pub struct CanvasConfig {
    pub width: f64,
    pub height: f64,
    pub mirror: bool,
    pub draw_skeleton: bool,
    pub draw_faces: bool,
    pub language: UiLanguage,
}

#[derive(Debug, Clone)]
pub struct HitConfig {
    pub radius: f64,
    pub cooldown_ms: u64,
}

#[derive(Debug, Clone)]
pub struct QuizEnvConfig {
    pub advance_delay_ms: u64,
    pub retry: RetryPolicy,
    pub score_increment: u32,
    pub pool: PoolKind,
    pub pool_path: Option<String>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct PointerConfig {
    pub source: PointerSource,
    pub min_hand_confidence: f64,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    pub path: String,
    pub frame_interval_ms: u64,
    pub capture_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            canvas: CanvasConfig {
                width: env_or_parse("CANVAS_WIDTH", DEFAULT_CANVAS_WIDTH),
                height: env_or_parse("CANVAS_HEIGHT", DEFAULT_CANVAS_HEIGHT),
                mirror: env_or_bool("MIRROR_VIDEO", true),
                draw_skeleton: env_or_bool("DRAW_SKELETON", true),
                draw_faces: env_or_bool("DRAW_FACES", true),
                language: env_or_parse("UI_LANGUAGE", UiLanguage::default()),
            },
            hit: HitConfig {
                radius: env_or_parse("HIT_RADIUS", DEFAULT_HIT_RADIUS),
                cooldown_ms: env_or_parse("HIT_COOLDOWN_MS", DEFAULT_HIT_COOLDOWN_MS),
            },
            quiz: QuizEnvConfig {
                advance_delay_ms: env_or_parse("ADVANCE_DELAY_MS", DEFAULT_ADVANCE_DELAY_MS),
                retry: env_or_parse("RETRY_POLICY", RetryPolicy::Immediate),
                score_increment: env_or_parse("SCORE_INCREMENT", 1_u32),
                pool: env_or_parse("QUIZ_POOL", PoolKind::NumberWords),
                pool_path: env_opt("QUIZ_POOL_PATH"),
                seed: env_opt_parse("QUIZ_SEED"),
            },
            pointer: PointerConfig {
                source: env_or_parse("POINTER_SOURCE", PointerSource::default()),
                min_hand_confidence: env_or_parse(
                    "MIN_HAND_CONFIDENCE",
                    DEFAULT_MIN_HAND_CONFIDENCE,
                ),
            },
            replay: ReplayConfig {
                path: env_or("REPLAY_PATH", "./recordings/session.jsonl"),
                frame_interval_ms: env_or_parse("FRAME_INTERVAL_MS", DEFAULT_FRAME_INTERVAL_MS)
                    .max(1),
                capture_dir: env_or("CAPTURE_DIR", "./captures"),
            },
        }
    }

    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            canvas: Size::new(self.canvas.width, self.canvas.height),
            mirror: self.canvas.mirror,
            hit_radius: self.hit.radius,
            cooldown: Duration::from_millis(self.hit.cooldown_ms),
            quiz: QuizConfig {
                score_increment: self.quiz.score_increment,
                advance_delay: Duration::from_millis(self.quiz.advance_delay_ms),
                retry: self.quiz.retry,
            },
            pointer: self.pointer.source,
            overlay: OverlayStyle {
                min_hand_confidence: self.pointer.min_hand_confidence,
                draw_skeleton: self.canvas.draw_skeleton,
                draw_faces: self.canvas.draw_faces,
            },
            language: self.canvas.language,
        }
    }

    /// 配置了题库文件时优先读取文件，否则使用内置题库
    pub fn load_pool(&self) -> Result<QuestionPool, QuizError> {
        match &self.quiz.pool_path {
            Some(path) => QuestionPool::from_json_file(path),
            None => Ok(self.quiz.pool.pool()),
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_opt_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Failed to parse env var, ignoring");
            None
        }
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
