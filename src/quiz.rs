//! 问答会话状态
//!
//! 会话持有题库、当前题目（题干 + 三个选项及其目标区域）、累计分数和待触发的
//! 延时事件。所有修改都通过 `QuizSession` 的方法完成，没有全局状态。
//!
//! 延时事件（答对后切题、答错后解除冷却）排入时记录所属题目编号和阶段，触发
//! 时若会话已进入其他题目或阶段则直接丢弃，避免快速重开后旧定时器误改状态。

use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DISTRACTOR_ATTEMPTS_PER_ITEM, OPTION_COUNT};
use crate::geometry::Point;
use crate::hit_test::TargetZone;
use crate::schedule::OneShotTimers;
use crate::transform::Size;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("question pool needs at least {required} items, got {len}")]
    PoolTooSmall { len: usize, required: usize },
    #[error("duplicate answer in question pool: {0}")]
    DuplicateAnswer(String),
    #[error("question pool item {index} has an empty prompt or answer")]
    EmptyField { index: usize },
    #[error("failed to read question pool {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid question pool json: {0}")]
    Json(#[from] serde_json::Error),
}

/// 题干 / 答案对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub prompt: String,
    pub answer: String,
}

impl QuizItem {
    pub fn new(prompt: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            answer: answer.into(),
        }
    }
}

/// 经过校验的题库：至少三项，答案互不相同
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPool {
    items: Vec<QuizItem>,
}

impl QuestionPool {
    pub fn new(items: Vec<QuizItem>) -> Result<Self, QuizError> {
        if items.len() < OPTION_COUNT {
            return Err(QuizError::PoolTooSmall {
                len: items.len(),
                required: OPTION_COUNT,
            });
        }
        let mut seen = HashSet::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            if item.prompt.trim().is_empty() || item.answer.trim().is_empty() {
                return Err(QuizError::EmptyField { index });
            }
            if !seen.insert(item.answer.as_str()) {
                return Err(QuizError::DuplicateAnswer(item.answer.clone()));
            }
        }
        Ok(Self { items })
    }

    /// 内置题库，数据由 `content` 模块的测试保证合法
    pub(crate) fn builtin(items: Vec<QuizItem>) -> Self {
        debug_assert!(Self::new(items.clone()).is_ok());
        Self { items }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, QuizError> {
        let items: Vec<QuizItem> = serde_json::from_str(raw)?;
        Self::new(items)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, QuizError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| QuizError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn items(&self) -> &[QuizItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 出题用的随机源
pub trait RoundRng {
    /// 返回 `[0, upper)` 内的均匀随机下标，`upper` 保证大于 0
    fn below(&mut self, upper: usize) -> usize;
}

/// 把任意 `rand::Rng` 适配为 `RoundRng`
#[derive(Debug, Clone)]
pub struct RandRoundRng<R>(pub R);

impl<R: Rng> RoundRng for RandRoundRng<R> {
    fn below(&mut self, upper: usize) -> usize {
        self.0.gen_range(0..upper)
    }
}

/// 均匀 Fisher–Yates 洗牌
pub fn fisher_yates<T, R: RoundRng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.below(i + 1);
        items.swap(i, j);
    }
}

/// 三个选项在画布上的固定位置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionLayout {
    pub positions: [Point; OPTION_COUNT],
    pub radius: f64,
}

impl OptionLayout {
    /// 画布上方四分之一高度处横向等距排列
    pub fn row(canvas: Size, radius: f64) -> Self {
        let y = canvas.height * 0.25;
        let step = canvas.width / (OPTION_COUNT as f64 + 1.0);
        Self {
            positions: std::array::from_fn(|i| Point::new(step * (i as f64 + 1.0), y)),
            radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// 答错后立即可以再答
    Immediate,
    /// 答错后等待与切题相同的延迟
    AfterDelay,
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "after_delay" | "delay" => Ok(Self::AfterDelay),
            other => Err(format!("unknown retry policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizConfig {
    pub score_increment: u32,
    pub advance_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            score_increment: 1,
            advance_delay: Duration::from_millis(crate::constants::DEFAULT_ADVANCE_DELAY_MS),
            retry: RetryPolicy::Immediate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub id: u64,
    pub prompt: String,
    pub answer: String,
    /// 显示顺序
    pub options: Vec<String>,
    pub zones: Vec<TargetZone>,
    pub started_at: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundPhase {
    AwaitingAnswer,
    /// 已答对，等待切到下一题
    Advancing,
    /// 已答错，等待解除冷却
    Cooling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeferredAction {
    AdvanceRound,
    ReleaseRetry,
}

#[derive(Debug, Clone, Copy)]
struct DeferredEvent {
    action: DeferredAction,
    round_id: u64,
    phase: RoundPhase,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum Resolution {
    Correct { score: u32, increment: u32 },
    Incorrect { label: String },
    /// 当前阶段不接受作答，或选项不存在
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SessionEvent {
    RoundStarted { round_id: u64, prompt: String },
    RetryReleased { round_id: u64 },
}

pub struct QuizSession {
    pool: QuestionPool,
    layout: OptionLayout,
    config: QuizConfig,
    score: u32,
    round: Round,
    phase: RoundPhase,
    timers: OneShotTimers<DeferredEvent>,
    next_round_id: u64,
}

impl QuizSession {
    pub fn new<R: RoundRng + ?Sized>(
        pool: QuestionPool,
        layout: OptionLayout,
        config: QuizConfig,
        rng: &mut R,
        now: Duration,
    ) -> Self {
        let round = build_round(&pool, &layout, 0, rng, now);
        tracing::info!(round_id = round.id, prompt = %round.prompt, "Quiz session started");
        Self {
            pool,
            layout,
            config,
            score: 0,
            round,
            phase: RoundPhase::AwaitingAnswer,
            timers: OneShotTimers::new(),
            next_round_id: 1,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn round(&self) -> &Round {
        &self.round
    }

    pub fn zones(&self) -> &[TargetZone] {
        &self.round.zones
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn layout(&self) -> &OptionLayout {
        &self.layout
    }

    /// 替换选项布局（画布尺寸变化时），当前题目的区域随之更新
    pub fn set_layout(&mut self, layout: OptionLayout) {
        for (zone, pos) in self.round.zones.iter_mut().zip(layout.positions.iter()) {
            zone.center = *pos;
            zone.radius = layout.radius;
        }
        self.layout = layout;
    }

    /// 出一道新题，替换当前题目
    pub fn new_round<R: RoundRng + ?Sized>(&mut self, rng: &mut R, now: Duration) -> &Round {
        let id = self.next_round_id;
        self.next_round_id += 1;
        self.round = build_round(&self.pool, &self.layout, id, rng, now);
        self.phase = RoundPhase::AwaitingAnswer;
        tracing::debug!(round_id = id, prompt = %self.round.prompt, options = ?self.round.options, "New round");
        &self.round
    }

    pub fn resolve(&mut self, label: &str, now: Duration) -> Resolution {
        if self.phase != RoundPhase::AwaitingAnswer {
            return Resolution::Ignored;
        }
        if !self.round.options.iter().any(|o| o == label) {
            tracing::warn!(label, round_id = self.round.id, "Resolve with unknown option");
            return Resolution::Ignored;
        }

        if label == self.round.answer {
            self.score = self.score.saturating_add(self.config.score_increment);
            self.phase = RoundPhase::Advancing;
            self.schedule(DeferredAction::AdvanceRound, now);
            tracing::info!(round_id = self.round.id, score = self.score, "Correct answer");
            Resolution::Correct {
                score: self.score,
                increment: self.config.score_increment,
            }
        } else {
            if self.config.retry == RetryPolicy::AfterDelay {
                self.phase = RoundPhase::Cooling;
                self.schedule(DeferredAction::ReleaseRetry, now);
            }
            tracing::info!(round_id = self.round.id, label, "Incorrect answer");
            Resolution::Incorrect {
                label: label.to_string(),
            }
        }
    }

    /// 触发到期的延时事件
    pub fn tick<R: RoundRng + ?Sized>(&mut self, now: Duration, rng: &mut R) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for deferred in self.timers.drain_due(now) {
            if deferred.round_id != self.round.id || deferred.phase != self.phase {
                tracing::debug!(
                    round_id = deferred.round_id,
                    current_round = self.round.id,
                    "Stale deferred event dropped"
                );
                continue;
            }
            match deferred.action {
                DeferredAction::AdvanceRound => {
                    let round = self.new_round(rng, now);
                    events.push(SessionEvent::RoundStarted {
                        round_id: round.id,
                        prompt: round.prompt.clone(),
                    });
                }
                DeferredAction::ReleaseRetry => {
                    self.phase = RoundPhase::AwaitingAnswer;
                    events.push(SessionEvent::RetryReleased {
                        round_id: self.round.id,
                    });
                }
            }
        }
        events
    }

    /// 重新开始：分数清零，丢弃所有待触发事件，出新题
    pub fn restart<R: RoundRng + ?Sized>(&mut self, rng: &mut R, now: Duration) -> &Round {
        self.score = 0;
        self.timers.clear();
        tracing::info!("Quiz session restarted");
        self.new_round(rng, now)
    }

    fn schedule(&mut self, action: DeferredAction, now: Duration) {
        self.timers.schedule(
            now + self.config.advance_delay,
            DeferredEvent {
                action,
                round_id: self.round.id,
                phase: self.phase,
            },
        );
    }
}

fn build_round<R: RoundRng + ?Sized>(
    pool: &QuestionPool,
    layout: &OptionLayout,
    id: u64,
    rng: &mut R,
    now: Duration,
) -> Round {
    let items = pool.items();
    let correct_idx = rng.below(items.len());
    let picked = pick_distractors(items.len(), correct_idx, OPTION_COUNT - 1, rng);

    let mut options: Vec<String> = std::iter::once(correct_idx)
        .chain(picked)
        .map(|idx| items[idx].answer.clone())
        .collect();
    fisher_yates(&mut options, rng);

    let answer = items[correct_idx].answer.clone();
    let zones = options
        .iter()
        .zip(layout.positions.iter())
        .map(|(label, center)| TargetZone {
            label: label.clone(),
            center: *center,
            radius: layout.radius,
            correct: *label == answer,
        })
        .collect();

    Round {
        id,
        prompt: items[correct_idx].prompt.clone(),
        answer,
        options,
        zones,
        started_at: now,
    }
}

/// 重采样直到得到足够多互不相同的干扰项；尝试次数有上限，超过后按顺序补齐
fn pick_distractors<R: RoundRng + ?Sized>(
    len: usize,
    correct_idx: usize,
    count: usize,
    rng: &mut R,
) -> Vec<usize> {
    let mut picked = Vec::with_capacity(count);
    let max_attempts = len * DISTRACTOR_ATTEMPTS_PER_ITEM;
    let mut attempts = 0;

    while picked.len() < count && attempts < max_attempts {
        attempts += 1;
        let idx = rng.below(len);
        if idx != correct_idx && !picked.contains(&idx) {
            picked.push(idx);
        }
    }

    if picked.len() < count {
        tracing::debug!(attempts, "Distractor sampling exhausted, filling in order");
        for idx in 0..len {
            if picked.len() == count {
                break;
            }
            if idx != correct_idx && !picked.contains(&idx) {
                picked.push(idx);
            }
        }
    }

    picked
}
