//! 一次性延时事件
//!
//! 帧循环里没有真正的定时器：到期事件在每帧 `drain_due` 时取出。事件一旦
//! 排入就不会被取消，是否仍然生效由消费方在触发时自行校验。

use std::time::Duration;

#[derive(Debug, Clone)]
struct Pending<T> {
    fire_at: Duration,
    seq: u64,
    payload: T,
}

#[derive(Debug, Clone)]
pub struct OneShotTimers<T> {
    pending: Vec<Pending<T>>,
    next_seq: u64,
}

impl<T> Default for OneShotTimers<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> OneShotTimers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: Duration, payload: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Pending {
            fire_at,
            seq,
            payload,
        });
    }

    /// 取出所有 `fire_at <= now` 的事件，按到期时间排序，同时到期按排入顺序
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let mut due = Vec::new();
        let mut idx = 0;
        while idx < self.pending.len() {
            if self.pending[idx].fire_at <= now {
                due.push(self.pending.swap_remove(idx));
            } else {
                idx += 1;
            }
        }
        due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.seq.cmp(&b.seq)));
        due.into_iter().map(|p| p.payload).collect()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().map(|p| p.fire_at).min()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
