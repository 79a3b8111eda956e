//! 异步检测器接入
//!
//! 检测器调用不阻塞帧循环：`DetectionPump::request` 派生一个任务去等结果，
//! 结果写入“最新结果”槽位，帧循环每帧读取槽位即可。多个请求可能乱序完成，
//! 槽位只接受比当前更新的请求编号。调用失败时记录日志并清空槽位，之后的帧
//! 视为没有检测结果，直到下一次调用成功。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::sync::watch;

use crate::detection::{DetectionError, DetectionFrame};
use crate::transform::Size;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("detector rejected frame: {0}")]
    Rejected(String),
    #[error("detector payload error: {0}")]
    Payload(#[from] DetectionError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectRequest {
    pub seq: u64,
    pub at: Duration,
    pub video: Size,
}

/// 外部检测能力：给定一帧，异步返回检测结果
pub trait Detector: Send + Sync + 'static {
    fn detect(&self, request: DetectRequest) -> BoxFuture<'static, Result<DetectionFrame, DetectorError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatestDetection {
    /// 产生该结果的请求编号，0 表示还没有任何结果
    pub seq: u64,
    pub requested_at: Duration,
    /// 最近一次调用失败时为 `None`
    pub frame: Option<DetectionFrame>,
}

impl LatestDetection {
    fn initial() -> Self {
        Self {
            seq: 0,
            requested_at: Duration::ZERO,
            frame: None,
        }
    }
}

pub struct DetectionPump<D> {
    detector: Arc<D>,
    tx: Arc<watch::Sender<LatestDetection>>,
    rx: watch::Receiver<LatestDetection>,
    next_seq: u64,
    failures: Arc<AtomicU64>,
}

impl<D: Detector> DetectionPump<D> {
    pub fn new(detector: D) -> Self {
        let (tx, rx) = watch::channel(LatestDetection::initial());
        Self {
            detector: Arc::new(detector),
            tx: Arc::new(tx),
            rx,
            next_seq: 1,
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 发起一次检测，不等待结果，返回请求编号
    pub fn request(&mut self, at: Duration, video: Size) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let pending = self.detector.detect(DetectRequest { seq, at, video });
        let tx = Arc::clone(&self.tx);
        let failures = Arc::clone(&self.failures);

        tokio::spawn(async move {
            let frame = match pending.await {
                Ok(frame) => Some(frame),
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(seq, error = %e, "Detector call failed, treating detection as absent");
                    None
                }
            };
            tx.send_if_modified(|slot| {
                if seq <= slot.seq {
                    tracing::trace!(seq, current = slot.seq, "Superseded detection result dropped");
                    return false;
                }
                *slot = LatestDetection {
                    seq,
                    requested_at: at,
                    frame,
                };
                true
            });
        });

        seq
    }

    pub fn latest(&self) -> LatestDetection {
        self.rx.borrow().clone()
    }

    /// 最新结果落后于最新请求的帧数
    pub fn staleness(&self) -> u64 {
        let newest_request = self.next_seq.saturating_sub(1);
        newest_request.saturating_sub(self.rx.borrow().seq)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> watch::Receiver<LatestDetection> {
        self.rx.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use tokio::sync::oneshot;
    use tokio_test::{assert_pending, assert_ready};

    use super::*;
    use crate::detection::CoordinateSpace;

    type Reply = Result<DetectionFrame, DetectorError>;

    /// 每次调用取出一个预先准备好的接收端，由测试决定何时、以何种顺序完成
    struct ManualDetector {
        replies: Mutex<VecDeque<oneshot::Receiver<Reply>>>,
    }

    impl Detector for ManualDetector {
        fn detect(&self, _request: DetectRequest) -> BoxFuture<'static, Reply> {
            let rx = self
                .replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .expect("reply prepared");
            Box::pin(async move {
                rx.await
                    .unwrap_or_else(|_| Err(DetectorError::Rejected("dropped".into())))
            })
        }
    }

    fn manual(n: usize) -> (ManualDetector, Vec<oneshot::Sender<Reply>>) {
        let mut senders = Vec::new();
        let mut receivers = VecDeque::new();
        for _ in 0..n {
            let (tx, rx) = oneshot::channel();
            senders.push(tx);
            receivers.push_back(rx);
        }
        (
            ManualDetector {
                replies: Mutex::new(receivers),
            },
            senders,
        )
    }

    fn frame() -> DetectionFrame {
        DetectionFrame::empty(CoordinateSpace::Normalized)
    }

    async fn settle() {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
    }

    fn video() -> Size {
        Size::new(640.0, 480.0)
    }

    #[tokio::test]
    async fn late_older_result_does_not_supersede_newer() {
        let (detector, mut senders) = manual(2);
        let mut pump = DetectionPump::new(detector);

        pump.request(Duration::from_millis(0), video());
        pump.request(Duration::from_millis(16), video());
        assert_eq!(pump.staleness(), 2);

        let second = senders.pop().expect("second");
        let first = senders.pop().expect("first");
        assert!(second.send(Ok(frame())).is_ok());
        settle().await;
        assert_eq!(pump.latest().seq, 2);

        assert!(first.send(Ok(frame())).is_ok());
        settle().await;
        assert_eq!(pump.latest().seq, 2);
        assert_eq!(pump.latest().requested_at, Duration::from_millis(16));
        assert_eq!(pump.staleness(), 0);
    }

    #[tokio::test]
    async fn failure_clears_until_next_success() {
        let (detector, senders) = manual(3);
        let mut pump = DetectionPump::new(detector);
        let mut senders = senders.into_iter();

        pump.request(Duration::ZERO, video());
        assert!(senders.next().expect("s1").send(Ok(frame())).is_ok());
        settle().await;
        assert!(pump.latest().frame.is_some());

        pump.request(Duration::from_millis(16), video());
        assert!(senders
            .next()
            .expect("s2")
            .send(Err(DetectorError::Rejected("camera busy".into())))
            .is_ok());
        settle().await;
        assert!(pump.latest().frame.is_none());
        assert_eq!(pump.failures(), 1);

        pump.request(Duration::from_millis(32), video());
        assert!(senders.next().expect("s3").send(Ok(frame())).is_ok());
        settle().await;
        let latest = pump.latest();
        assert_eq!(latest.seq, 3);
        assert!(latest.frame.is_some());
    }

    #[test]
    fn detector_future_stays_pending_until_reply() {
        let (detector, mut senders) = manual(1);
        let mut fut = tokio_test::task::spawn(detector.detect(DetectRequest {
            seq: 1,
            at: Duration::ZERO,
            video: video(),
        }));
        assert_pending!(fut.poll());
        assert!(senders.remove(0).send(Ok(frame())).is_ok());
        let reply = assert_ready!(fut.poll());
        assert!(reply.is_ok());
    }
}
