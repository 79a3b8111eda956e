#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use handpose_quiz::detection::{
    landmarks, CoordinateSpace, DetectedEntity, DetectionFrame, EntityKind, Handedness, Keypoint,
};
use handpose_quiz::geometry::Point;
use handpose_quiz::quiz::{QuestionPool, QuizItem, RoundRng};

/// 按脚本返回下标；脚本用完后返回 `upper - 1`，此时洗牌为恒等排列
pub struct FixedRng(VecDeque<usize>);

impl FixedRng {
    pub fn new(script: &[usize]) -> Self {
        Self(script.iter().copied().collect())
    }
}

impl RoundRng for FixedRng {
    fn below(&mut self, upper: usize) -> usize {
        match self.0.pop_front() {
            Some(v) => v.min(upper - 1),
            None => upper - 1,
        }
    }
}

pub fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

pub fn one_two_three() -> QuestionPool {
    QuestionPool::new(vec![
        QuizItem::new("1", "one"),
        QuizItem::new("2", "two"),
        QuizItem::new("3", "three"),
    ])
    .expect("pool")
}

/// 640x480 像素空间中食指指尖位于 `tip` 的右手
pub fn hand_frame_at(tip: Point) -> DetectionFrame {
    let mut keypoints: Vec<Keypoint> = (0..21).map(|_| Keypoint::new(5.0, 470.0)).collect();
    keypoints[landmarks::INDEX_FINGER_TIP] = Keypoint::new(tip.x, tip.y);
    DetectionFrame {
        space: CoordinateSpace::Pixels {
            width: 640.0,
            height: 480.0,
        },
        entities: vec![DetectedEntity {
            kind: EntityKind::Hand,
            keypoints,
            handedness: Some(Handedness::Right),
            confidence: Some(0.95),
        }],
    }
}

/// 录制文件中的一行手部帧，关键点为裸数组形式
pub fn hand_frame_line(at_ms: u64, tip: Point) -> String {
    let points: Vec<[f64; 2]> = (0..21)
        .map(|i| {
            if i == landmarks::INDEX_FINGER_TIP {
                [tip.x, tip.y]
            } else {
                [5.0, 470.0]
            }
        })
        .collect();
    serde_json::json!({
        "atMs": at_ms,
        "type": "frame",
        "width": 640,
        "height": 480,
        "hands": [points],
    })
    .to_string()
}
