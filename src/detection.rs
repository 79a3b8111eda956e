//! 检测结果模型与适配
//!
//! 外部检测器（手部 / 人脸关键点模型）的输出形状各不相同：有的返回带命名
//! 字段的对象，有的直接返回数组的数组。本模块定义统一的 `Keypoint` /
//! `DetectionFrame` 值类型，并在 `DetectionFrame::from_raw` 这一处完成所有
//! 形状的转换，下游只消费规范类型。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{FACE_MESH_KEYPOINT_COUNT, HAND_KEYPOINT_COUNT};
use crate::geometry::Point;

/// 关键点下标（MediaPipe 约定）
pub mod landmarks {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;

    /// 人脸网格鼻尖
    pub const FACE_NOSE_TIP: usize = 1;
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("invalid detector payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("entity {entity}: {actual} keypoints is not a valid {kind:?} (needs {expected})")]
    KeypointCount {
        entity: usize,
        kind: EntityKind,
        expected: usize,
        actual: usize,
    },
    #[error("entity {entity}: keypoint {index} needs at least x and y")]
    MalformedKeypoint { entity: usize, index: usize },
    #[error("entity {entity}: keypoint {index} has non-finite coordinates")]
    NonFinite { entity: usize, index: usize },
}

/// 单个关键点，坐标所在空间由所属 `DetectionFrame::space` 决定
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    /// 置信度 (0.0 - 1.0)，部分检测器不提供
    pub confidence: Option<f64>,
}

impl Keypoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            confidence: None,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Hand,
    Face,
}

impl EntityKind {
    /// 该类实体至少需要的关键点数量
    pub fn keypoint_count(self) -> usize {
        match self {
            Self::Hand => HAND_KEYPOINT_COUNT,
            Self::Face => FACE_MESH_KEYPOINT_COUNT,
        }
    }

    /// 手部必须正好 21 个点；人脸网格至少 468 个（带虹膜的精细网格为 478 个）
    pub fn accepts_count(self, count: usize) -> bool {
        match self {
            Self::Hand => count == HAND_KEYPOINT_COUNT,
            Self::Face => count >= FACE_MESH_KEYPOINT_COUNT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

/// 检测坐标系：原始视频像素，或已归一化到 [0,1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CoordinateSpace {
    Pixels { width: f64, height: f64 },
    Normalized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedEntity {
    pub kind: EntityKind,
    pub keypoints: Vec<Keypoint>,
    pub handedness: Option<Handedness>,
    pub confidence: Option<f64>,
}

impl DetectedEntity {
    /// 校验并转换单个原始实体；`entity_idx` 只用于错误信息
    pub fn from_raw(kind: EntityKind, entity_idx: usize, raw: RawEntity) -> Result<Self, DetectionError> {
        let (raw_points, handedness, confidence) = match raw {
            RawEntity::Named {
                keypoints,
                handedness,
                confidence,
            } => (keypoints, handedness, confidence),
            RawEntity::Bare(points) => (points, None, None),
        };

        if !kind.accepts_count(raw_points.len()) {
            return Err(DetectionError::KeypointCount {
                entity: entity_idx,
                kind,
                expected: kind.keypoint_count(),
                actual: raw_points.len(),
            });
        }

        let keypoints = raw_points
            .into_iter()
            .enumerate()
            .map(|(index, p)| p.into_keypoint(entity_idx, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            kind,
            keypoints,
            handedness: match kind {
                EntityKind::Hand => handedness.as_deref().and_then(Handedness::parse),
                EntityKind::Face => None,
            },
            confidence: confidence.map(clamp_unit),
        })
    }

    pub fn keypoint(&self, index: usize) -> Option<&Keypoint> {
        self.keypoints.get(index)
    }

    /// 置信度严格高于下限才算有效；检测器未给出置信度时视为有效
    pub fn is_confident(&self, min_confidence: f64) -> bool {
        self.confidence.map_or(true, |c| c > min_confidence)
    }
}

/// 单帧检测结果，按检测器返回顺序保存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionFrame {
    pub space: CoordinateSpace,
    pub entities: Vec<DetectedEntity>,
}

impl DetectionFrame {
    pub fn empty(space: CoordinateSpace) -> Self {
        Self {
            space,
            entities: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn hands(&self) -> impl Iterator<Item = &DetectedEntity> {
        self.entities.iter().filter(|e| e.kind == EntityKind::Hand)
    }

    pub fn faces(&self) -> impl Iterator<Item = &DetectedEntity> {
        self.entities.iter().filter(|e| e.kind == EntityKind::Face)
    }

    /// 检测器输出 → 规范帧，唯一的转换入口
    ///
    /// 单个实体不合法时只丢弃该实体并记录告警，其余实体照常保留。
    pub fn from_raw(kind: EntityKind, space: CoordinateSpace, raw: Vec<RawEntity>) -> Self {
        let mut entities = Vec::with_capacity(raw.len());
        for (entity_idx, item) in raw.into_iter().enumerate() {
            match DetectedEntity::from_raw(kind, entity_idx, item) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    tracing::warn!(?kind, entity = entity_idx, error = %e, "Dropping malformed detector entity")
                }
            }
        }
        Self { space, entities }
    }

    /// 解析 JSON 数组形式的检测器输出
    pub fn from_json(
        kind: EntityKind,
        space: CoordinateSpace,
        payload: &str,
    ) -> Result<Self, DetectionError> {
        let raw: Vec<RawEntity> = serde_json::from_str(payload)?;
        Ok(Self::from_raw(kind, space, raw))
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// 检测器原始关键点：命名字段对象或 `[x, y, (z)]` 数组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKeypoint {
    // 数组必须先于对象尝试，否则 `[x, y, z]` 会按字段顺序被当成对象
    Tuple(Vec<f64>),
    Named {
        x: f64,
        y: f64,
        #[serde(default, alias = "score")]
        confidence: Option<f64>,
    },
}

impl RawKeypoint {
    fn into_keypoint(self, entity: usize, index: usize) -> Result<Keypoint, DetectionError> {
        let (x, y, confidence) = match self {
            Self::Named { x, y, confidence } => (x, y, confidence),
            Self::Tuple(values) => match values.as_slice() {
                [x, y, ..] => (*x, *y, None),
                _ => return Err(DetectionError::MalformedKeypoint { entity, index }),
            },
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(DetectionError::NonFinite { entity, index });
        }
        Ok(Keypoint {
            x,
            y,
            confidence: confidence.map(clamp_unit),
        })
    }
}

/// 检测器原始实体
///
/// 兼容的形状：
/// - `{ keypoints: [{x, y, score?}], handedness?, confidence? }`（ml5 handPose / faceMesh）
/// - `{ landmarks: [[x, y, z]], handInViewConfidence }`（旧版 handpose）
/// - `{ scaledMesh: [[x, y, z]] }`（旧版 facemesh）
/// - `[[x, y], ...]`（裸数组）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawEntity {
    Bare(Vec<RawKeypoint>),
    Named {
        #[serde(alias = "landmarks", alias = "scaledMesh")]
        keypoints: Vec<RawKeypoint>,
        #[serde(default)]
        handedness: Option<String>,
        #[serde(default, alias = "score", alias = "handInViewConfidence")]
        confidence: Option<f64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(handedness: &str, confidence: f64) -> String {
        let points: Vec<String> = (0..HAND_KEYPOINT_COUNT)
            .map(|i| format!(r#"{{"x": {}, "y": {}, "name": "p{}"}}"#, i * 10, i * 5, i))
            .collect();
        format!(
            r#"{{"keypoints": [{}], "handedness": "{}", "confidence": {}}}"#,
            points.join(","),
            handedness,
            confidence
        )
    }

    #[test]
    fn parses_named_hand_objects() {
        let payload = format!("[{}]", hand_json("Left", 0.93));
        let frame = DetectionFrame::from_json(
            EntityKind::Hand,
            CoordinateSpace::Pixels {
                width: 640.0,
                height: 480.0,
            },
            &payload,
        )
        .expect("parse");

        assert_eq!(frame.entities.len(), 1);
        let hand = &frame.entities[0];
        assert_eq!(hand.handedness, Some(Handedness::Left));
        assert_eq!(hand.confidence, Some(0.93));
        assert_eq!(hand.keypoints[landmarks::INDEX_FINGER_TIP].x, 80.0);
        assert_eq!(hand.keypoints[landmarks::INDEX_FINGER_TIP].y, 40.0);
    }

    #[test]
    fn parses_bare_arrays_and_legacy_landmarks() {
        let bare: Vec<String> = (0..HAND_KEYPOINT_COUNT)
            .map(|i| format!("[{}, {}, 0.0]", i as f64 / 100.0, 0.5))
            .collect();
        let payload = format!(
            r#"[[{}], {{"landmarks": [{}], "handInViewConfidence": 0.8}}]"#,
            bare.join(","),
            bare.join(",")
        );
        let frame =
            DetectionFrame::from_json(EntityKind::Hand, CoordinateSpace::Normalized, &payload)
                .expect("parse");

        assert_eq!(frame.entities.len(), 2);
        assert_eq!(frame.entities[0].confidence, None);
        assert_eq!(frame.entities[1].confidence, Some(0.8));
        assert!((frame.entities[1].keypoints[20].x - 0.2).abs() < 1e-12);
    }

    fn raw_entity(json: &str) -> RawEntity {
        serde_json::from_str(json).expect("raw entity")
    }

    #[test]
    fn rejects_wrong_keypoint_count() {
        let err = DetectedEntity::from_raw(EntityKind::Hand, 0, raw_entity("[[0.1, 0.2], [0.3, 0.4]]"))
            .expect_err("should fail");
        assert!(matches!(
            err,
            DetectionError::KeypointCount {
                expected: 21,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn rejects_short_tuples() {
        let mut points: Vec<String> = (0..HAND_KEYPOINT_COUNT).map(|_| "[0.1, 0.1]".to_string()).collect();
        points[3] = "[0.1]".to_string();
        let raw = raw_entity(&format!("[{}]", points.join(",")));
        let err = DetectedEntity::from_raw(EntityKind::Hand, 0, raw).expect_err("should fail");
        assert!(matches!(
            err,
            DetectionError::MalformedKeypoint {
                entity: 0,
                index: 3
            }
        ));
    }

    #[test]
    fn malformed_entity_is_dropped_and_rest_kept() {
        let payload = format!("[[[0.1, 0.2]], {}]", hand_json("Right", 0.9));
        let frame = DetectionFrame::from_json(EntityKind::Hand, CoordinateSpace::Normalized, &payload)
            .expect("parse");
        assert_eq!(frame.entities.len(), 1);
        assert_eq!(frame.entities[0].handedness, Some(Handedness::Right));
    }

    #[test]
    fn refined_face_mesh_is_accepted() {
        let points: Vec<String> = (0..478).map(|i| format!("[{}, 0.5, 0.0]", i as f64 / 1000.0)).collect();
        let payload = format!(r#"[{{"scaledMesh": [{}]}}]"#, points.join(","));
        let frame = DetectionFrame::from_json(EntityKind::Face, CoordinateSpace::Normalized, &payload)
            .expect("parse");
        assert_eq!(frame.faces().count(), 1);
        assert_eq!(frame.entities[0].keypoints.len(), 478);

        let short: Vec<String> = (0..400).map(|_| "[0.5, 0.5]".to_string()).collect();
        let err = DetectedEntity::from_raw(EntityKind::Face, 0, raw_entity(&format!("[{}]", short.join(","))))
            .expect_err("too few face points");
        assert!(matches!(err, DetectionError::KeypointCount { expected: 468, actual: 400, .. }));
    }

    #[test]
    fn unknown_handedness_is_dropped_and_confidence_clamped() {
        let payload = format!("[{}]", hand_json("Ambidextrous", 1.7));
        let frame = DetectionFrame::from_json(EntityKind::Hand, CoordinateSpace::Normalized, &payload)
            .expect("parse");
        assert_eq!(frame.entities[0].handedness, None);
        assert_eq!(frame.entities[0].confidence, Some(1.0));
    }

    #[test]
    fn confidence_floor_is_strict() {
        let entity = DetectedEntity {
            kind: EntityKind::Hand,
            keypoints: Vec::new(),
            handedness: None,
            confidence: Some(0.1),
        };
        assert!(!entity.is_confident(0.1));
        assert!(entity.is_confident(0.05));

        let unknown = DetectedEntity {
            confidence: None,
            ..entity
        };
        assert!(unknown.is_confident(0.1));
    }

    #[test]
    fn empty_payload_is_empty_frame() {
        let frame = DetectionFrame::from_json(EntityKind::Face, CoordinateSpace::Normalized, "[]")
            .expect("parse");
        assert!(frame.is_empty());
        assert_eq!(frame.faces().count(), 0);
    }
}
