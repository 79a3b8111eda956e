//! 叠加层绘制计划
//!
//! 只计算“在哪里画什么”，输出可序列化的绘制指令列表，由宿主的画布实现执行。

use serde::Serialize;

use crate::constants::{FACE_POINT_DIAMETER, KEYPOINT_DIAMETER, SKELETON_STROKE_WEIGHT};
use crate::detection::{CoordinateSpace, DetectedEntity, DetectionFrame, EntityKind, Handedness};
use crate::geometry::Point;
use crate::hit_test::TargetZone;
use crate::transform::DisplayTransform;

/// 手部骨架连线：拇指 0-4，其余四指各自从掌指关节连到指尖，不连回手腕
pub const HAND_CONNECTIONS: [(usize, usize); 16] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (5, 6),
    (6, 7),
    (7, 8),
    (9, 10),
    (10, 11),
    (11, 12),
    (13, 14),
    (14, 15),
    (15, 16),
    (17, 18),
    (18, 19),
    (19, 20),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

pub const LEFT_HAND_COLOR: Color = Color::rgb(255, 0, 255);
pub const RIGHT_HAND_COLOR: Color = Color::rgb(255, 255, 0);
pub const FACE_COLOR: Color = Color::rgb(0, 255, 0);
pub const ZONE_COLOR: Color = Color::rgba(255, 255, 255, 160);
pub const ZONE_HOVER_COLOR: Color = Color::rgba(0, 200, 255, 200);
pub const POINTER_COLOR: Color = Color::rgb(255, 64, 64);
pub const TEXT_COLOR: Color = Color::rgb(0, 0, 0);

/// 左手洋红，右手或未知为黄色
pub fn hand_color(handedness: Option<Handedness>) -> Color {
    match handedness {
        Some(Handedness::Left) => LEFT_HAND_COLOR,
        _ => RIGHT_HAND_COLOR,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum DrawCommand {
    Line {
        from: Point,
        to: Point,
        color: Color,
        weight: f64,
    },
    Circle {
        center: Point,
        diameter: f64,
        fill: Option<Color>,
        stroke: Option<Color>,
    },
    Text {
        at: Point,
        text: String,
        size: f64,
        color: Color,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct OverlayStyle {
    pub min_hand_confidence: f64,
    pub draw_skeleton: bool,
    pub draw_faces: bool,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            min_hand_confidence: crate::constants::DEFAULT_MIN_HAND_CONFIDENCE,
            draw_skeleton: true,
            draw_faces: true,
        }
    }
}

/// 单只手：先画骨架线，再画关键点圆
pub fn hand_commands(
    hand: &DetectedEntity,
    space: CoordinateSpace,
    transform: &DisplayTransform,
    style: &OverlayStyle,
) -> Vec<DrawCommand> {
    if hand.kind != EntityKind::Hand || !hand.is_confident(style.min_hand_confidence) {
        return Vec::new();
    }
    let mapped: Vec<Option<Point>> = hand
        .keypoints
        .iter()
        .map(|k| transform.map_keypoint(k, space))
        .collect();
    let color = hand_color(hand.handedness);
    let mut out = Vec::with_capacity(HAND_CONNECTIONS.len() + mapped.len());

    if style.draw_skeleton {
        for &(a, b) in HAND_CONNECTIONS.iter() {
            if let (Some(Some(from)), Some(Some(to))) = (mapped.get(a), mapped.get(b)) {
                out.push(DrawCommand::Line {
                    from: *from,
                    to: *to,
                    color,
                    weight: SKELETON_STROKE_WEIGHT,
                });
            }
        }
    }

    out.extend(mapped.into_iter().flatten().map(|center| DrawCommand::Circle {
        center,
        diameter: KEYPOINT_DIAMETER,
        fill: Some(color),
        stroke: None,
    }));
    out
}

pub fn face_commands(
    face: &DetectedEntity,
    space: CoordinateSpace,
    transform: &DisplayTransform,
) -> Vec<DrawCommand> {
    face.keypoints
        .iter()
        .filter_map(|k| transform.map_keypoint(k, space))
        .map(|center| DrawCommand::Circle {
            center,
            diameter: FACE_POINT_DIAMETER,
            fill: Some(FACE_COLOR),
            stroke: None,
        })
        .collect()
}

pub fn zone_commands(zones: &[TargetZone], hovered: Option<usize>) -> Vec<DrawCommand> {
    let mut out = Vec::with_capacity(zones.len() * 2);
    for (idx, zone) in zones.iter().enumerate() {
        let color = if hovered == Some(idx) {
            ZONE_HOVER_COLOR
        } else {
            ZONE_COLOR
        };
        out.push(DrawCommand::Circle {
            center: zone.center,
            diameter: zone.radius * 2.0,
            fill: Some(color),
            stroke: Some(TEXT_COLOR),
        });
        out.push(DrawCommand::Text {
            at: zone.center,
            text: zone.label.clone(),
            size: (zone.radius * 0.5).max(12.0),
            color: TEXT_COLOR,
        });
    }
    out
}

pub fn pointer_commands(pointer: Option<Point>) -> Vec<DrawCommand> {
    pointer
        .map(|center| DrawCommand::Circle {
            center,
            diameter: KEYPOINT_DIAMETER * 1.5,
            fill: None,
            stroke: Some(POINTER_COLOR),
        })
        .into_iter()
        .collect()
}

/// 整帧叠加层：目标区域 → 检测结果 → 指针
pub fn frame_commands(
    frame: Option<&DetectionFrame>,
    transform: Option<&DisplayTransform>,
    zones: &[TargetZone],
    hovered: Option<usize>,
    pointer: Option<Point>,
    style: &OverlayStyle,
) -> Vec<DrawCommand> {
    let mut out = zone_commands(zones, hovered);
    if let (Some(frame), Some(transform)) = (frame, transform) {
        for entity in &frame.entities {
            match entity.kind {
                EntityKind::Hand => out.extend(hand_commands(entity, frame.space, transform, style)),
                EntityKind::Face if style.draw_faces => {
                    out.extend(face_commands(entity, frame.space, transform))
                }
                EntityKind::Face => {}
            }
        }
    }
    out.extend(pointer_commands(pointer));
    out
}
