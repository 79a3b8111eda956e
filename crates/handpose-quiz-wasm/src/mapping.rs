//! 坐标映射辅助
//!
//! 不创建会话，直接把一个检测器坐标映射到画布坐标，方便页面单独绘制。

use handpose_quiz::geometry::Point;
use handpose_quiz::transform::{DisplayTransform, Size};
use wasm_bindgen::prelude::*;

/// 映射后的画布坐标
#[wasm_bindgen]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPoint {
    pub x: f64,
    pub y: f64,
}

/// 把视频像素坐标映射到画布坐标
///
/// 画布或视频尺寸为零时返回 `undefined`。
#[wasm_bindgen(js_name = mapPoint)]
pub fn map_point(
    x: f64,
    y: f64,
    canvas_width: f64,
    canvas_height: f64,
    video_width: f64,
    video_height: f64,
    mirror: bool,
) -> Option<CanvasPoint> {
    let video = Size::new(video_width, video_height);
    let transform = DisplayTransform::fit(Size::new(canvas_width, canvas_height), video, mirror)?;
    transform
        .map_pixel(Point::new(x, y), video.width, video.height)
        .map(|p| CanvasPoint { x: p.x, y: p.y })
}
