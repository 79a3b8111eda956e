//! 显示变换：检测器坐标 → 画布坐标
//!
//! 画布上的视频按原始宽高比缩放到可容纳的最大尺寸并居中（上下或左右留边），
//! 可选水平镜像。关键点先归一化到 [0,1]，镜像时取 `1 - x`，再乘以显示尺寸、
//! 加上偏移量。

use serde::{Deserialize, Serialize};

use crate::detection::{CoordinateSpace, Keypoint};
use crate::geometry::{Point, Rect};

/// 尺寸（宽、高）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// 宽高都为有限正数
    pub fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayTransform {
    pub scale: f64,
    pub mirror: bool,
    pub offset_x: f64,
    pub offset_y: f64,
    pub source_width: f64,
    pub source_height: f64,
}

impl DisplayTransform {
    pub fn new(scale: f64, mirror: bool, offset_x: f64, offset_y: f64, source: Size) -> Self {
        Self {
            scale,
            mirror,
            offset_x,
            offset_y,
            source_width: source.width,
            source_height: source.height,
        }
    }

    /// 保持宽高比缩放到画布内并居中；任一尺寸不可用时返回 `None`
    pub fn fit(canvas: Size, video: Size, mirror: bool) -> Option<Self> {
        if !canvas.is_usable() || !video.is_usable() {
            return None;
        }
        let scale = (canvas.width / video.width).min(canvas.height / video.height);
        let offset_x = (canvas.width - video.width * scale) / 2.0;
        let offset_y = (canvas.height - video.height * scale) / 2.0;
        Some(Self::new(scale, mirror, offset_x, offset_y, video))
    }

    pub fn display_width(&self) -> f64 {
        self.source_width * self.scale
    }

    pub fn display_height(&self) -> f64 {
        self.source_height * self.scale
    }

    /// 视频在画布上实际占据的矩形
    pub fn video_rect(&self) -> Rect {
        Rect {
            x: self.offset_x,
            y: self.offset_y,
            width: self.display_width(),
            height: self.display_height(),
        }
    }

    /// 归一化坐标 → 画布坐标
    pub fn map_normalized(&self, p: Point) -> Point {
        let nx = if self.mirror { 1.0 - p.x } else { p.x };
        Point::new(
            nx * self.display_width() + self.offset_x,
            p.y * self.display_height() + self.offset_y,
        )
    }

    /// 像素坐标（基于给定源尺寸）→ 画布坐标；源尺寸为零时不做映射
    pub fn map_pixel(&self, p: Point, source_width: f64, source_height: f64) -> Option<Point> {
        if !Size::new(source_width, source_height).is_usable() {
            return None;
        }
        Some(self.map_normalized(Point::new(
            p.x / source_width,
            p.y / source_height,
        )))
    }

    pub fn map_keypoint(&self, keypoint: &Keypoint, space: CoordinateSpace) -> Option<Point> {
        match space {
            CoordinateSpace::Normalized => Some(self.map_normalized(keypoint.position())),
            CoordinateSpace::Pixels { width, height } => {
                self.map_pixel(keypoint.position(), width, height)
            }
        }
    }
}

/// 缓存当前显示变换，仅在画布或视频尺寸变化时重算
#[derive(Debug, Clone)]
pub struct Viewport {
    canvas: Size,
    video: Option<Size>,
    mirror: bool,
    transform: Option<DisplayTransform>,
}

impl Viewport {
    pub fn new(canvas: Size, mirror: bool) -> Self {
        Self {
            canvas,
            video: None,
            mirror,
            transform: None,
        }
    }

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn resize_canvas(&mut self, canvas: Size) {
        if canvas != self.canvas {
            self.canvas = canvas;
            self.recompute();
        }
    }

    /// 更新视频尺寸并返回当前变换
    pub fn observe_video(&mut self, video: Size) -> Option<&DisplayTransform> {
        if self.video != Some(video) {
            self.video = Some(video);
            self.recompute();
        }
        self.transform.as_ref()
    }

    pub fn transform(&self) -> Option<&DisplayTransform> {
        self.transform.as_ref()
    }

    fn recompute(&mut self) {
        self.transform = self
            .video
            .and_then(|video| DisplayTransform::fit(self.canvas, video, self.mirror));
        match &self.transform {
            Some(t) => tracing::debug!(
                scale = t.scale,
                offset_x = t.offset_x,
                offset_y = t.offset_y,
                "Display transform recomputed"
            ),
            None => tracing::debug!("Display transform unavailable, mapping skipped"),
        }
    }
}
