/// 手部关键点数量（MediaPipe hand landmarker）
pub const HAND_KEYPOINT_COUNT: usize = 21;

/// 人脸网格最少关键点数量（MediaPipe face mesh，不含虹膜；带虹膜的精细网格为 478）
pub const FACE_MESH_KEYPOINT_COUNT: usize = 468;

/// 每一轮题目的选项数量：一个正确答案 + 两个干扰项
pub const OPTION_COUNT: usize = 3;

/// 默认画布宽度（像素）
pub const DEFAULT_CANVAS_WIDTH: f64 = 640.0;

/// 默认画布高度（像素）
pub const DEFAULT_CANVAS_HEIGHT: f64 = 480.0;

/// 默认目标区域半径（像素）
pub const DEFAULT_HIT_RADIUS: f64 = 60.0;

/// 命中后重新布防的冷却时间（毫秒）
pub const DEFAULT_HIT_COOLDOWN_MS: u64 = 800;

/// 答对后切换到下一题的延迟（毫秒）
pub const DEFAULT_ADVANCE_DELAY_MS: u64 = 1000;

/// 低于该置信度的手不参与绘制和指向
pub const DEFAULT_MIN_HAND_CONFIDENCE: f64 = 0.1;

/// 干扰项重采样的最大尝试次数（按题库大小倍数计）
pub const DISTRACTOR_ATTEMPTS_PER_ITEM: usize = 16;

/// 回放默认帧间隔（毫秒），约 60fps
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// 骨架连线宽度
pub const SKELETON_STROKE_WEIGHT: f64 = 3.0;

/// 关键点圆点直径
pub const KEYPOINT_DIAMETER: f64 = 16.0;

/// 人脸网格圆点直径
pub const FACE_POINT_DIAMETER: f64 = 2.0;
