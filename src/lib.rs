pub mod config;
pub mod constants;
pub mod content;
pub mod detection;
pub mod game;
pub mod geometry;
pub mod input;
pub mod overlay;
pub mod quiz;
pub mod schedule;
pub mod transform;

#[cfg(feature = "runtime")]
pub mod detector;
#[cfg(feature = "runtime")]
pub mod logging;
#[cfg(feature = "runtime")]
pub mod replay;

pub use detection::{DetectedEntity, DetectionFrame, EntityKind, Keypoint};
pub use game::{FrameInput, FrameOutcome, GameSettings, QuizGame};
pub use geometry::Point;
pub use hit_test::{HitEvent, HitTestEngine, TargetZone};
pub use quiz::{QuestionPool, QuizSession, RandRoundRng, RoundRng};
pub use transform::{DisplayTransform, Size, Viewport};
