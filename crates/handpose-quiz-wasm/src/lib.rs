//! 手势问答 WASM 绑定
//!
//! 宿主页面负责摄像头、检测器和画布绘制，本库只接收检测结果并返回
//! 指针位置、命中事件、分数以及叠加层绘制指令。
//!
//! ## 模块
//! - `engine`: `QuizEngine` 问答会话
//! - `mapping`: 坐标映射辅助函数

pub mod engine;
pub mod mapping;

pub use engine::QuizEngine;
pub use mapping::map_point;
