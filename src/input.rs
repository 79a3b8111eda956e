use serde::{Deserialize, Serialize};

/// 键盘快捷指令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    /// 重新开始（分数清零）
    Restart,
    /// 保存当前画面状态
    Capture,
    /// 把最近一帧检测结果写入日志，调试用
    DumpDetections,
}

impl Command {
    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "r" => Some(Self::Restart),
            "s" | "c" => Some(Self::Capture),
            "d" => Some(Self::DumpDetections),
            _ => None,
        }
    }
}
