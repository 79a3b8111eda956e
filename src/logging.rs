use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            enable_file_logs: false,
            log_dir: "./logs".to_string(),
        }
    }
}

impl From<&Config> for LogConfig {
    fn from(config: &Config) -> Self {
        Self {
            log_level: config.log_level.clone(),
            enable_file_logs: config.enable_file_logs,
            log_dir: config.log_dir.clone(),
        }
    }
}

/// 安装全局 subscriber：标准输出始终开启，按配置追加每日滚动的 JSON 文件日志
///
/// 可以重复调用，第二次起保持已有 subscriber 不变。日志目录不可用时退回只写标准输出。
pub fn init_tracing(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let base = Registry::default()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(false));

    let appender = config.enable_file_logs.then(|| daily_appender(&config.log_dir));
    match appender {
        Some(Ok(appender)) => {
            let json = fmt::layer().with_writer(appender).with_ansi(false).json();
            keep_existing(base.with(json).try_init(), "stdout + file");
        }
        Some(Err(e)) => {
            keep_existing(base.try_init(), "stdout");
            tracing::warn!(dir = %config.log_dir, error = %e, "File logging disabled, log directory unusable");
        }
        None => keep_existing(base.try_init(), "stdout"),
    }
}

fn daily_appender(dir: &str) -> Result<RollingFileAppender, tracing_appender::rolling::InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("handpose-quiz")
        .filename_suffix("log")
        .max_log_files(14)
        .build(dir)
}

/// 重复安装（测试里很常见）不算错误，其余失败说明进程环境有问题
fn keep_existing(result: Result<(), tracing_subscriber::util::TryInitError>, sinks: &str) {
    if let Err(e) = result {
        if !e.to_string().contains("already been set") {
            panic!("tracing setup ({sinks}) failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let cfg = LogConfig::default();
        init_tracing(&cfg);
        init_tracing(&cfg);
    }

    #[test]
    fn unusable_log_dir_falls_back_to_stdout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write blocker");
        let cfg = LogConfig {
            enable_file_logs: true,
            log_dir: blocker.join("logs").to_string_lossy().into_owned(),
            ..LogConfig::default()
        };
        init_tracing(&cfg);
    }
}
