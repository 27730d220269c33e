//! 日志初始化

use crate::error::{Error, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// 按给定级别安装全局订阅者；`RUST_LOG` 优先
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::Config(format!("无效的日志级别 {}: {}", level, e)))?,
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|_| Error::Config("日志已经初始化".to_string()))
}

/// 测试用：重复调用时静默忽略
pub fn init_for_tests() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("docgraph=debug"))
        .with_test_writer()
        .try_init();
}
