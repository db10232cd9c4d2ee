//! 监督层错误类型定义

use cathy_driver::DriverError;
use cathy_serial::SerialError;
use thiserror::Error;

/// 监督层错误类型
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// 机器人驱动错误
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// 传感器串口错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 配置文件解析失败
    #[error("Invalid config file: {0}")]
    Config(#[from] toml::de::Error),

    /// 配置值超出允许范围
    #[error("Invalid config value for '{key}': {reason}")]
    InvalidConfig {
        key: &'static str,
        reason: &'static str,
    },

    /// IO 错误（读取配置、创建线程）
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 线程 panic
    #[error("{0} thread panicked")]
    Panicked(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: SupervisorError = DriverError::Closed.into();
        assert_eq!(format!("{}", err), "Driver error: Robot connection closed");

        let err: SupervisorError = SerialError::Closed.into();
        assert!(format!("{}", err).starts_with("Serial error"));

        assert_eq!(
            format!("{}", SupervisorError::Panicked("sense input")),
            "sense input thread panicked"
        );

        let err = SupervisorError::InvalidConfig {
            key: "bot.status_poll_ms",
            reason: "must be greater than zero",
        };
        assert_eq!(
            format!("{}", err),
            "Invalid config value for 'bot.status_poll_ms': must be greater than zero"
        );
    }
}
