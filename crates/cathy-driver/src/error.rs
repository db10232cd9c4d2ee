//! 驱动层错误类型定义

use cathy_protocol::ProtocolError;
use cathy_serial::SerialError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 串口错误
    #[error("Serial error: {0}")]
    Serial(#[from] SerialError),

    /// 协议解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 连接已关闭（复位序列之后）
    #[error("Robot connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use cathy_protocol::ProtocolError;
    use cathy_serial::SerialError;

    #[test]
    fn test_driver_error_display() {
        let driver_error = DriverError::Serial(SerialError::Closed);
        let msg = format!("{}", driver_error);
        assert!(msg.contains("Serial") && msg.contains("closed"), "{}", msg);

        let driver_error = DriverError::Protocol(ProtocolError::InvalidLength {
            expected: 5,
            actual: 0,
        });
        assert!(format!("{}", driver_error).contains("Invalid response length"));

        assert_eq!(format!("{}", DriverError::Closed), "Robot connection closed");
    }

    #[test]
    fn test_from_serial_error() {
        let driver_error: DriverError = SerialError::WriteZero.into();
        assert!(matches!(driver_error, DriverError::Serial(SerialError::WriteZero)));
    }
}
