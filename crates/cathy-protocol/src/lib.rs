//! # Cathy Protocol
//!
//! 传感器板与 Create 机器人之间的数据格式定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `command`: 传感器板下发的用户命令枚举
//! - `record`: 单次传感器观测（`SensorRecord`）
//! - `frame`: 从串口原始字节中提取 JSON 帧
//! - `status`: 机器人状态与上行状态行格式化
//! - `drive`: 离散行驶方向（`DriveBucket`）及速度/半径查找表
//! - `oi`: Open Interface 命令编码
//!
//! ## 字节序
//!
//! Open Interface 的 16 位字段使用大端字节序（高位在前）。

pub mod command;
pub mod drive;
pub mod frame;
pub mod oi;
pub mod record;
pub mod status;

// 重新导出常用类型
pub use command::UserCommand;
pub use drive::{DriveBucket, DriveVector};
pub use frame::{MAX_FRAME_LEN, READ_BUFFER_LEN, SensorFrameDecoder, decode_frame};
pub use record::SensorRecord;
pub use status::{BotStatus, OiMode, format_status};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// 候选帧不是合法的传感器 JSON 对象
    #[error("Invalid sensor frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),

    /// 用户命令编号超出已知范围
    #[error("Unknown user command: {0}")]
    UnknownUserCommand(i16),

    /// 机器人应答长度不符
    #[error("Invalid response length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// i16 转大端字节序
pub fn i16_to_bytes_be(value: i16) -> [u8; 2] {
    value.to_be_bytes()
}
