//! 用户命令定义
//!
//! 传感器板通过触摸屏向机器人下发的模式命令。线上编码为有符号整数，
//! `-1` 表示本次观测没有命令。

use crate::ProtocolError;
use serde::Deserialize;

/// 用户命令
///
/// 数值与传感器固件中的编号一一对应。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Deserialize,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
)]
#[repr(i16)]
#[serde(try_from = "i16")]
#[num_enum(error_type(name = ProtocolError, constructor = ProtocolError::UnknownUserCommand))]
pub enum UserCommand {
    /// 无命令（哨兵值）
    #[default]
    None = -1,
    /// 切换到 Passive 模式
    Passive = 0,
    /// 切换到 Safe 模式
    Safe = 1,
    /// 传感器板本地的跟踪模式，机器人侧不做任何模式切换
    Track = 2,
    /// 切换到 Full 模式
    Full = 3,
    /// 复位机器人并重启两侧任务
    Reset = 4,
    /// 关机
    Off = 5,
}

impl UserCommand {
    /// 是否携带需要下发给驱动的模式命令
    ///
    /// Track 只在传感器板本地生效，不下发也不占用模式命令的限速窗口。
    pub fn is_mode_change(self) -> bool {
        !matches!(self, Self::None | Self::Track)
    }

    /// 日志用名称
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Passive => "passive",
            Self::Safe => "safe",
            Self::Track => "track",
            Self::Full => "full",
            Self::Reset => "reset",
            Self::Off => "off",
        }
    }
}

impl std::fmt::Display for UserCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
