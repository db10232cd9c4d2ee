//! 机器人状态与上行状态行
//!
//! Bot 任务周期性查询机器人状态，Sense 任务把状态格式化为一行文本写回传感器板：
//!
//! ```text
//! <0|1> <mode|N/C|ERR> <battery-percent>\n
//! ```

/// Open Interface 工作模式（传感器包 35）
#[derive(Debug, Clone, Copy, PartialEq, Eq, num_enum::FromPrimitive)]
#[repr(u8)]
pub enum OiMode {
    Off = 0,
    Passive = 1,
    Safe = 2,
    Full = 3,
    /// 无法识别的模式编号
    #[num_enum(catch_all)]
    Unknown(u8),
}

impl OiMode {
    /// 上行状态行中使用的模式名称，未知模式返回 `None`
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Self::Off => Some("Off"),
            Self::Passive => Some("Passive"),
            Self::Safe => Some("Safe"),
            Self::Full => Some("Full"),
            Self::Unknown(_) => None,
        }
    }
}

/// 机器人状态快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotStatus {
    pub mode: OiMode,
    /// 当前电量（mAh）
    pub battery_charge_mah: u16,
    /// 电池容量（mAh）
    pub battery_capacity_mah: u16,
}

impl BotStatus {
    /// 电量百分比（四舍五入），容量为 0 时返回 0
    pub fn battery_percent(&self) -> i64 {
        if self.battery_capacity_mah == 0 {
            return 0;
        }
        let ratio = f64::from(self.battery_charge_mah) / f64::from(self.battery_capacity_mah);
        (ratio * 100.0).round() as i64
    }
}

const NOT_CONNECTED: u8 = 0;
const CONNECTED: u8 = 1;

/// 格式化上行状态行
///
/// - 未连接（`None`）：`"0 N/C 0\n"`
/// - 已连接且模式可识别：`"1 <Mode> <percent>\n"`
/// - 已连接但模式未知：`"1 ERR 0\n"`
pub fn format_status(status: Option<&BotStatus>) -> String {
    match status {
        None => format!("{} N/C 0\n", NOT_CONNECTED),
        Some(stat) => match stat.mode.as_str() {
            Some(mode) => format!("{} {} {}\n", CONNECTED, mode, stat.battery_percent()),
            None => format!("{} ERR 0\n", CONNECTED),
        },
    }
}
