//! Builder 模式实现
//!
//! 提供链式构造 `OiBot` 实例的便捷方式。

use crate::error::DriverError;
use crate::oibot::OiBot;
use cathy_protocol::oi::DEFAULT_BAUD_RATE;
use cathy_serial::{SerialConfig, SerialPortTransport, SerialTransport};
use std::time::Duration;

/// 默认状态应答超时
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// OiBot Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use cathy_driver::BotBuilder;
/// use std::time::Duration;
///
/// let bot = BotBuilder::new("/dev/ttyUSB0")
///     .baud_rate(115_200)
///     .read_timeout(Duration::from_millis(50))
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct BotBuilder {
    /// 串口设备路径
    path: String,
    /// 波特率
    baud_rate: u32,
    /// 打开后是否立即发送 Start
    init: bool,
    /// 状态应答超时
    read_timeout: Duration,
}

impl BotBuilder {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            init: true,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// 打开后是否发送 Start（默认 true）
    pub fn init(mut self, init: bool) -> Self {
        self.init = init;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// 串口参数
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig::new(self.path.clone(), self.baud_rate, self.read_timeout)
    }

    /// 打开串口并创建驱动
    pub fn build(&self) -> Result<OiBot<SerialPortTransport>, DriverError> {
        let transport = SerialPortTransport::open(&self.serial_config())?;
        self.build_with(transport)
    }

    /// 在给定的串口上创建驱动
    pub fn build_with<T: SerialTransport>(&self, transport: T) -> Result<OiBot<T>, DriverError> {
        OiBot::new(transport, self.init, self.read_timeout)
    }
}
