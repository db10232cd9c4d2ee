//! Open Interface 串口驱动

use crate::error::DriverError;
use crate::robot::RobotDriver;
use cathy_protocol::BotStatus;
use cathy_protocol::oi::{self, STATUS_QUERY, STATUS_RESPONSE_LEN, opcode};
use cathy_serial::SerialTransport;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create 机器人驱动（Open Interface over serial）
///
/// 状态查询是请求-应答式的：发送 Query List 后在 `response_timeout`
/// 内读取固定长度的应答，读不满视为"无状态"而不是错误。每次查询前
/// 先清空输入缓冲区，上一次超时的迟到应答不会让后续应答错位。
pub struct OiBot<T: SerialTransport> {
    /// `None` 表示连接已关闭
    transport: Option<T>,
    response_timeout: Duration,
}

impl<T: SerialTransport> OiBot<T> {
    /// 在已打开的串口上创建驱动
    ///
    /// `init` 为 true 时立即发送 Start，机器人进入 Passive 模式。
    pub fn new(transport: T, init: bool, response_timeout: Duration) -> Result<Self, DriverError> {
        let mut bot = Self {
            transport: Some(transport),
            response_timeout,
        };
        if init {
            bot.send(&[opcode::START])?;
            info!("Open Interface started (passive)");
        }
        Ok(bot)
    }

    /// 连接是否仍然打开
    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    fn transport(&mut self) -> Result<&mut T, DriverError> {
        self.transport.as_mut().ok_or(DriverError::Closed)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), DriverError> {
        self.transport()?.write_all(bytes)?;
        Ok(())
    }
}

impl<T: SerialTransport> RobotDriver for OiBot<T> {
    fn info(&mut self) -> Result<Option<BotStatus>, DriverError> {
        let timeout = self.response_timeout;
        let transport = self.transport()?;
        transport.clear_input()?;
        transport.write_all(&STATUS_QUERY)?;

        let mut response = [0u8; STATUS_RESPONSE_LEN];
        let n = transport.read_full(&mut response, timeout)?;
        if n < STATUS_RESPONSE_LEN {
            debug!(
                "Incomplete status response: {} of {} bytes",
                n, STATUS_RESPONSE_LEN
            );
            return Ok(None);
        }

        match oi::decode_status_response(&response) {
            Ok(status) => Ok(Some(status)),
            Err(e) => {
                warn!("Could not decode status response: {}", e);
                Ok(None)
            },
        }
    }

    fn drive(&mut self, velocity_mm_s: i16, radius_mm: i16) -> Result<(), DriverError> {
        self.send(&oi::encode_drive(velocity_mm_s, radius_mm))
    }

    fn passive(&mut self) -> Result<(), DriverError> {
        self.send(&[opcode::START])
    }

    fn safe(&mut self) -> Result<(), DriverError> {
        self.send(&[opcode::SAFE])
    }

    fn full(&mut self) -> Result<(), DriverError> {
        self.send(&[opcode::FULL])
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        self.send(&[opcode::RESET])
    }

    fn power(&mut self) -> Result<(), DriverError> {
        self.send(&[opcode::POWER])
    }

    fn close(&mut self) -> Result<(), DriverError> {
        if let Some(mut transport) = self.transport.take() {
            // 串口随 transport 一起释放；Stop 发送失败不影响关闭
            if let Err(e) = transport.write_all(&[opcode::STOP]) {
                warn!("Failed to stop Open Interface before close: {}", e);
            }
            info!("Robot connection closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathy_protocol::OiMode;
    use cathy_serial::mock::MockTransport;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn test_init_sends_start() {
        let (transport, handle) = MockTransport::new();
        let _bot = OiBot::new(transport, true, TIMEOUT).unwrap();
        assert_eq!(handle.written(), vec![opcode::START]);
    }

    #[test]
    fn test_no_init_sends_nothing() {
        let (transport, handle) = MockTransport::new();
        let _bot = OiBot::new(transport, false, TIMEOUT).unwrap();
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_mode_commands_encoding() {
        let (transport, handle) = MockTransport::new();
        let mut bot = OiBot::new(transport, false, TIMEOUT).unwrap();
        bot.passive().unwrap();
        bot.safe().unwrap();
        bot.full().unwrap();
        bot.reset().unwrap();
        bot.power().unwrap();
        assert_eq!(handle.take_written(), vec![128, 131, 132, 7, 133]);

        bot.drive(-200, 500).unwrap();
        assert_eq!(handle.take_written(), vec![137, 0xFF, 0x38, 0x01, 0xF4]);
    }

    #[test]
    fn test_info_decodes_query_response() {
        let (transport, handle) = MockTransport::new();
        handle.set_responder(Box::new(|data| {
            (data == STATUS_QUERY).then(|| vec![3, 0x03, 0xE8, 0x0B, 0xB8])
        }));
        let mut bot = OiBot::new(transport, false, TIMEOUT).unwrap();

        let status = bot.info().unwrap().expect("status");
        assert_eq!(status.mode, OiMode::Full);
        assert_eq!(status.battery_charge_mah, 1000);
        assert_eq!(status.battery_capacity_mah, 3000);
    }

    /// 测试残留字节不会让状态应答错位
    #[test]
    fn test_info_discards_stale_input() {
        let (transport, handle) = MockTransport::new();
        // 上一次查询超时后迟到的半截应答
        handle.push_read(&[0x0B, 0xB8]);
        handle.set_responder(Box::new(|data| {
            (data == STATUS_QUERY).then(|| vec![2, 0x05, 0xDC, 0x0B, 0xB8])
        }));
        let mut bot = OiBot::new(transport, false, TIMEOUT).unwrap();

        let expected = BotStatus {
            mode: OiMode::Safe,
            battery_charge_mah: 1500,
            battery_capacity_mah: 3000,
        };
        for _ in 0..3 {
            assert_eq!(bot.info().unwrap(), Some(expected));
        }
    }

    #[test]
    fn test_info_without_response_is_none() {
        let (transport, _handle) = MockTransport::new();
        let mut bot = OiBot::new(transport, false, TIMEOUT).unwrap();
        assert_eq!(bot.info().unwrap(), None);
    }

    #[test]
    fn test_close_then_commands_fail() {
        let (transport, handle) = MockTransport::new();
        let mut bot = OiBot::new(transport, false, TIMEOUT).unwrap();
        bot.close().unwrap();
        assert!(!bot.is_open());
        assert_eq!(handle.take_written(), vec![opcode::STOP]);

        assert!(matches!(bot.safe(), Err(DriverError::Closed)));
        assert!(matches!(bot.info(), Err(DriverError::Closed)));
        // 重复关闭是无害的
        assert!(bot.close().is_ok());
    }

    #[test]
    fn test_write_failure_is_serial_error() {
        let (transport, handle) = MockTransport::new();
        let mut bot = OiBot::new(transport, false, TIMEOUT).unwrap();
        handle.fail_writes(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(bot.drive(0, 1), Err(DriverError::Serial(_))));
    }
}
