//! Mock 机器人（无硬件依赖，用于测试）
//!
//! `MockRobot` 记录每一次驱动调用，测试通过 `MockRobotHandle` 读取调用记录、
//! 设置 `info()` 返回的状态以及注入串口故障。

use crate::error::DriverError;
use crate::robot::RobotDriver;
use cathy_protocol::BotStatus;
use cathy_serial::SerialError;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// 一次驱动调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotCall {
    Info,
    Drive(i16, i16),
    Passive,
    Safe,
    Full,
    Reset,
    Power,
    Close,
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<RobotCall>,
    status: Option<BotStatus>,
    fail_info: bool,
    fail_commands: bool,
    closed: bool,
}

/// Mock 机器人的控制句柄
#[derive(Debug, Clone, Default)]
pub struct MockRobotHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockRobotHandle {
    /// 所有调用（不含 `Info`）
    pub fn calls(&self) -> Vec<RobotCall> {
        self.state
            .lock()
            .calls
            .iter()
            .copied()
            .filter(|call| *call != RobotCall::Info)
            .collect()
    }

    /// 取走所有调用（不含 `Info`）
    pub fn take_calls(&self) -> Vec<RobotCall> {
        let calls = self.calls();
        self.state.lock().calls.clear();
        calls
    }

    /// `info()` 被调用的次数
    pub fn info_count(&self) -> usize {
        self.state.lock().calls.iter().filter(|call| **call == RobotCall::Info).count()
    }

    pub fn set_status(&self, status: Option<BotStatus>) {
        self.state.lock().status = status;
    }

    /// 让 `info()` 返回串口错误
    pub fn fail_info(&self, fail: bool) {
        self.state.lock().fail_info = fail;
    }

    /// 让所有命令返回串口错误
    pub fn fail_commands(&self, fail: bool) {
        self.state.lock().fail_commands = fail;
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

/// Mock 机器人
#[derive(Debug, Default)]
pub struct MockRobot {
    handle: MockRobotHandle,
}

impl MockRobot {
    pub fn new() -> (Self, MockRobotHandle) {
        let handle = MockRobotHandle::default();
        (Self::from_handle(&handle), handle)
    }

    /// 与已有句柄共享状态（用于模拟重新打开同一台机器人）
    pub fn from_handle(handle: &MockRobotHandle) -> Self {
        handle.state.lock().closed = false;
        Self {
            handle: handle.clone(),
        }
    }

    fn command(&mut self, call: RobotCall) -> Result<(), DriverError> {
        let mut state = self.handle.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.calls.push(call);
        if state.fail_commands {
            return Err(io_error().into());
        }
        Ok(())
    }
}

fn io_error() -> SerialError {
    SerialError::Io(io::Error::from(io::ErrorKind::BrokenPipe))
}

impl RobotDriver for MockRobot {
    fn info(&mut self) -> Result<Option<BotStatus>, DriverError> {
        let mut state = self.handle.state.lock();
        if state.closed {
            return Err(DriverError::Closed);
        }
        state.calls.push(RobotCall::Info);
        if state.fail_info {
            return Err(io_error().into());
        }
        Ok(state.status)
    }

    fn drive(&mut self, velocity_mm_s: i16, radius_mm: i16) -> Result<(), DriverError> {
        self.command(RobotCall::Drive(velocity_mm_s, radius_mm))
    }

    fn passive(&mut self) -> Result<(), DriverError> {
        self.command(RobotCall::Passive)
    }

    fn safe(&mut self) -> Result<(), DriverError> {
        self.command(RobotCall::Safe)
    }

    fn full(&mut self) -> Result<(), DriverError> {
        self.command(RobotCall::Full)
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        self.command(RobotCall::Reset)
    }

    fn power(&mut self) -> Result<(), DriverError> {
        self.command(RobotCall::Power)
    }

    fn close(&mut self) -> Result<(), DriverError> {
        let mut state = self.handle.state.lock();
        if !state.closed {
            state.calls.push(RobotCall::Close);
            state.closed = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathy_protocol::OiMode;

    #[test]
    fn test_mock_records_calls() {
        let (mut robot, handle) = MockRobot::new();
        robot.safe().unwrap();
        robot.drive(200, 500).unwrap();
        assert_eq!(robot.info().unwrap(), None);
        assert_eq!(handle.calls(), vec![RobotCall::Safe, RobotCall::Drive(200, 500)]);
        assert_eq!(handle.info_count(), 1);
    }

    #[test]
    fn test_mock_status_and_close() {
        let (mut robot, handle) = MockRobot::new();
        let status = BotStatus {
            mode: OiMode::Safe,
            battery_charge_mah: 1500,
            battery_capacity_mah: 3000,
        };
        handle.set_status(Some(status));
        assert_eq!(robot.info().unwrap(), Some(status));

        robot.close().unwrap();
        assert!(handle.is_closed());
        assert!(matches!(robot.safe(), Err(DriverError::Closed)));

        // 重新打开后可继续使用
        let mut reopened = MockRobot::from_handle(&handle);
        assert!(reopened.safe().is_ok());
    }
}
