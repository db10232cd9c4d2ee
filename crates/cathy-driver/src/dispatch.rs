//! 传感器记录 → 驱动调用
//!
//! `CommandDispatcher` 由 Bot 任务的命令消费循环独占，
//! 每收到一条记录调用一次 [`CommandDispatcher::apply`]。

use crate::error::DriverError;
use crate::mapper::DriveMapper;
use crate::rate_limit::{CommandRateLimiter, RateLimits};
use crate::robot::RobotDriver;
use cathy_protocol::{DriveBucket, SensorRecord, UserCommand};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// 默认复位等待时间（Passive 与 Reset 之间）
pub const DEFAULT_RESET_SETTLE: Duration = Duration::from_millis(500);

/// 一次 `apply` 实际下发的内容
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// 被放行的模式命令
    pub mode: Option<UserCommand>,
    /// 被下发的行驶方向
    pub drive: Option<DriveBucket>,
    /// 是否执行了复位序列（此时连接已关闭）
    pub reset_performed: bool,
}

#[cfg(test)]
impl DispatchReport {
    /// 是否向驱动发出了任何调用
    fn is_empty(&self) -> bool {
        self.mode.is_none() && self.drive.is_none()
    }
}

/// 命令分发器
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    limiter: CommandRateLimiter,
    mapper: DriveMapper,
    reset_settle: Duration,
}

impl CommandDispatcher {
    pub fn new(limits: RateLimits, mapper: DriveMapper, reset_settle: Duration) -> Self {
        Self {
            limiter: CommandRateLimiter::new(limits),
            mapper,
            reset_settle,
        }
    }

    /// 处理一条记录
    ///
    /// 先处理模式命令，再处理行驶方向。复位（Reset）和关机（Off）之后
    /// 本条记录不再下发行驶命令。
    ///
    /// # 复位序列
    ///
    /// `passive → 等待 reset_settle → reset → close`。返回后驱动已关闭，
    /// 调用方负责更新连接状态并通知 Sense 任务。
    pub fn apply(
        &mut self,
        driver: &mut dyn RobotDriver,
        record: &SensorRecord,
        now: Instant,
    ) -> Result<DispatchReport, DriverError> {
        let mut report = DispatchReport::default();

        let command = record.user_command;
        if self.limiter.admit_mode(command, now) {
            report.mode = Some(command);
            info!(
                "Sending {} (injected: {}, angle: {}, intensity: {:.1})",
                command, record.injected, record.ir_angle, record.ir_intensity
            );
            match command {
                UserCommand::Passive => driver.passive()?,
                UserCommand::Safe => driver.safe()?,
                UserCommand::Full => driver.full()?,
                UserCommand::Off => {
                    driver.power()?;
                    return Ok(report);
                },
                UserCommand::Reset => {
                    self.reset(driver)?;
                    report.reset_performed = true;
                    return Ok(report);
                },
                UserCommand::None | UserCommand::Track => {},
            }
        }

        let bucket = self.mapper.bucket(record);
        if self.limiter.admit_drive(bucket, now) {
            let vector = bucket.vector();
            debug!(
                "Drive {:?}: {} mm/s, radius {} mm (angle: {}, intensity: {:.1})",
                bucket, vector.velocity_mm_s, vector.radius_mm, record.ir_angle, record.ir_intensity
            );
            driver.drive(vector.velocity_mm_s, vector.radius_mm)?;
            report.drive = Some(bucket);
        }

        Ok(report)
    }

    fn reset(&mut self, driver: &mut dyn RobotDriver) -> Result<(), DriverError> {
        driver.passive()?;
        if !self.reset_settle.is_zero() {
            std::thread::sleep(self.reset_settle);
        }
        driver.reset()?;
        driver.close()?;
        self.limiter.clear();
        info!("Robot reset sequence complete, connection closed");
        Ok(())
    }
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self::new(RateLimits::default(), DriveMapper::default(), DEFAULT_RESET_SETTLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRobot, MockRobotHandle, RobotCall};

    fn dispatcher() -> CommandDispatcher {
        CommandDispatcher::new(RateLimits::default(), DriveMapper::default(), Duration::ZERO)
    }

    fn command(cmd: UserCommand) -> SensorRecord {
        SensorRecord {
            user_command: cmd,
            ..SensorRecord::default()
        }
    }

    fn ir(angle: i16, intensity: f32) -> SensorRecord {
        SensorRecord {
            ir_angle: angle,
            ir_intensity: intensity,
            ..SensorRecord::default()
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn mode_calls(handle: &MockRobotHandle) -> Vec<RobotCall> {
        handle
            .calls()
            .into_iter()
            .filter(|call| !matches!(call, RobotCall::Drive(..)))
            .collect()
    }

    /// 测试窗口内的两条模式命令只下发一次
    #[test]
    fn test_mode_rate_limited() {
        let (mut robot, handle) = MockRobot::new();
        let mut dispatcher = dispatcher();
        let t0 = Instant::now();

        dispatcher.apply(&mut robot, &command(UserCommand::Safe), t0).unwrap();
        dispatcher.apply(&mut robot, &command(UserCommand::Full), t0 + ms(300)).unwrap();
        assert_eq!(mode_calls(&handle), vec![RobotCall::Safe]);

        dispatcher.apply(&mut robot, &command(UserCommand::Full), t0 + ms(1000)).unwrap();
        assert_eq!(mode_calls(&handle), vec![RobotCall::Safe, RobotCall::Full]);
    }

    /// 测试相同方向不重复下发
    #[test]
    fn test_drive_deduplicated() {
        let (mut robot, handle) = MockRobot::new();
        let mut dispatcher = dispatcher();
        let t0 = Instant::now();

        let report = dispatcher.apply(&mut robot, &ir(0, 80.0), t0).unwrap();
        assert_eq!(report.drive, Some(DriveBucket::Fwd));
        for i in 1..=4 {
            let report = dispatcher.apply(&mut robot, &ir(3, 75.0), t0 + ms(600 * i)).unwrap();
            assert!(report.is_empty());
        }
        let report = dispatcher.apply(&mut robot, &ir(-90, 75.0), t0 + ms(3000)).unwrap();
        assert_eq!(report.drive, Some(DriveBucket::Left));

        let fwd = DriveBucket::Fwd.vector();
        let left = DriveBucket::Left.vector();
        assert_eq!(
            handle.take_calls(),
            vec![
                RobotCall::Drive(fwd.velocity_mm_s, fwd.radius_mm),
                RobotCall::Drive(left.velocity_mm_s, left.radius_mm),
            ]
        );
    }

    /// 测试复位序列
    #[test]
    fn test_reset_sequence() {
        let (mut robot, handle) = MockRobot::new();
        let mut dispatcher = dispatcher();

        let mut record = command(UserCommand::Reset);
        record.ir_intensity = 90.0;
        let report = dispatcher.apply(&mut robot, &record, Instant::now()).unwrap();

        assert!(report.reset_performed);
        assert_eq!(report.drive, None);
        assert_eq!(
            handle.take_calls(),
            vec![RobotCall::Passive, RobotCall::Reset, RobotCall::Close]
        );
    }

    /// 测试 Track 不下发命令，也不占用模式窗口
    #[test]
    fn test_track_leaves_mode_window_open() {
        let (mut robot, handle) = MockRobot::new();
        let mut dispatcher = dispatcher();
        let t0 = Instant::now();

        let report = dispatcher.apply(&mut robot, &command(UserCommand::Track), t0).unwrap();
        assert_eq!(report.mode, None);
        // 只有哨兵记录对应的 Stop
        let stop = DriveBucket::Stop.vector();
        assert_eq!(
            handle.take_calls(),
            vec![RobotCall::Drive(stop.velocity_mm_s, stop.radius_mm)]
        );

        let report = dispatcher.apply(&mut robot, &command(UserCommand::Safe), t0 + ms(10)).unwrap();
        assert_eq!(report.mode, Some(UserCommand::Safe));
        assert_eq!(handle.take_calls(), vec![RobotCall::Safe]);
    }

    #[test]
    fn test_off_powers_down_without_drive() {
        let (mut robot, handle) = MockRobot::new();
        let mut dispatcher = dispatcher();

        let mut record = command(UserCommand::Off);
        record.ir_angle = 0;
        record.ir_intensity = 90.0;
        dispatcher.apply(&mut robot, &record, Instant::now()).unwrap();
        assert_eq!(handle.take_calls(), vec![RobotCall::Power]);
    }

    #[test]
    fn test_driver_error_propagates() {
        let (mut robot, handle) = MockRobot::new();
        let mut dispatcher = dispatcher();
        handle.fail_commands(true);
        let result = dispatcher.apply(&mut robot, &command(UserCommand::Safe), Instant::now());
        assert!(matches!(result, Err(DriverError::Serial(_))));
    }
}
