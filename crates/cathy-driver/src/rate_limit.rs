//! 命令限流
//!
//! 模式命令和行驶命令各自维护独立的时间窗口：
//!
//! - 模式命令：窗口内只放行一次，放行后无论是哪种模式都刷新时间戳
//! - 行驶命令：必须同时满足"窗口已过"和"方向与上次下发的不同"，
//!   两个条件互不替代（窗口过了但方向没变不会重发，方向变了也不能绕过窗口）
//!
//! 所有判断都以调用方传入的 `now` 为准，便于在测试中控制时间。

use cathy_protocol::{DriveBucket, UserCommand};
use std::time::{Duration, Instant};

/// 限流窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimits {
    /// 两次模式命令之间的最小间隔
    pub mode_interval: Duration,
    /// 两次行驶命令之间的最小间隔
    pub drive_interval: Duration,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            mode_interval: Duration::from_millis(1000),
            drive_interval: Duration::from_millis(500),
        }
    }
}

/// 命令限流器
///
/// 只由命令消费线程持有，不需要任何同步。
#[derive(Debug, Clone)]
pub struct CommandRateLimiter {
    limits: RateLimits,
    last_mode: Option<Instant>,
    last_drive: Option<Instant>,
    last_bucket: Option<DriveBucket>,
}

impl CommandRateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            last_mode: None,
            last_drive: None,
            last_bucket: None,
        }
    }

    /// 判断模式命令是否放行，放行时刷新模式时间戳
    pub fn admit_mode(&mut self, command: UserCommand, now: Instant) -> bool {
        if !command.is_mode_change() || !elapsed(self.last_mode, now, self.limits.mode_interval) {
            return false;
        }
        self.last_mode = Some(now);
        true
    }

    /// 判断行驶方向是否下发，下发时刷新时间戳并记住方向
    pub fn admit_drive(&mut self, bucket: DriveBucket, now: Instant) -> bool {
        if !elapsed(self.last_drive, now, self.limits.drive_interval) {
            return false;
        }
        if self.last_bucket == Some(bucket) {
            return false;
        }
        self.last_drive = Some(now);
        self.last_bucket = Some(bucket);
        true
    }

    /// 上次下发的行驶方向
    #[cfg(test)]
    fn last_bucket(&self) -> Option<DriveBucket> {
        self.last_bucket
    }

    /// 清空所有历史（机器人复位后使用）
    pub fn clear(&mut self) {
        self.last_mode = None;
        self.last_drive = None;
        self.last_bucket = None;
    }
}

impl Default for CommandRateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

fn elapsed(last: Option<Instant>, now: Instant, interval: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_duration_since(last) >= interval,
    }
}
