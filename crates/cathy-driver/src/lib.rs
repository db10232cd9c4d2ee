//! 驱动层模块
//!
//! 本模块提供 Create 机器人的设备驱动功能，包括：
//! - `RobotDriver` trait：任务层消费的驱动接口
//! - `OiBot`：基于串口的 Open Interface 实现
//! - 命令限流（`CommandRateLimiter`）与方向映射（`DriveMapper`）
//! - `CommandDispatcher`：把传感器记录转换为驱动调用
//! - 连接状态（`AtomicConnectionState`）

mod builder;
pub mod dispatch;
mod error;
pub mod mapper;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod oibot;
pub mod rate_limit;
mod robot;
pub mod state;

pub use builder::BotBuilder;
pub use dispatch::{CommandDispatcher, DispatchReport};
pub use error::DriverError;
pub use mapper::{DriveMapper, MIN_IR_INTENSITY};
pub use oibot::OiBot;
pub use rate_limit::{CommandRateLimiter, RateLimits};
pub use robot::RobotDriver;
pub use state::{AtomicConnectionState, ConnectionState};
