//! 连接状态定义
//!
//! 每个任务的连接状态由监督循环和任务的两个子循环共同读写，
//! 用原子变量保存，避免为一个枚举值加锁。

use std::sync::atomic::{AtomicU8, Ordering};

/// 连接状态
///
/// # 状态说明
///
/// - **NotOpened**: 尚未打开（初始状态，以及每次复位之后）
/// - **Open**: 设备已打开，子循环正常工作
/// - **Closed**: 复位序列已关闭设备，等待监督循环重启任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ConnectionState {
    #[default]
    NotOpened = 0,
    Open = 1,
    Closed = 2,
}

impl ConnectionState {
    /// 从 u8 转换
    ///
    /// 如果值无效，返回 NotOpened。
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::Closed,
            _ => Self::NotOpened,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// 连接状态（原子版本，用于线程间共享）
///
/// # 使用场景
///
/// - 监督循环在复位后标记 `NotOpened`
/// - 任务打开设备后标记 `Open`
/// - 命令消费循环执行复位序列后标记 `Closed`，状态轮询循环据此停止查询
#[derive(Debug, Default)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.get().is_open()
    }
}
