//! 运行配置
//!
//! [`SupervisorConfig`] 是运行时使用的配置（`Duration` 等强类型），
//! 可以从 TOML 文件加载。文件中所有字段都是可选的，时间单位为毫秒：
//!
//! ```toml
//! [bot]
//! baud_rate = 115200
//! read_timeout_ms = 100
//! status_poll_ms = 500
//! init = true
//!
//! [sense]
//! baud_rate = 115200
//! read_timeout_ms = 50
//! input_poll_ms = 10
//!
//! [commands]
//! mode_interval_ms = 1000
//! drive_interval_ms = 500
//! reset_settle_ms = 500
//!
//! [supervisor]
//! shutdown_timeout_ms = 5000
//! restart_backoff_ms = 1000
//! reset_notify_timeout_ms = 2000
//! ```

use crate::error::SupervisorError;
use cathy_driver::RateLimits;
use cathy_protocol::oi::DEFAULT_BAUD_RATE;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// 机器人链路配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotConfig {
    pub baud_rate: u32,
    /// 状态应答超时
    pub read_timeout: Duration,
    /// 状态轮询周期
    pub status_poll: Duration,
    /// 打开后是否发送 Start
    pub init: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
            status_poll: Duration::from_millis(500),
            init: true,
        }
    }
}

/// 传感器链路配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenseConfig {
    pub baud_rate: u32,
    /// 单次读取超时
    pub read_timeout: Duration,
    /// 输入轮询周期
    pub input_poll: Duration,
}

impl Default for SenseConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(50),
            input_poll: Duration::from_millis(10),
        }
    }
}

/// 命令限流配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandConfig {
    pub mode_interval: Duration,
    pub drive_interval: Duration,
    /// 复位序列中 Passive 与 Reset 之间的等待
    pub reset_settle: Duration,
}

impl CommandConfig {
    pub fn rate_limits(&self) -> RateLimits {
        RateLimits {
            mode_interval: self.mode_interval,
            drive_interval: self.drive_interval,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        let limits = RateLimits::default();
        Self {
            mode_interval: limits.mode_interval,
            drive_interval: limits.drive_interval,
            reset_settle: cathy_driver::dispatch::DEFAULT_RESET_SETTLE,
        }
    }
}

/// 监督器配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub bot: BotConfig,
    pub sense: SenseConfig,
    pub commands: CommandConfig,
    /// 终止后等待两个任务退出的最长时间，超时即强制退出
    pub shutdown_timeout: Duration,
    /// 故障后重新运行任务之前的等待
    pub restart_backoff: Duration,
    /// Sense 任务重启后通知 Bot 任务的最长等待
    pub reset_notify_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            sense: SenseConfig::default(),
            commands: CommandConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
            restart_backoff: Duration::from_secs(1),
            reset_notify_timeout: Duration::from_secs(2),
        }
    }
}

impl SupervisorConfig {
    /// 从 TOML 字符串解析（在默认值基础上覆盖）
    pub fn from_toml_str(content: &str) -> Result<Self, SupervisorError> {
        let file: ConfigFile = toml::from_str(content)?;
        let mut config = Self::default();
        config.apply(file);
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SupervisorError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 检查取值范围
    ///
    /// 轮询周期为 0 时 tick 通道会持续就绪，轮询循环将占满一个 CPU 核。
    pub(crate) fn validate(&self) -> Result<(), SupervisorError> {
        non_zero("bot.status_poll_ms", self.bot.status_poll)?;
        non_zero("sense.input_poll_ms", self.sense.input_poll)?;
        Ok(())
    }

    fn apply(&mut self, file: ConfigFile) {
        let ConfigFile {
            bot,
            sense,
            commands,
            supervisor,
        } = file;

        set(&mut self.bot.baud_rate, bot.baud_rate);
        set_ms(&mut self.bot.read_timeout, bot.read_timeout_ms);
        set_ms(&mut self.bot.status_poll, bot.status_poll_ms);
        set(&mut self.bot.init, bot.init);

        set(&mut self.sense.baud_rate, sense.baud_rate);
        set_ms(&mut self.sense.read_timeout, sense.read_timeout_ms);
        set_ms(&mut self.sense.input_poll, sense.input_poll_ms);

        set_ms(&mut self.commands.mode_interval, commands.mode_interval_ms);
        set_ms(&mut self.commands.drive_interval, commands.drive_interval_ms);
        set_ms(&mut self.commands.reset_settle, commands.reset_settle_ms);

        set_ms(&mut self.shutdown_timeout, supervisor.shutdown_timeout_ms);
        set_ms(&mut self.restart_backoff, supervisor.restart_backoff_ms);
        set_ms(&mut self.reset_notify_timeout, supervisor.reset_notify_timeout_ms);
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn set_ms(target: &mut Duration, value: Option<u64>) {
    set(target, value.map(Duration::from_millis));
}

fn non_zero(key: &'static str, value: Duration) -> Result<(), SupervisorError> {
    if value.is_zero() {
        return Err(SupervisorError::InvalidConfig {
            key,
            reason: "must be greater than zero",
        });
    }
    Ok(())
}

/// 配置文件结构
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    bot: BotSection,
    sense: SenseSection,
    commands: CommandSection,
    supervisor: SupervisorSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BotSection {
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    status_poll_ms: Option<u64>,
    init: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SenseSection {
    baud_rate: Option<u32>,
    read_timeout_ms: Option<u64>,
    input_poll_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CommandSection {
    mode_interval_ms: Option<u64>,
    drive_interval_ms: Option<u64>,
    reset_settle_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SupervisorSection {
    shutdown_timeout_ms: Option<u64>,
    restart_backoff_ms: Option<u64>,
    reset_notify_timeout_ms: Option<u64>,
}
