//! 配置解析：配置文件 + 命令行覆盖

use anyhow::{Context, Result};
use cathy_supervisor::SupervisorConfig;
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// 命令行覆盖项（优先于配置文件）
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// 机器人串口波特率
    #[arg(long)]
    pub bot_baud: Option<u32>,

    /// 传感器串口波特率
    #[arg(long)]
    pub sense_baud: Option<u32>,

    /// 打开机器人串口后不发送 Start
    #[arg(long)]
    pub no_init: bool,

    /// 关闭超时（毫秒），超时后强制退出
    #[arg(long, value_name = "MS")]
    pub shutdown_timeout_ms: Option<u64>,
}

/// 默认配置文件路径
fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cathys-drive").join("config.toml"))
}

/// 加载配置并应用命令行覆盖
///
/// 显式指定的配置文件必须存在；默认路径下没有文件时使用默认配置。
pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<SupervisorConfig> {
    let mut config = match path {
        Some(path) => load(path)?,
        None => match default_config_file() {
            Some(path) if path.exists() => load(&path)?,
            _ => {
                debug!("No config file, using defaults");
                SupervisorConfig::default()
            },
        },
    };
    overrides.apply(&mut config);
    Ok(config)
}

fn load(path: &Path) -> Result<SupervisorConfig> {
    info!("Loading config from {}", path.display());
    SupervisorConfig::load(path).with_context(|| format!("failed to load config {}", path.display()))
}

impl Overrides {
    fn apply(&self, config: &mut SupervisorConfig) {
        if let Some(baud) = self.bot_baud {
            config.bot.baud_rate = baud;
        }
        if let Some(baud) = self.sense_baud {
            config.sense.baud_rate = baud;
        }
        if self.no_init {
            config.bot.init = false;
        }
        if let Some(ms) = self.shutdown_timeout_ms {
            config.shutdown_timeout = Duration::from_millis(ms);
        }
    }
}
