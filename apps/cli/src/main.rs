//! # Cathy's Drive
//!
//! 连接 Create 机器人与传感器板的串口桥接程序。
//!
//! ```bash
//! cathys-drive /dev/ttyUSB0 /dev/ttyACM0
//!
//! # 使用配置文件并提高日志级别
//! cathys-drive /dev/ttyUSB0 /dev/ttyACM0 --config drive.toml --log-level debug
//! ```
//!
//! ## 信号
//!
//! - `SIGINT` / `SIGTERM`：停车并退出
//! - `SIGUSR1`：按 Sense → Bot 的顺序重启两个任务
//!
//! ## 退出码
//!
//! | 退出码 | 含义 |
//! |---|---|
//! | 0 | 正常退出 |
//! | 1 | 启动失败（参数、配置、信号注册） |
//! | 2 | 至少一个任务的最后一次运行以 IO 故障结束 |
//! | 3 | 关闭超时，强制退出 |

use anyhow::{Context, Result};
use cathy_driver::{BotBuilder, RobotDriver};
use cathy_serial::{SerialConfig, SerialPortTransport};
use cathy_supervisor::{
    RobotFactory, SensorFactory, SensorLink, ShutdownOutcome, SignalEvent, Supervisor,
};
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use signal_hook::consts::{SIGINT, SIGTERM, SIGUSR1};
use signal_hook::iterator::Signals;
use std::process::ExitCode;
use std::thread;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod settings;

use settings::Overrides;

/// 启动失败的退出码
const EXIT_STARTUP: u8 = 1;

/// 未设置 RUST_LOG 时的默认日志级别
const DEFAULT_LOG_DIRECTIVES: &str = "cathys_drive=info,cathy_supervisor=info,cathy_driver=info,cathy_serial=info";

/// 本项目的日志 target（`--log-level` 作用于这些 target）
const LOG_TARGETS: [&str; 5] = [
    "cathys_drive",
    "cathy_supervisor",
    "cathy_driver",
    "cathy_serial",
    "cathy_protocol",
];

/// Cathy's Drive - 机器人与传感器板串口桥接
#[derive(Parser, Debug)]
#[command(name = "cathys-drive")]
#[command(about = "Serial bridge between a Create robot and the Cathy sensor board", long_about = None)]
#[command(version)]
struct Cli {
    /// 机器人串口设备（如 /dev/ttyUSB0）
    robot: String,

    /// 传感器板串口设备（如 /dev/ttyACM0）
    sensor: String,

    /// 配置文件路径（默认：<配置目录>/cathys-drive/config.toml，存在时加载）
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// 日志级别（trace, debug, info, warn, error）
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(flatten)]
    overrides: Overrides,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_level.as_deref()) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::from(EXIT_STARTUP);
    }

    match run(cli) {
        Ok(ShutdownOutcome::ForcedTimeout) => {
            // 仍有线程挂在串口读取上，不等它们
            std::process::exit(ShutdownOutcome::ForcedTimeout.exit_code());
        },
        Ok(outcome) => ExitCode::from(outcome.exit_code() as u8),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_STARTUP)
        },
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let mut filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVES));
    if let Some(level) = level {
        for target in LOG_TARGETS {
            let directive = format!("{}={}", target, level)
                .parse()
                .with_context(|| format!("invalid log level '{}'", level))?;
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn run(cli: Cli) -> Result<ShutdownOutcome> {
    let config = settings::resolve(cli.config.as_deref(), &cli.overrides)?;
    info!(
        "Starting: robot={} ({} baud), sensor={} ({} baud)",
        cli.robot, config.bot.baud_rate, cli.sensor, config.sense.baud_rate
    );

    let builder = BotBuilder::new(cli.robot.as_str())
        .baud_rate(config.bot.baud_rate)
        .init(config.bot.init)
        .read_timeout(config.bot.read_timeout);
    let robot: RobotFactory =
        Box::new(move || builder.build().map(|bot| Box::new(bot) as Box<dyn RobotDriver>));

    let sensor_config =
        SerialConfig::new(cli.sensor.as_str(), config.sense.baud_rate, config.sense.read_timeout);
    let sensor: SensorFactory =
        Box::new(move || SerialPortTransport::open(&sensor_config).and_then(SensorLink::split));

    let (signal_tx, signal_rx) = unbounded();
    spawn_signal_thread(signal_tx)?;

    let outcome = Supervisor::new(config, robot, sensor)
        .run(&signal_rx)
        .context("supervisor failed to start")?;
    info!("Exiting: {:?}", outcome);
    Ok(outcome)
}

/// 把操作系统信号映射为 [`SignalEvent`]
fn spawn_signal_thread(tx: Sender<SignalEvent>) -> Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM, SIGUSR1]).context("failed to register signal handlers")?;

    thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                let event = signal_event(signal);
                info!("Received signal {}, {}", signal, event);
                if tx.send(event).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn signal handler thread")?;
    Ok(())
}

fn signal_event(signal: i32) -> SignalEvent {
    match signal {
        SIGUSR1 => SignalEvent::Reset,
        _ => SignalEvent::Terminate,
    }
}
