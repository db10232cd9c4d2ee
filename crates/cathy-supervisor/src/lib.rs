//! # Cathy Supervisor
//!
//! 机器人与传感器板之间的桥接任务及其监督逻辑。
//!
//! ## 结构
//!
//! - **Bot 任务**：状态轮询循环 + 命令消费循环（[`BotTask`]）
//! - **Sense 任务**：输入轮询循环 + 状态输出循环（[`SenseTask`]）
//! - **监督循环**：[`run_supervised`] 在复位或故障后重新运行任务
//! - **根监督器**：[`Supervisor`] 分发控制信号并负责带截止时间的关闭
//!
//! ## 复位协议
//!
//! 复位信号只发给 Sense 任务。Sense 任务重启后再通知 Bot 任务，
//! 因此 Bot 任务的重启永远不会早于 Sense 任务。
//!
//! ## 示例
//!
//! ```no_run
//! use cathy_driver::{BotBuilder, RobotDriver};
//! use cathy_serial::{SerialConfig, SerialPortTransport};
//! use cathy_supervisor::{SensorLink, SignalEvent, Supervisor, SupervisorConfig};
//! use crossbeam_channel::unbounded;
//!
//! let config = SupervisorConfig::default();
//! let robot = BotBuilder::new("/dev/ttyUSB0");
//! let sensor = SerialConfig::new("/dev/ttyACM0", config.sense.baud_rate, config.sense.read_timeout);
//!
//! let supervisor = Supervisor::new(
//!     config,
//!     Box::new(move || robot.build().map(|bot| Box::new(bot) as Box<dyn RobotDriver>)),
//!     Box::new(move || SerialPortTransport::open(&sensor).and_then(SensorLink::split)),
//! );
//!
//! let (signal_tx, signal_rx) = unbounded();
//! signal_tx.send(SignalEvent::Terminate).unwrap();
//! let outcome = supervisor.run(&signal_rx).unwrap();
//! std::process::exit(outcome.exit_code());
//! ```

mod bot_task;
pub mod config;
mod error;
mod sense_task;
mod signal;
mod supervisor;
mod task;

pub use bot_task::{BotLinks, BotTask, RobotFactory};
pub use config::{BotConfig, CommandConfig, SenseConfig, SupervisorConfig};
pub use error::SupervisorError;
pub use sense_task::{SenseLinks, SenseTask, SensorFactory, SensorLink};
pub use signal::{RouteFilter, SignalEvent, SignalRouter};
pub use supervisor::{ShutdownOutcome, SupervisedExit, Supervisor, run_supervised};
pub use task::{SupervisedTask, TaskExit};
