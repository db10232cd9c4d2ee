//! Bot 任务：机器人状态轮询 + 命令消费
//!
//! - 状态轮询：按固定周期查询 `info()`，把状态非阻塞地交给 Sense 任务的输出
//!   循环；机器人处于 Passive 模式时向自己的命令消费循环注入一条 Safe 命令
//! - 命令消费：接收传感器记录，经限流和方向映射后调用驱动
//!
//! 两个子循环共享同一个驱动实例（`Mutex`），限流状态只属于命令消费循环。

use crate::config::{BotConfig, CommandConfig};
use crate::error::SupervisorError;
use crate::signal::SignalEvent;
use crate::task::{SubLoops, SupervisedTask, TaskExit, signalled};
use cathy_driver::{
    AtomicConnectionState, CommandDispatcher, ConnectionState, DriveMapper, DriverError,
    RobotDriver,
};
use cathy_protocol::{BotStatus, DriveBucket, OiMode, SensorRecord, UserCommand};
use crossbeam_channel::{Receiver, Sender, select, tick};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// 打开机器人连接
pub type RobotFactory = Box<dyn FnMut() -> Result<Box<dyn RobotDriver>, DriverError> + Send>;

type SharedRobot = Arc<Mutex<Box<dyn RobotDriver>>>;

const STATUS_POLLER: &str = "bot-status";
const COMMAND_CONSUMER: &str = "bot-command";

/// Bot 任务与其它任务之间的通道
pub struct BotLinks {
    /// 传感器记录（来自 Sense 输入循环，以及本任务的自动恢复注入）
    pub records_rx: Receiver<SensorRecord>,
    /// 自动恢复注入用
    pub records_tx: Sender<SensorRecord>,
    /// 机器人状态（发往 Sense 输出循环）
    pub status_tx: Sender<Option<BotStatus>>,
    /// 复位序列完成后通知 Sense 任务重启
    pub sense_control: Sender<SignalEvent>,
}

/// Bot 任务
pub struct BotTask {
    open: RobotFactory,
    links: BotLinks,
    state: Arc<AtomicConnectionState>,
    status_poll: Duration,
    commands: CommandConfig,
}

impl BotTask {
    pub fn new(
        open: RobotFactory,
        links: BotLinks,
        state: Arc<AtomicConnectionState>,
        config: &BotConfig,
        commands: CommandConfig,
    ) -> Self {
        Self {
            open,
            links,
            state,
            status_poll: config.status_poll,
            commands,
        }
    }

    fn dispatcher(&self) -> CommandDispatcher {
        CommandDispatcher::new(
            self.commands.rate_limits(),
            DriveMapper::default(),
            self.commands.reset_settle,
        )
    }

    fn spawn_loops(&self, driver: &SharedRobot) -> Result<SubLoops, (SubLoops, SupervisorError)> {
        let mut loops = SubLoops::new("Bot");

        let poller = StatusPoller {
            driver: driver.clone(),
            state: self.state.clone(),
            status_tx: self.links.status_tx.clone(),
            records_tx: self.links.records_tx.clone(),
            interval: self.status_poll,
        };
        if let Err(e) = loops.spawn(STATUS_POLLER, move |control| poller.run(control)) {
            return Err((loops, e));
        }

        let consumer = CommandConsumer {
            driver: driver.clone(),
            state: self.state.clone(),
            dispatcher: self.dispatcher(),
            records_rx: self.links.records_rx.clone(),
            sense_control: self.links.sense_control.clone(),
        };
        if let Err(e) = loops.spawn(COMMAND_CONSUMER, move |control| consumer.run(control)) {
            return Err((loops, e));
        }

        Ok(loops)
    }
}

impl SupervisedTask for BotTask {
    fn name(&self) -> &'static str {
        "bot"
    }

    fn state(&self) -> &AtomicConnectionState {
        &self.state
    }

    fn run(&mut self, control: &Receiver<SignalEvent>) -> TaskExit {
        let driver = match (self.open)() {
            Ok(driver) => driver,
            Err(e) => {
                error!("Bot task: failed to open robot: {}", e);
                return TaskExit::Fault(e.into());
            },
        };
        self.state.set(ConnectionState::Open);
        info!("Bot task: robot connection open");

        let driver: SharedRobot = Arc::new(Mutex::new(driver));
        let exit = match self.spawn_loops(&driver) {
            Ok(loops) => loops.wait(control),
            Err((loops, e)) => loops.abort(e),
        };

        if let Err(e) = driver.lock().close() {
            warn!("Bot task: failed to close robot: {}", e);
        }
        self.state.set(ConnectionState::Closed);
        exit
    }
}

/// 状态轮询循环
struct StatusPoller {
    driver: SharedRobot,
    state: Arc<AtomicConnectionState>,
    status_tx: Sender<Option<BotStatus>>,
    records_tx: Sender<SensorRecord>,
    interval: Duration,
}

impl StatusPoller {
    fn run(self, control: Receiver<SignalEvent>) -> TaskExit {
        let ticker = tick(self.interval);
        loop {
            select! {
                recv(control) -> event => return signalled("Bot status poller", event),
                recv(ticker) -> _ => {
                    // 复位序列已关闭连接，等待 Sense 任务的通知
                    if !self.state.is_open() {
                        continue;
                    }

                    let result = self.driver.lock().info();
                    let status = match result {
                        Ok(status) => status,
                        Err(e) => {
                            error!("Bot status poller: robot query failed: {}", e);
                            return TaskExit::Fault(e.into());
                        },
                    };
                    match &status {
                        Some(s) => debug!(
                            "Bot status poller: mode={:?}, battery={}/{} mAh",
                            s.mode, s.battery_charge_mah, s.battery_capacity_mah
                        ),
                        None => warn!("Bot status poller: could not decode robot status"),
                    }

                    if self.status_tx.try_send(status).is_err() {
                        trace!("Bot status poller: status relay busy, dropping status");
                    }

                    if matches!(status, Some(BotStatus { mode: OiMode::Passive, .. })) {
                        info!("Bot status poller: robot is passive, injecting safe command");
                        let record = SensorRecord::injected(UserCommand::Safe);
                        select! {
                            send(self.records_tx, record) -> res => {
                                if res.is_err() {
                                    return TaskExit::Terminate;
                                }
                            },
                            recv(control) -> event => return signalled("Bot status poller", event),
                        }
                    }
                },
            }
        }
    }
}

/// 命令消费循环
struct CommandConsumer {
    driver: SharedRobot,
    state: Arc<AtomicConnectionState>,
    dispatcher: CommandDispatcher,
    records_rx: Receiver<SensorRecord>,
    sense_control: Sender<SignalEvent>,
}

impl CommandConsumer {
    fn run(mut self, control: Receiver<SignalEvent>) -> TaskExit {
        let records_rx = self.records_rx.clone();
        loop {
            select! {
                recv(control) -> event => {
                    if matches!(event, Ok(SignalEvent::Terminate) | Err(_)) {
                        self.stop_robot();
                    }
                    return signalled("Bot command consumer", event);
                },
                recv(records_rx) -> record => {
                    let Ok(record) = record else {
                        return TaskExit::Terminate;
                    };
                    if let Some(exit) = self.handle(&record, &control) {
                        return exit;
                    }
                },
            }
        }
    }

    fn handle(&mut self, record: &SensorRecord, control: &Receiver<SignalEvent>) -> Option<TaskExit> {
        if !self.state.is_open() {
            trace!("Bot command consumer: connection closed, discarding {:?}", record);
            return None;
        }

        let result = {
            let mut driver = self.driver.lock();
            self.dispatcher.apply(&mut **driver, record, Instant::now())
        };
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("Bot command consumer: robot command failed: {}", e);
                return Some(TaskExit::Fault(e.into()));
            },
        };
        if !report.reset_performed {
            return None;
        }

        self.state.set(ConnectionState::Closed);
        info!("Bot command consumer: robot reset, restarting sense task");
        select! {
            send(self.sense_control, SignalEvent::Reset) -> res => {
                if res.is_err() {
                    warn!("Bot command consumer: sense task is gone, reset not propagated");
                }
                None
            },
            recv(control) -> event => Some(signalled("Bot command consumer", event)),
        }
    }

    /// 终止前停车并退回 Passive 模式
    fn stop_robot(&self) {
        if !self.state.is_open() {
            return;
        }
        let stop = DriveBucket::Stop.vector();
        let mut driver = self.driver.lock();
        let result = driver
            .drive(stop.velocity_mm_s, stop.radius_mm)
            .and_then(|()| driver.passive());
        if let Err(e) = result {
            warn!("Bot command consumer: failed to stop robot: {}", e);
        }
    }
}
