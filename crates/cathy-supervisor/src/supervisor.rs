//! 任务监督与关闭流程

use crate::bot_task::{BotLinks, BotTask, RobotFactory};
use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::sense_task::{SenseLinks, SenseTask, SensorFactory};
use crate::signal::{RouteFilter, SignalEvent, SignalRouter};
use crate::task::{SupervisedTask, TaskExit};
use cathy_driver::{AtomicConnectionState, ConnectionState};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// 带超时的线程 join
trait JoinTimeout<T> {
    fn join_timeout(self, timeout: Duration) -> Result<T, JoinTimeoutError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinTimeoutError {
    TimedOut,
    Panicked,
}

impl<T: Send + 'static> JoinTimeout<T> for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> Result<T, JoinTimeoutError> {
        let (tx, rx) = mpsc::channel();

        // 由看门狗线程执行 join；超时后它继续挂着，进程退出时一并回收
        thread::spawn(move || {
            let _ = tx.send(self.join());
        });

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(JoinTimeoutError::Panicked)
            },
            Err(mpsc::RecvTimeoutError::Timeout) => Err(JoinTimeoutError::TimedOut),
        }
    }
}

/// 一个任务的监督结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisedExit {
    pub task: &'static str,
    /// 运行次数
    pub runs: u32,
    /// 以故障结束的运行次数
    pub faults: u32,
    /// 最后一次运行是否以故障结束
    pub last_run_faulted: bool,
}

/// 反复运行一个任务，直到收到 Terminate
///
/// - Reset：连接状态标记为 `NotOpened`，调用 `on_reset` 后立即重新运行
/// - Fault：等待 `restart_backoff` 后重新运行；等待期间的 Terminate 结束监督，
///   Reset 按复位处理
/// - Terminate：返回
pub fn run_supervised<T: SupervisedTask + ?Sized>(
    task: &mut T,
    control: &Receiver<SignalEvent>,
    restart_backoff: Duration,
) -> SupervisedExit {
    let mut exit = SupervisedExit {
        task: task.name(),
        runs: 0,
        faults: 0,
        last_run_faulted: false,
    };

    loop {
        exit.runs += 1;
        let result = task.run(control);
        exit.last_run_faulted = result.is_fault();

        let reset = match result {
            TaskExit::Terminate => {
                info!("{} supervisor: terminated after {} run(s)", exit.task, exit.runs);
                return exit;
            },
            TaskExit::Reset => true,
            TaskExit::Fault(e) => {
                exit.faults += 1;
                error!(
                    "{} supervisor: run failed: {}, restarting in {:?}",
                    exit.task, e, restart_backoff
                );
                match control.recv_timeout(restart_backoff) {
                    Ok(SignalEvent::Terminate) | Err(RecvTimeoutError::Disconnected) => {
                        info!("{} supervisor: terminated during restart backoff", exit.task);
                        return exit;
                    },
                    Ok(SignalEvent::Reset) => true,
                    Err(RecvTimeoutError::Timeout) => false,
                }
            },
        };

        task.state().set(ConnectionState::NotOpened);
        if reset {
            info!("{} supervisor: restarting after reset", exit.task);
            task.on_reset();
        }
    }
}

/// 关闭结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// 两个任务都正常退出
    Clean,
    /// 两个任务都已退出，但至少一个任务的最后一次运行以 IO 故障结束
    IoFailure,
    /// 截止时间内任务没有全部退出
    ForcedTimeout,
}

impl ShutdownOutcome {
    /// 进程退出码
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Clean => 0,
            Self::IoFailure => 2,
            Self::ForcedTimeout => 3,
        }
    }
}

/// 监督器：启动 Bot / Sense 两个任务并分发控制信号
pub struct Supervisor {
    config: SupervisorConfig,
    robot: RobotFactory,
    sensor: SensorFactory,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, robot: RobotFactory, sensor: SensorFactory) -> Self {
        Self {
            config,
            robot,
            sensor,
        }
    }

    /// 运行直到 `signals` 上出现 Terminate（或通道断开）
    ///
    /// Reset 只转发给 Sense 任务；Bot 任务只会从 Sense 任务重启后的通知得知复位。
    /// 返回 `ForcedTimeout` 时仍有任务线程挂起，调用方应立即退出进程。
    pub fn run(self, signals: &Receiver<SignalEvent>) -> Result<ShutdownOutcome, SupervisorError> {
        let Self {
            config,
            robot,
            sensor,
        } = self;
        config.validate()?;

        let (records_tx, records_rx) = bounded(0);
        let (status_tx, status_rx) = bounded(0);
        let (bot_control_tx, bot_control_rx) = bounded(0);
        let (sense_control_tx, sense_control_rx) = bounded(0);

        let bot = BotTask::new(
            robot,
            BotLinks {
                records_rx,
                records_tx: records_tx.clone(),
                status_tx,
                sense_control: sense_control_tx.clone(),
            },
            Arc::new(AtomicConnectionState::default()),
            &config.bot,
            config.commands,
        );
        let sense = SenseTask::new(
            sensor,
            SenseLinks {
                records_tx,
                status_rx,
                bot_control: bot_control_tx.clone(),
            },
            Arc::new(AtomicConnectionState::default()),
            &config.sense,
            config.reset_notify_timeout,
        );

        let backoff = config.restart_backoff;
        let bot_thread = spawn_supervised("bot-supervisor", bot, bot_control_rx, backoff)?;
        let sense_thread = spawn_supervised("sense-supervisor", sense, sense_control_rx, backoff)?;

        let root = SignalRouter::new()
            .route("bot", bot_control_tx, RouteFilter::TerminateOnly)
            .route("sense", sense_control_tx, RouteFilter::All);

        loop {
            match signals.recv() {
                Ok(SignalEvent::Reset) => {
                    info!("Supervisor: caught reset, restarting sense task");
                    if root.forward_interruptible(SignalEvent::Reset, signals).is_err() {
                        info!("Supervisor: caught terminate while forwarding reset");
                        break;
                    }
                },
                Ok(SignalEvent::Terminate) => {
                    info!("Supervisor: caught terminate, shutting down");
                    break;
                },
                Err(_) => {
                    warn!("Supervisor: signal source closed, shutting down");
                    break;
                },
            }
        }

        let timeout = config.shutdown_timeout;
        let deadline = Instant::now() + timeout;
        root.forward_until(SignalEvent::Terminate, deadline);

        let mut outcome = ShutdownOutcome::Clean;
        for (name, handle) in [("bot", bot_thread), ("sense", sense_thread)] {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match handle.join_timeout(remaining) {
                Ok(exit) => {
                    info!(
                        "Supervisor: {} task stopped ({} runs, {} faults)",
                        exit.task, exit.runs, exit.faults
                    );
                    if exit.last_run_faulted {
                        outcome = ShutdownOutcome::IoFailure;
                    }
                },
                Err(JoinTimeoutError::TimedOut) => {
                    error!(
                        "Supervisor: {} task did not stop within {:?}, forcing exit",
                        name, timeout
                    );
                    return Ok(ShutdownOutcome::ForcedTimeout);
                },
                Err(JoinTimeoutError::Panicked) => {
                    error!("Supervisor: {}", SupervisorError::Panicked(name));
                    outcome = ShutdownOutcome::IoFailure;
                },
            }
        }

        info!("Supervisor: shutdown complete");
        Ok(outcome)
    }
}

fn spawn_supervised<T: SupervisedTask + 'static>(
    name: &str,
    mut task: T,
    control: Receiver<SignalEvent>,
    backoff: Duration,
) -> Result<JoinHandle<SupervisedExit>, SupervisorError> {
    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run_supervised(&mut task, &control, backoff))?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use std::collections::VecDeque;

    /// 按脚本返回退出原因的任务
    struct ScriptedTask {
        state: AtomicConnectionState,
        script: VecDeque<TaskExit>,
        resets: u32,
        states_seen: Vec<ConnectionState>,
    }

    impl ScriptedTask {
        fn new(script: Vec<TaskExit>) -> Self {
            Self {
                state: AtomicConnectionState::default(),
                script: script.into(),
                resets: 0,
                states_seen: Vec::new(),
            }
        }
    }

    impl SupervisedTask for ScriptedTask {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn state(&self) -> &AtomicConnectionState {
            &self.state
        }

        fn run(&mut self, control: &Receiver<SignalEvent>) -> TaskExit {
            self.states_seen.push(self.state.get());
            self.state.set(ConnectionState::Open);
            match self.script.pop_front() {
                Some(exit) => exit,
                None => control.recv().map(TaskExit::from).unwrap_or(TaskExit::Terminate),
            }
        }

        fn on_reset(&mut self) {
            self.resets += 1;
        }
    }

    fn control() -> (Sender<SignalEvent>, Receiver<SignalEvent>) {
        bounded(1)
    }

    /// 测试复位后重新运行且状态重置为 NotOpened
    #[test]
    fn test_reset_reruns_task() {
        let mut task = ScriptedTask::new(vec![TaskExit::Reset, TaskExit::Reset, TaskExit::Terminate]);
        let (_tx, rx) = control();

        let exit = run_supervised(&mut task, &rx, Duration::ZERO);
        assert_eq!(exit.runs, 3);
        assert_eq!(exit.faults, 0);
        assert!(!exit.last_run_faulted);
        assert_eq!(task.resets, 2);
        assert_eq!(
            task.states_seen,
            vec![ConnectionState::NotOpened, ConnectionState::NotOpened, ConnectionState::NotOpened]
        );
    }

    /// 测试故障后退避重启
    #[test]
    fn test_fault_respawns_after_backoff() {
        let mut task = ScriptedTask::new(vec![
            TaskExit::Fault(SupervisorError::Panicked("io")),
            TaskExit::Terminate,
        ]);
        let (_tx, rx) = control();

        let start = Instant::now();
        let exit = run_supervised(&mut task, &rx, Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert_eq!(exit.runs, 2);
        assert_eq!(exit.faults, 1);
        assert!(!exit.last_run_faulted);
        assert_eq!(task.resets, 0);
    }

    /// 测试退避期间的 Terminate 立即结束监督
    #[test]
    fn test_terminate_during_backoff() {
        let mut task = ScriptedTask::new(vec![TaskExit::Fault(SupervisorError::Panicked("io"))]);
        let (tx, rx) = control();
        tx.send(SignalEvent::Terminate).unwrap();

        let start = Instant::now();
        let exit = run_supervised(&mut task, &rx, Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(exit.runs, 1);
        assert!(exit.last_run_faulted);
    }

    /// 测试退避期间的 Reset 按复位处理
    #[test]
    fn test_reset_during_backoff() {
        let mut task = ScriptedTask::new(vec![
            TaskExit::Fault(SupervisorError::Panicked("io")),
            TaskExit::Terminate,
        ]);
        let (tx, rx) = control();
        tx.send(SignalEvent::Reset).unwrap();

        let exit = run_supervised(&mut task, &rx, Duration::from_secs(30));
        assert_eq!(exit.runs, 2);
        assert_eq!(task.resets, 1);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ShutdownOutcome::Clean.exit_code(), 0);
        assert_eq!(ShutdownOutcome::IoFailure.exit_code(), 2);
        assert_eq!(ShutdownOutcome::ForcedTimeout.exit_code(), 3);
    }

    #[test]
    fn test_join_timeout() {
        let quick = thread::spawn(|| 7);
        assert_eq!(quick.join_timeout(Duration::from_secs(1)), Ok(7));

        let (_release_tx, release_rx) = bounded::<()>(0);
        let stuck = thread::spawn(move || {
            let _ = release_rx.recv();
        });
        assert_eq!(
            stuck.join_timeout(Duration::from_millis(20)),
            Err(JoinTimeoutError::TimedOut)
        );
    }
}
