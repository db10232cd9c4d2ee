//! 任务抽象与子循环管理
//!
//! 每个任务（Bot / Sense）的一次运行由两个子循环线程组成。任务线程本身充当
//! 任务内信号路由：它等待上级控制信号或任一子循环退出，把结果转发给所有
//! 子循环，并在两个子循环都返回后才结束本次运行。

use crate::error::SupervisorError;
use crate::signal::{RouteFilter, SignalEvent, SignalRouter};
use cathy_driver::AtomicConnectionState;
use crossbeam_channel::{Receiver, RecvError, Sender, bounded, select};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

/// 一次任务运行的退出原因
#[derive(Debug)]
pub enum TaskExit {
    /// 收到复位信号，监督循环重新打开设备后再次运行
    Reset,
    /// 收到终止信号，监督循环退出
    Terminate,
    /// 串口 IO 故障，监督循环在退避后重新运行
    Fault(SupervisorError),
}

impl TaskExit {
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}

impl From<SignalEvent> for TaskExit {
    fn from(event: SignalEvent) -> Self {
        match event {
            SignalEvent::Reset => Self::Reset,
            SignalEvent::Terminate => Self::Terminate,
        }
    }
}

/// 可被 [`run_supervised`](crate::run_supervised) 反复运行的任务
pub trait SupervisedTask: Send {
    /// 日志用名称
    fn name(&self) -> &'static str;

    /// 本任务的连接状态
    fn state(&self) -> &AtomicConnectionState;

    /// 运行一次：打开设备、启动子循环，阻塞到两个子循环都退出
    fn run(&mut self, control: &Receiver<SignalEvent>) -> TaskExit;

    /// 本次运行因复位而结束，下一次运行之前调用
    fn on_reset(&mut self) {}
}

/// 子循环收到控制信号时的统一处理：记录日志并转换为退出原因
pub(crate) fn signalled(loop_name: &str, event: Result<SignalEvent, RecvError>) -> TaskExit {
    let event = event.unwrap_or(SignalEvent::Terminate);
    match event {
        SignalEvent::Reset => info!("{}: caught reset, restarting", loop_name),
        SignalEvent::Terminate => info!("{}: caught terminate, exiting", loop_name),
    }
    event.into()
}

/// 一次任务运行中的子循环集合
pub(crate) struct SubLoops {
    task: &'static str,
    router: SignalRouter,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    exit_tx: Sender<TaskExit>,
    exit_rx: Receiver<TaskExit>,
}

impl SubLoops {
    /// 每个任务固定两个子循环
    const LOOPS: usize = 2;

    pub(crate) fn new(task: &'static str) -> Self {
        // 子循环上报退出永不阻塞
        let (exit_tx, exit_rx) = bounded(Self::LOOPS);
        Self {
            task,
            router: SignalRouter::new(),
            handles: Vec::with_capacity(Self::LOOPS),
            exit_tx,
            exit_rx,
        }
    }

    /// 启动一个子循环
    ///
    /// 子循环的控制通道带一格缓冲：每个子循环一生只消费一个信号，
    /// 挂起在串口读取上的子循环不会拖住路由。
    pub(crate) fn spawn<F>(&mut self, name: &'static str, body: F) -> Result<(), SupervisorError>
    where
        F: FnOnce(Receiver<SignalEvent>) -> TaskExit + Send + 'static,
    {
        let (control_tx, control_rx) = bounded(1);
        let exit_tx = self.exit_tx.clone();
        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let exit = body(control_rx);
            let _ = exit_tx.send(exit);
        })?;

        let router = std::mem::take(&mut self.router);
        self.router = router.route(name, control_tx, RouteFilter::All);
        self.handles.push((name, handle));
        Ok(())
    }

    /// 启动失败时停止已启动的子循环
    pub(crate) fn abort(self, err: SupervisorError) -> TaskExit {
        error!("{} task: failed to start: {}", self.task, err);
        self.router.offer(SignalEvent::Terminate);
        self.join();
        TaskExit::Fault(err)
    }

    /// 等待本次运行结束
    ///
    /// 先到者决定退出原因：上级信号原样转发给所有子循环；某个子循环自行退出
    /// （故障）时向其余子循环转发 Terminate。
    pub(crate) fn wait(self, control: &Receiver<SignalEvent>) -> TaskExit {
        let exit = select! {
            recv(control) -> event => {
                let event = event.unwrap_or(SignalEvent::Terminate);
                info!("{} task: caught {}, stopping loops", self.task, event);
                self.router.offer(event);
                TaskExit::from(event)
            },
            recv(self.exit_rx) -> exit => {
                let exit = exit.unwrap_or(TaskExit::Terminate);
                self.router.offer(SignalEvent::Terminate);
                exit
            },
        };
        self.join();
        exit
    }

    fn join(self) {
        for (name, handle) in self.handles {
            if handle.join().is_err() {
                error!("{} task: {}", self.task, SupervisorError::Panicked(name));
            }
        }
    }
}
