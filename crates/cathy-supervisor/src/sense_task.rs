//! Sense 任务：传感器输入轮询 + 状态输出
//!
//! 复位协议的关键在这里：Sense 任务因复位结束一次运行后，只有在下一次运行
//! 已经启动（或打开传感器失败）之后，才把复位信号转发给 Bot 任务。

use crate::config::SenseConfig;
use crate::error::SupervisorError;
use crate::signal::SignalEvent;
use crate::task::{SubLoops, SupervisedTask, TaskExit, signalled};
use cathy_driver::{AtomicConnectionState, ConnectionState};
use cathy_protocol::{BotStatus, SensorFrameDecoder, SensorRecord, format_status};
use cathy_serial::{SerialError, SerialReader, SerialWriter, SplittableTransport};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender, select, tick};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, trace, warn};

const INPUT_POLLER: &str = "sense-input";
const OUTPUT_RELAY: &str = "sense-output";

/// 已拆分为读端和写端的传感器串口
pub struct SensorLink {
    pub reader: Box<dyn SerialReader>,
    pub writer: Box<dyn SerialWriter>,
}

impl SensorLink {
    pub fn new(reader: Box<dyn SerialReader>, writer: Box<dyn SerialWriter>) -> Self {
        Self { reader, writer }
    }

    /// 拆分一个串口
    pub fn split<T: SplittableTransport>(transport: T) -> Result<Self, SerialError> {
        let (reader, writer) = transport.split()?;
        Ok(Self::new(Box::new(reader), Box::new(writer)))
    }
}

/// 打开传感器串口
pub type SensorFactory = Box<dyn FnMut() -> Result<SensorLink, SerialError> + Send>;

/// Sense 任务与其它任务之间的通道
pub struct SenseLinks {
    /// 解码出的传感器记录（发往 Bot 命令消费循环）
    pub records_tx: Sender<SensorRecord>,
    /// 机器人状态（来自 Bot 状态轮询循环）
    pub status_rx: Receiver<Option<BotStatus>>,
    /// 重启后通知 Bot 任务复位
    pub bot_control: Sender<SignalEvent>,
}

/// Sense 任务
pub struct SenseTask {
    open: SensorFactory,
    links: SenseLinks,
    state: Arc<AtomicConnectionState>,
    input_poll: Duration,
    notify_timeout: Duration,
    notify_pending: bool,
}

impl SenseTask {
    pub fn new(
        open: SensorFactory,
        links: SenseLinks,
        state: Arc<AtomicConnectionState>,
        config: &SenseConfig,
        notify_timeout: Duration,
    ) -> Self {
        Self {
            open,
            links,
            state,
            input_poll: config.input_poll,
            notify_timeout,
            notify_pending: false,
        }
    }

    /// 若上一次运行因复位结束，通知 Bot 任务复位
    fn notify_bot(&mut self) {
        if !std::mem::take(&mut self.notify_pending) {
            return;
        }
        match self.links.bot_control.send_timeout(SignalEvent::Reset, self.notify_timeout) {
            Ok(()) => info!("Sense task: restarted, resetting bot task"),
            Err(SendTimeoutError::Timeout(_)) => warn!(
                "Sense task: bot task did not accept reset within {:?}",
                self.notify_timeout
            ),
            Err(SendTimeoutError::Disconnected(_)) => {
                warn!("Sense task: bot task is gone, reset not propagated")
            },
        }
    }

    fn spawn_loops(&self, link: SensorLink) -> Result<SubLoops, (SubLoops, SupervisorError)> {
        let SensorLink { reader, writer } = link;
        let mut loops = SubLoops::new("Sense");

        let records_tx = self.links.records_tx.clone();
        let interval = self.input_poll;
        if let Err(e) = loops.spawn(INPUT_POLLER, move |control| {
            input_poller(reader, records_tx, interval, control)
        }) {
            return Err((loops, e));
        }

        let status_rx = self.links.status_rx.clone();
        if let Err(e) = loops.spawn(OUTPUT_RELAY, move |control| {
            output_relay(writer, status_rx, control)
        }) {
            return Err((loops, e));
        }

        Ok(loops)
    }
}

impl SupervisedTask for SenseTask {
    fn name(&self) -> &'static str {
        "sense"
    }

    fn state(&self) -> &AtomicConnectionState {
        &self.state
    }

    fn run(&mut self, control: &Receiver<SignalEvent>) -> TaskExit {
        let link = match (self.open)() {
            Ok(link) => link,
            Err(e) => {
                error!("Sense task: failed to open sensor link: {}", e);
                self.notify_bot();
                return TaskExit::Fault(e.into());
            },
        };
        self.state.set(ConnectionState::Open);
        info!("Sense task: sensor link open");

        let exit = match self.spawn_loops(link) {
            Ok(loops) => {
                self.notify_bot();
                loops.wait(control)
            },
            Err((loops, e)) => {
                self.notify_bot();
                loops.abort(e)
            },
        };
        self.state.set(ConnectionState::Closed);
        exit
    }

    fn on_reset(&mut self) {
        self.notify_pending = true;
    }
}

/// 输入轮询循环：每个周期最多解码一帧，解码出的记录立即交给 Bot 任务
fn input_poller(
    mut reader: Box<dyn SerialReader>,
    records_tx: Sender<SensorRecord>,
    interval: Duration,
    control: Receiver<SignalEvent>,
) -> TaskExit {
    let mut decoder = SensorFrameDecoder::new();
    let ticker = tick(interval);
    loop {
        select! {
            recv(control) -> event => return signalled("Sense input poller", event),
            recv(ticker) -> _ => {
                let record = match decoder.read_with(|buf| reader.read(buf)) {
                    Ok(Some(record)) => record,
                    Ok(None) => continue,
                    Err(e) => {
                        error!("Sense input poller: sensor read failed: {}", e);
                        return TaskExit::Fault(e.into());
                    },
                };
                trace!("Sense input poller: {:?}", record);
                select! {
                    send(records_tx, record) -> res => {
                        if res.is_err() {
                            return TaskExit::Terminate;
                        }
                    },
                    recv(control) -> event => return signalled("Sense input poller", event),
                }
            },
        }
    }
}

/// 输出循环：把机器人状态格式化后写回传感器板
fn output_relay(
    mut writer: Box<dyn SerialWriter>,
    status_rx: Receiver<Option<BotStatus>>,
    control: Receiver<SignalEvent>,
) -> TaskExit {
    loop {
        select! {
            recv(control) -> event => return signalled("Sense output relay", event),
            recv(status_rx) -> status => {
                let Ok(status) = status else {
                    return TaskExit::Terminate;
                };
                let line = format_status(status.as_ref());
                if let Err(e) = writer.write_all(line.as_bytes()) {
                    error!("Sense output relay: sensor write failed: {}", e);
                    return TaskExit::Fault(e.into());
                }
                trace!("Sense output relay: wrote {:?}", line);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathy_protocol::{OiMode, UserCommand};
    use cathy_serial::mock::{MockHandle, MockTransport};
    use crossbeam_channel::bounded;
    use std::io::ErrorKind;

    struct Harness {
        task: SenseTask,
        handle: MockHandle,
        records_rx: Receiver<SensorRecord>,
        status_tx: Sender<Option<BotStatus>>,
        bot_rx: Receiver<SignalEvent>,
    }

    fn harness() -> Harness {
        let (_transport, handle) = MockTransport::new();
        let reopen = handle.clone();
        let open: SensorFactory =
            Box::new(move || SensorLink::split(MockTransport::from_handle(&reopen)));

        let (records_tx, records_rx) = bounded(0);
        let (status_tx, status_rx) = bounded(0);
        let (bot_tx, bot_rx) = bounded(0);
        let links = SenseLinks {
            records_tx,
            status_rx,
            bot_control: bot_tx,
        };
        let config = SenseConfig {
            input_poll: Duration::from_millis(2),
            ..SenseConfig::default()
        };
        let task = SenseTask::new(
            open,
            links,
            Arc::new(AtomicConnectionState::default()),
            &config,
            Duration::from_millis(200),
        );
        Harness {
            task,
            handle,
            records_rx,
            status_tx,
            bot_rx,
        }
    }

    /// 测试传感器帧被解码并送往 Bot 任务
    #[test]
    fn test_frames_are_forwarded() {
        let Harness {
            mut task,
            handle,
            records_rx,
            ..
        } = harness();
        handle.push_read(b"garbage} {\"user-command\":1,\"ir-angle\":30,\"ir-intensity\":55.5} {\"us");

        let (control_tx, control_rx) = bounded(0);
        let runner = std::thread::spawn(move || task.run(&control_rx));

        let record = records_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(record.user_command, UserCommand::Safe);
        assert_eq!(record.ir_angle, 30);
        assert!(!record.injected);

        control_tx.send(SignalEvent::Terminate).unwrap();
        assert!(matches!(runner.join().unwrap(), TaskExit::Terminate));
    }

    /// 测试状态行写回传感器板
    #[test]
    fn test_status_lines_are_written() {
        let Harness {
            mut task,
            handle,
            status_tx,
            ..
        } = harness();
        let (control_tx, control_rx) = bounded(0);
        let runner = std::thread::spawn(move || task.run(&control_rx));

        status_tx
            .send(Some(BotStatus {
                mode: OiMode::Safe,
                battery_charge_mah: 1500,
                battery_capacity_mah: 3000,
            }))
            .unwrap();
        status_tx.send(None).unwrap();

        control_tx.send(SignalEvent::Terminate).unwrap();
        runner.join().unwrap();
        assert_eq!(handle.written(), b"1 Safe 50\n0 N/C 0\n".to_vec());
    }

    /// 测试复位后的下一次运行启动后才通知 Bot 任务
    #[test]
    fn test_reset_notifies_bot_after_restart() {
        let Harness {
            mut task, bot_rx, ..
        } = harness();
        let (control_tx, control_rx) = bounded(0);

        let runner = std::thread::spawn(move || {
            let first = task.run(&control_rx);
            assert!(matches!(first, TaskExit::Reset));
            task.on_reset();
            // 第一次运行结束后、第二次运行之前不应有通知
            let second = task.run(&control_rx);
            (second, task.state().get())
        });

        control_tx.send(SignalEvent::Reset).unwrap();
        assert_eq!(bot_rx.recv_timeout(Duration::from_secs(2)), Ok(SignalEvent::Reset));
        control_tx.send(SignalEvent::Terminate).unwrap();

        let (second, state) = runner.join().unwrap();
        assert!(matches!(second, TaskExit::Terminate));
        assert_eq!(state, ConnectionState::Closed);
    }

    /// 测试读取故障
    #[test]
    fn test_read_error_is_fault() {
        let Harness { mut task, handle, .. } = harness();
        handle.push(cathy_serial::mock::MockRead::Error(ErrorKind::BrokenPipe));
        let (_control_tx, control_rx) = bounded(0);
        assert!(matches!(
            task.run(&control_rx),
            TaskExit::Fault(SupervisorError::Serial(_))
        ));
    }
}
