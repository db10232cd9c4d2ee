//! 控制信号与信号路由
//!
//! 操作系统信号只在二进制入口处被映射为 [`SignalEvent`]，库内部全部通过
//! crossbeam 通道传递，因此整个复位协议可以在测试中直接驱动。
//!
//! 路由关系：
//!
//! ```text
//! 根路由 ──Terminate──> Bot 监督线程
//!        ──Reset/Terminate──> Sense 监督线程 ──Reset（重启后）──> Bot 监督线程
//!
//! 任务内路由 ──Reset/Terminate──> 两个子循环
//! ```

use crossbeam_channel::{Receiver, Sender, TrySendError, select};
use std::fmt;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// 控制信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalEvent {
    /// 复位：按 Sense → Bot 的顺序重启两个任务
    Reset,
    /// 终止：中断和终止类信号都归为此类
    Terminate,
}

impl SignalEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Terminate => "terminate",
        }
    }
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 路由过滤规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFilter {
    /// 转发所有信号
    All,
    /// 只转发 Terminate
    TerminateOnly,
}

impl RouteFilter {
    pub fn accepts(self, event: SignalEvent) -> bool {
        match self {
            Self::All => true,
            Self::TerminateOnly => event == SignalEvent::Terminate,
        }
    }
}

struct Route {
    name: &'static str,
    filter: RouteFilter,
    tx: Sender<SignalEvent>,
}

/// 信号路由器
///
/// 把一个信号按过滤规则转发给若干下游控制通道。下游已经退出（通道断开）
/// 不是错误，只记录日志。
#[derive(Default)]
pub struct SignalRouter {
    routes: Vec<Route>,
}

impl SignalRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一条路由
    pub fn route(mut self, name: &'static str, tx: Sender<SignalEvent>, filter: RouteFilter) -> Self {
        self.routes.push(Route { name, filter, tx });
        self
    }

    fn matching(&self, event: SignalEvent) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |route| route.filter.accepts(event))
    }

    /// 在截止时间之前转发，返回成功送达的路由数，超时的路由被跳过
    pub fn forward_until(&self, event: SignalEvent, deadline: Instant) -> usize {
        self.matching(event)
            .filter(|route| match route.tx.send_deadline(event, deadline) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Could not deliver {} to '{}': {}", event, route.name, e);
                    false
                },
            })
            .count()
    }

    /// 非阻塞转发（下游通道带一格缓冲时使用）
    ///
    /// 通道已满说明下游已经收到过一个信号还没处理，新信号被丢弃。
    pub fn offer(&self, event: SignalEvent) -> usize {
        self.matching(event)
            .filter(|route| match route.tx.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    trace!("Signal route '{}' already signalled, dropping {}", route.name, event);
                    false
                },
                Err(TrySendError::Disconnected(_)) => false,
            })
            .count()
    }

    /// 阻塞转发，同时监听 `interrupt`
    ///
    /// 等待期间收到的 Terminate 会中断转发并以 `Err(Terminate)` 返回；
    /// 重复的 Reset 被合并。
    pub fn forward_interruptible(
        &self,
        event: SignalEvent,
        interrupt: &Receiver<SignalEvent>,
    ) -> Result<usize, SignalEvent> {
        let mut delivered = 0;
        for route in self.matching(event) {
            loop {
                select! {
                    send(route.tx, event) -> res => {
                        if res.is_ok() {
                            delivered += 1;
                        } else {
                            debug!("Signal route '{}' disconnected, dropping {}", route.name, event);
                        }
                        break;
                    },
                    recv(interrupt) -> other => match other {
                        Ok(SignalEvent::Reset) => {
                            debug!("Coalescing repeated reset while forwarding to '{}'", route.name);
                        },
                        Ok(SignalEvent::Terminate) | Err(_) => return Err(SignalEvent::Terminate),
                    },
                }
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{bounded, unbounded};
    use std::thread;
    use std::time::Duration;

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(50)
    }

    #[test]
    fn test_filter() {
        assert!(RouteFilter::All.accepts(SignalEvent::Reset));
        assert!(RouteFilter::All.accepts(SignalEvent::Terminate));
        assert!(!RouteFilter::TerminateOnly.accepts(SignalEvent::Reset));
        assert!(RouteFilter::TerminateOnly.accepts(SignalEvent::Terminate));
    }

    /// 测试 Reset 只送达允许的路由
    #[test]
    fn test_reset_routing() {
        let (bot_tx, bot_rx) = unbounded();
        let (sense_tx, sense_rx) = unbounded();
        let router = SignalRouter::new()
            .route("bot", bot_tx, RouteFilter::TerminateOnly)
            .route("sense", sense_tx, RouteFilter::All);

        assert_eq!(router.forward_until(SignalEvent::Reset, soon()), 1);
        assert_eq!(sense_rx.try_recv(), Ok(SignalEvent::Reset));
        assert!(bot_rx.try_recv().is_err());

        assert_eq!(router.forward_until(SignalEvent::Terminate, soon()), 2);
        assert_eq!(bot_rx.try_recv(), Ok(SignalEvent::Terminate));
        assert_eq!(sense_rx.try_recv(), Ok(SignalEvent::Terminate));
    }

    #[test]
    fn test_disconnected_route_is_skipped() {
        let (tx, rx) = unbounded();
        drop(rx);
        let router = SignalRouter::new().route("gone", tx, RouteFilter::All);
        assert_eq!(router.forward_until(SignalEvent::Terminate, soon()), 0);
    }

    #[test]
    fn test_offer_latches_single_event() {
        let (tx, rx) = bounded(1);
        let router = SignalRouter::new().route("loop", tx, RouteFilter::All);
        assert_eq!(router.offer(SignalEvent::Reset), 1);
        assert_eq!(router.offer(SignalEvent::Terminate), 0);
        assert_eq!(rx.try_recv(), Ok(SignalEvent::Reset));
    }

    #[test]
    fn test_forward_until_times_out() {
        let (tx, _rx) = bounded(0);
        let router = SignalRouter::new().route("stuck", tx, RouteFilter::All);
        let start = Instant::now();
        let delivered =
            router.forward_until(SignalEvent::Terminate, start + Duration::from_millis(30));
        assert_eq!(delivered, 0);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    /// 测试转发被 Terminate 打断
    #[test]
    fn test_forward_interruptible() {
        let (tx, _rx) = bounded(0);
        let (signal_tx, signal_rx) = unbounded();
        let router = SignalRouter::new().route("sense", tx, RouteFilter::All);

        signal_tx.send(SignalEvent::Reset).unwrap();
        signal_tx.send(SignalEvent::Terminate).unwrap();
        assert_eq!(
            router.forward_interruptible(SignalEvent::Reset, &signal_rx),
            Err(SignalEvent::Terminate)
        );
    }

    #[test]
    fn test_forward_interruptible_delivers() {
        let (tx, rx) = bounded(0);
        let (_signal_tx, signal_rx) = unbounded::<SignalEvent>();
        let router = SignalRouter::new().route("sense", tx, RouteFilter::All);

        let receiver = thread::spawn(move || rx.recv());
        assert_eq!(router.forward_interruptible(SignalEvent::Reset, &signal_rx), Ok(1));
        assert_eq!(receiver.join().unwrap(), Ok(SignalEvent::Reset));
    }
}
