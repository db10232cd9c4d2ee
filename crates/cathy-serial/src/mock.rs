//! 内存 Mock 串口
//!
//! 读取按脚本出队，写入被记录下来供断言；可以注入 IO 错误或让读取永久挂起，
//! 用于验证故障重启和强制退出路径。

use crate::{SerialError, SerialReader, SerialWriter, SplittableTransport};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// 队列为空时单次读取的等待时间（模拟串口读超时）
const EMPTY_READ_DELAY: Duration = Duration::from_millis(1);

/// 脚本化的读取结果
#[derive(Debug, Clone)]
pub enum MockRead {
    /// 返回这些字节
    Data(Vec<u8>),
    /// 返回 IO 错误
    Error(ErrorKind),
    /// 永久阻塞（直到 `MockHandle::release_hang`）
    Hang,
}

/// 写入应答器：根据写入的内容决定是否追加读取数据
pub type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

#[derive(Default)]
struct MockState {
    reads: VecDeque<MockRead>,
    written: Vec<u8>,
    write_error: Option<ErrorKind>,
    responder: Option<Responder>,
}

/// 测试侧句柄，与 `MockTransport` 共享状态
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
    released: Arc<AtomicBool>,
}

impl MockHandle {
    /// 追加一次读取数据
    pub fn push_read(&self, data: &[u8]) {
        self.state.lock().reads.push_back(MockRead::Data(data.to_vec()));
    }

    /// 追加一次脚本化读取
    pub fn push(&self, read: MockRead) {
        self.state.lock().reads.push_back(read);
    }

    /// 取出目前为止写入的全部字节
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().written)
    }

    /// 查看目前为止写入的全部字节（不清空）
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// 之后的写入都返回该错误
    pub fn fail_writes(&self, kind: ErrorKind) {
        self.state.lock().write_error = Some(kind);
    }

    /// 安装写入应答器
    pub fn set_responder(&self, responder: Responder) {
        self.state.lock().responder = Some(responder);
    }

    /// 解除所有 `MockRead::Hang`
    pub fn release_hang(&self) {
        self.released.store(true, Ordering::Release);
    }
}

/// Mock 串口
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    released: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> (Self, MockHandle) {
        let state = Arc::new(Mutex::new(MockState::default()));
        let released = Arc::new(AtomicBool::new(false));
        let handle = MockHandle {
            state: state.clone(),
            released: released.clone(),
        };
        (Self { state, released }, handle)
    }

    /// 从共享状态再造一个串口（模拟重新打开同一设备）
    pub fn from_handle(handle: &MockHandle) -> Self {
        Self {
            state: handle.state.clone(),
            released: handle.released.clone(),
        }
    }
}

fn mock_read(
    state: &Mutex<MockState>,
    released: &AtomicBool,
    buf: &mut [u8],
) -> Result<usize, SerialError> {
    let next = state.lock().reads.pop_front();
    match next {
        Some(MockRead::Data(mut data)) => {
            let n = data.len().min(buf.len());
            buf[..n].copy_from_slice(&data[..n]);
            if n < data.len() {
                // 没读完的部分放回队首
                let rest = data.split_off(n);
                state.lock().reads.push_front(MockRead::Data(rest));
            }
            Ok(n)
        },
        Some(MockRead::Error(kind)) => Err(std::io::Error::new(kind, "mock read error").into()),
        Some(MockRead::Hang) => {
            while !released.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(5));
            }
            Ok(0)
        },
        None => {
            thread::sleep(EMPTY_READ_DELAY);
            Ok(0)
        },
    }
}

/// 丢弃队列中所有尚未读取的数据（错误和挂起脚本保留）
fn mock_clear_input(state: &Mutex<MockState>) {
    state
        .lock()
        .reads
        .retain(|read| !matches!(read, MockRead::Data(_)));
}

fn mock_write(state: &Mutex<MockState>, data: &[u8]) -> Result<usize, SerialError> {
    let mut guard = state.lock();
    if let Some(kind) = guard.write_error {
        return Err(std::io::Error::new(kind, "mock write error").into());
    }
    guard.written.extend_from_slice(data);
    let reply = guard.responder.as_mut().and_then(|respond| respond(data));
    if let Some(reply) = reply {
        guard.reads.push_back(MockRead::Data(reply));
    }
    Ok(data.len())
}

impl SerialReader for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        mock_read(&self.state, &self.released, buf)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        mock_clear_input(&self.state);
        Ok(())
    }
}

impl SerialWriter for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        mock_write(&self.state, data)
    }
}

/// Mock 读端
pub struct MockReader {
    state: Arc<Mutex<MockState>>,
    released: Arc<AtomicBool>,
}

/// Mock 写端
pub struct MockWriter {
    state: Arc<Mutex<MockState>>,
}

impl SerialReader for MockReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        mock_read(&self.state, &self.released, buf)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        mock_clear_input(&self.state);
        Ok(())
    }
}

impl SerialWriter for MockWriter {
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        mock_write(&self.state, data)
    }
}

impl SplittableTransport for MockTransport {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn split(self) -> Result<(Self::Reader, Self::Writer), SerialError> {
        Ok((
            MockReader {
                state: self.state.clone(),
                released: self.released,
            },
            MockWriter { state: self.state },
        ))
    }
}
