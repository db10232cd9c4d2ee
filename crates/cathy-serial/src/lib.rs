//! # Cathy Serial Transport Layer
//!
//! 串口硬件抽象层，机器人链路和传感器链路共用同一组接口。
//!
//! - [`SerialTransport`]: 读写一体的串口
//! - [`SplittableTransport`]: 可拆分为独立读端/写端的串口，供两个线程分别持有
//! - [`SerialPortTransport`]: 基于 `serialport` 的真实实现
//! - `mock`（feature）：可编程的内存串口，用于测试

use std::time::{Duration, Instant};
use thiserror::Error;

mod port;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use port::{SerialPortReader, SerialPortTransport, SerialPortWriter};

/// 串口层统一错误类型
#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serial port error: {0}")]
    Port(#[from] serialport::Error),
    #[error("Serial write returned zero bytes")]
    WriteZero,
    #[error("Serial link closed")]
    Closed,
}

/// 打开串口所需的参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// 设备路径（如 "/dev/ttyUSB0"）
    pub path: String,
    /// 波特率
    pub baud_rate: u32,
    /// 单次读取超时
    pub read_timeout: Duration,
}

impl SerialConfig {
    pub fn new(path: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            baud_rate,
            read_timeout,
        }
    }
}

/// 读端
pub trait SerialReader: Send {
    /// 读取数据，返回读取的字节数
    ///
    /// 超时不是错误：超时返回 `Ok(0)`。
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError>;

    /// 丢弃已接收但尚未读取的数据
    ///
    /// 请求-应答式的读取在发请求前调用，避免上一次超时残留的应答错位。
    fn clear_input(&mut self) -> Result<(), SerialError>;
}

/// 写端
pub trait SerialWriter: Send {
    /// 写入数据，返回写入的字节数
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError>;

    /// 写入全部数据
    fn write_all(&mut self, mut data: &[u8]) -> Result<(), SerialError> {
        while !data.is_empty() {
            match self.write(data)? {
                0 => return Err(SerialError::WriteZero),
                n => data = &data[n..],
            }
        }
        Ok(())
    }
}

/// 读写一体的串口
pub trait SerialTransport: SerialReader + SerialWriter {
    /// 在截止时间内尽量填满 `buf`，返回实际读到的字节数
    ///
    /// 用于请求-应答式的协议（如 OI 状态查询）。
    fn read_full(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SerialError> {
        let deadline = Instant::now() + timeout;
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..])?;
            if filled < buf.len() && Instant::now() >= deadline {
                break;
            }
        }
        Ok(filled)
    }
}

impl<T: SerialReader + SerialWriter> SerialTransport for T {}

/// 可拆分的串口
///
/// 拆分后读端和写端可以被不同线程独占，读端的阻塞读取不会拖住写端。
pub trait SplittableTransport: SerialTransport {
    type Reader: SerialReader + 'static;
    type Writer: SerialWriter + 'static;

    fn split(self) -> Result<(Self::Reader, Self::Writer), SerialError>;
}

impl<R: SerialReader + ?Sized> SerialReader for Box<R> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        (**self).read(buf)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        (**self).clear_input()
    }
}

impl<W: SerialWriter + ?Sized> SerialWriter for Box<W> {
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        (**self).write(data)
    }
}
