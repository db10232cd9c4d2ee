//! 基于 `serialport` 的串口实现

use crate::{SerialConfig, SerialError, SerialReader, SerialWriter, SplittableTransport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, info};

/// 真实串口（8N1，无流控）
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortTransport {
    /// 打开串口
    pub fn open(config: &SerialConfig) -> Result<Self, SerialError> {
        let port = serialport::new(&config.path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()?;

        info!(
            "Opened serial port: {} at {} baud (timeout {:?})",
            config.path, config.baud_rate, config.read_timeout
        );

        Ok(Self {
            port,
            path: config.path.clone(),
        })
    }
}

fn read_port(port: &mut dyn SerialPort, buf: &mut [u8]) -> Result<usize, SerialError> {
    match port.read(buf) {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn clear_port_input(port: &mut dyn SerialPort) -> Result<(), SerialError> {
    port.clear(ClearBuffer::Input)?;
    Ok(())
}

fn write_port(port: &mut dyn SerialPort, data: &[u8]) -> Result<usize, SerialError> {
    let n = port.write(data)?;
    port.flush()?;
    Ok(n)
}

impl SerialReader for SerialPortTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        read_port(self.port.as_mut(), buf)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        clear_port_input(self.port.as_mut())
    }
}

impl SerialWriter for SerialPortTransport {
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        write_port(self.port.as_mut(), data)
    }
}

/// 串口读端（拆分后）
pub struct SerialPortReader {
    port: Box<dyn SerialPort>,
}

/// 串口写端（拆分后）
pub struct SerialPortWriter {
    port: Box<dyn SerialPort>,
}

impl SerialReader for SerialPortReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        read_port(self.port.as_mut(), buf)
    }

    fn clear_input(&mut self) -> Result<(), SerialError> {
        clear_port_input(self.port.as_mut())
    }
}

impl SerialWriter for SerialPortWriter {
    fn write(&mut self, data: &[u8]) -> Result<usize, SerialError> {
        write_port(self.port.as_mut(), data)
    }
}

impl SplittableTransport for SerialPortTransport {
    type Reader = SerialPortReader;
    type Writer = SerialPortWriter;

    fn split(self) -> Result<(Self::Reader, Self::Writer), SerialError> {
        // 两个句柄指向同一个文件描述符的副本，读写互不阻塞
        let writer = self.port.try_clone()?;
        debug!("Split serial port {} into reader/writer", self.path);
        Ok((
            SerialPortReader { port: self.port },
            SerialPortWriter { port: writer },
        ))
    }
}
