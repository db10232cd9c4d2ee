//! 传感器帧解码
//!
//! 传感器板以空白字符分隔的 JSON 对象持续输出观测数据。串口读取与帧边界
//! 之间没有任何对齐关系，一次读取的开头和结尾通常都是残缺的帧。
//!
//! # 解码策略
//!
//! 1. 读取缓冲区大小为最大帧长的 1.5 倍（+1），保证任意相位下至少有一个
//!    分隔符落在缓冲区内
//! 2. 按空白字符切分，只有以 `{` 开头且以 `}` 结尾的片段才是候选帧
//! 3. 依次尝试解析候选帧，第一个成功的即为结果
//! 4. 解析失败是稳态下的正常现象，静默跳过（仅 trace 日志）

use crate::record::SensorRecord;
use tracing::trace;

/// 单个 JSON 成员值的最大长度
const JSON_MEMBER_SIZE: usize = 16;
/// JSON 成员数量
const JSON_MEMBER_COUNT: usize = 3;
/// 所有键名的长度之和
const JSON_KEYS_SIZE: usize = 35;
/// 外层括号与键值分隔符
const JSON_MARKUP_SIZE: usize = 2 + 4 * JSON_MEMBER_COUNT;

/// 单帧序列化后的最大长度（字节）
pub const MAX_FRAME_LEN: usize =
    JSON_MEMBER_SIZE * JSON_MEMBER_COUNT + JSON_KEYS_SIZE + JSON_MARKUP_SIZE + 1;

/// 每次串口读取使用的缓冲区长度（字节）
pub const READ_BUFFER_LEN: usize = MAX_FRAME_LEN * 3 / 2 + 1;

/// 从一段原始字节中解码第一个完整的传感器帧
///
/// 返回 `None` 表示本次读取没有可用的观测，不是错误。
pub fn decode_frame(raw: &[u8]) -> Option<SensorRecord> {
    let text = String::from_utf8_lossy(raw);
    text.split_whitespace()
        .filter(|token| token.starts_with('{') && token.ends_with('}'))
        .find_map(|candidate| match serde_json::from_str::<SensorRecord>(candidate) {
            Ok(record) => Some(record),
            Err(e) => {
                trace!("Discarding sensor frame candidate {:?}: {}", candidate, e);
                None
            },
        })
}

/// 传感器帧解码器
///
/// 持有一个可复用的读取缓冲区，避免每次轮询都重新分配。
///
/// # Example
///
/// ```
/// use cathy_protocol::SensorFrameDecoder;
///
/// let mut decoder = SensorFrameDecoder::new();
/// let stream = b"-angle\":3} {\"user-command\":-1,\"ir-angle\":0,\"ir-intensity\":80.0}\n{\"us";
/// let record = decoder
///     .read_with(|buf| -> Result<usize, std::io::Error> {
///         buf[..stream.len()].copy_from_slice(stream);
///         Ok(stream.len())
///     })
///     .unwrap()
///     .expect("frame present");
/// assert_eq!(record.ir_angle, 0);
/// ```
pub struct SensorFrameDecoder {
    buffer: Box<[u8; READ_BUFFER_LEN]>,
}

impl SensorFrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Box::new([0u8; READ_BUFFER_LEN]),
        }
    }

    /// 执行一次读取并尝试解码
    ///
    /// `read` 把数据写入缓冲区并返回写入的字节数（与 `Read::read` 语义一致）。
    /// 读取错误原样返回；读到 0 字节或没有可解码的帧时返回 `Ok(None)`。
    pub fn read_with<E>(
        &mut self,
        read: impl FnOnce(&mut [u8]) -> Result<usize, E>,
    ) -> Result<Option<SensorRecord>, E> {
        let n = read(&mut self.buffer[..])?;
        if n == 0 {
            return Ok(None);
        }
        Ok(decode_frame(&self.buffer[..n.min(READ_BUFFER_LEN)]))
    }
}

impl Default for SensorFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
