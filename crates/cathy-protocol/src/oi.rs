//! Open Interface 命令编码
//!
//! 只覆盖本项目用到的命令子集：模式切换、Drive 以及一次性查询
//! 模式和电池状态的 Query List。完整的传感器数据流不在此处解析。

use crate::status::{BotStatus, OiMode};
use crate::{ProtocolError, bytes_to_u16_be, i16_to_bytes_be};

/// OI 操作码
pub mod opcode {
    /// 启动 OI，同时进入 Passive 模式
    pub const START: u8 = 128;
    /// 软复位
    pub const RESET: u8 = 7;
    /// 进入 Safe 模式
    pub const SAFE: u8 = 131;
    /// 进入 Full 模式
    pub const FULL: u8 = 132;
    /// 关机（机器人进入 Passive 并断电）
    pub const POWER: u8 = 133;
    /// 停止 OI
    pub const STOP: u8 = 173;
    /// 速度 + 半径驱动
    pub const DRIVE: u8 = 137;
    /// 查询指定传感器包列表
    pub const QUERY_LIST: u8 = 149;
}

/// 传感器包 ID
pub mod packet {
    /// 电池当前电量（2 字节，mAh）
    pub const BATTERY_CHARGE: u8 = 25;
    /// 电池容量（2 字节，mAh）
    pub const BATTERY_CAPACITY: u8 = 26;
    /// OI 模式（1 字节）
    pub const OI_MODE: u8 = 35;
}

/// 默认串口波特率
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// 状态查询命令：`[149, 3, 35, 25, 26]`
pub const STATUS_QUERY: [u8; 5] = [
    opcode::QUERY_LIST,
    3,
    packet::OI_MODE,
    packet::BATTERY_CHARGE,
    packet::BATTERY_CAPACITY,
];

/// 状态查询应答长度（1 + 2 + 2）
pub const STATUS_RESPONSE_LEN: usize = 5;

/// 编码 Drive 命令：`[137, vel_hi, vel_lo, rad_hi, rad_lo]`
pub fn encode_drive(velocity_mm_s: i16, radius_mm: i16) -> [u8; 5] {
    let v = i16_to_bytes_be(velocity_mm_s);
    let r = i16_to_bytes_be(radius_mm);
    [opcode::DRIVE, v[0], v[1], r[0], r[1]]
}

/// 解析状态查询应答
pub fn decode_status_response(bytes: &[u8]) -> Result<BotStatus, ProtocolError> {
    if bytes.len() != STATUS_RESPONSE_LEN {
        return Err(ProtocolError::InvalidLength {
            expected: STATUS_RESPONSE_LEN,
            actual: bytes.len(),
        });
    }
    Ok(BotStatus {
        mode: OiMode::from(bytes[0]),
        battery_charge_mah: bytes_to_u16_be([bytes[1], bytes[2]]),
        battery_capacity_mah: bytes_to_u16_be([bytes[3], bytes[4]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_drive_straight() {
        assert_eq!(encode_drive(200, i16::MAX), [137, 0x00, 0xC8, 0x7F, 0xFF]);
    }

    #[test]
    fn test_encode_drive_reverse_spin() {
        assert_eq!(encode_drive(-200, -1), [137, 0xFF, 0x38, 0xFF, 0xFF]);
    }

    #[test]
    fn test_status_query_layout() {
        assert_eq!(STATUS_QUERY, [149, 3, 35, 25, 26]);
    }

    #[test]
    fn test_decode_status_response() {
        let status = decode_status_response(&[2, 0x05, 0xDC, 0x0B, 0xB8]).unwrap();
        assert_eq!(status.mode, OiMode::Safe);
        assert_eq!(status.battery_charge_mah, 1500);
        assert_eq!(status.battery_capacity_mah, 3000);
    }

    #[test]
    fn test_decode_status_response_short() {
        match decode_status_response(&[2, 0x05]) {
            Err(ProtocolError::InvalidLength { expected, actual }) => {
                assert_eq!(expected, 5);
                assert_eq!(actual, 2);
            },
            other => panic!("Expected InvalidLength, got {:?}", other),
        }
    }
}
