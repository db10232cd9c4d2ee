//! 红外观测到行驶方向的映射

use cathy_protocol::{DriveBucket, SensorRecord};

/// 最小有效红外强度（百分比）
///
/// 传感器板上有 6 个红外接收管，低于六分之一的强度表示没有任何接收管被触发。
pub const MIN_IR_INTENSITY: f32 = 100.0 / 6.0;

/// 行驶方向映射器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveMapper {
    min_intensity: f32,
}

impl DriveMapper {
    pub fn new(min_intensity: f32) -> Self {
        Self { min_intensity }
    }

    /// 计算一条记录对应的行驶方向
    ///
    /// 强度低于阈值时无论角度如何都返回 `Stop`，否则按角度量化。
    pub fn bucket(&self, record: &SensorRecord) -> DriveBucket {
        if record.ir_intensity < self.min_intensity {
            DriveBucket::Stop
        } else {
            DriveBucket::from_angle(record.ir_angle)
        }
    }
}

impl Default for DriveMapper {
    fn default() -> Self {
        Self::new(MIN_IR_INTENSITY)
    }
}
