//! 传感器观测记录

use crate::command::UserCommand;
use serde::Deserialize;

/// 角度哨兵值（本次无观测）
pub const IR_ANGLE_NONE: i16 = -1;
/// 强度哨兵值（本次无观测）
pub const IR_INTENSITY_NONE: f32 = -1.0;

/// 单次传感器观测
///
/// 由传感器板以 JSON 对象的形式发出，例如：
///
/// ```text
/// {"user-command":-1,"ir-angle":45,"ir-intensity":62.5}
/// ```
///
/// 缺失的字段保持哨兵值。`injected` 不在线上出现，只用于标记
/// Bot 任务内部合成的记录（例如自动恢复到 Safe 模式）。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SensorRecord {
    /// 用户命令
    #[serde(rename = "user-command", default)]
    pub user_command: UserCommand,
    /// 红外信号方向（度，正值偏右）
    #[serde(rename = "ir-angle", default = "default_ir_angle")]
    pub ir_angle: i16,
    /// 红外信号强度（百分比，0-100）
    #[serde(rename = "ir-intensity", default = "default_ir_intensity")]
    pub ir_intensity: f32,
    /// 是否为内部合成记录
    #[serde(skip)]
    pub injected: bool,
}

fn default_ir_angle() -> i16 {
    IR_ANGLE_NONE
}

fn default_ir_intensity() -> f32 {
    IR_INTENSITY_NONE
}

impl Default for SensorRecord {
    fn default() -> Self {
        Self {
            user_command: UserCommand::None,
            ir_angle: IR_ANGLE_NONE,
            ir_intensity: IR_INTENSITY_NONE,
            injected: false,
        }
    }
}

impl SensorRecord {
    /// 合成一条只携带模式命令的记录
    ///
    /// 角度和强度保持哨兵值，因此不会触发任何行驶命令以外的效果
    /// （强度低于阈值，映射结果为 Stop）。
    pub fn injected(command: UserCommand) -> Self {
        Self {
            user_command: command,
            injected: true,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_sentinel() {
        let record = SensorRecord::default();
        assert_eq!(record.user_command, UserCommand::None);
        assert_eq!(record.ir_angle, -1);
        assert_eq!(record.ir_intensity, -1.0);
        assert!(!record.injected);
    }

    #[test]
    fn test_injected_record() {
        let record = SensorRecord::injected(UserCommand::Safe);
        assert_eq!(record.user_command, UserCommand::Safe);
        assert!(record.injected);
        assert_eq!(record.ir_angle, IR_ANGLE_NONE);
    }

    #[test]
    fn test_deserialize_full_record() {
        let record: SensorRecord =
            serde_json::from_str(r#"{"user-command":1,"ir-angle":-30,"ir-intensity":55.5}"#)
                .unwrap();
        assert_eq!(record.user_command, UserCommand::Safe);
        assert_eq!(record.ir_angle, -30);
        assert_eq!(record.ir_intensity, 55.5);
        assert!(!record.injected);
    }

    #[test]
    fn test_deserialize_missing_fields_keep_sentinels() {
        let record: SensorRecord = serde_json::from_str(r#"{"ir-angle":10}"#).unwrap();
        assert_eq!(record.user_command, UserCommand::None);
        assert_eq!(record.ir_angle, 10);
        assert_eq!(record.ir_intensity, IR_INTENSITY_NONE);
    }

    #[test]
    fn test_deserialize_ignores_injected_key() {
        let record: SensorRecord =
            serde_json::from_str(r#"{"user-command":-1,"injected":true}"#).unwrap();
        assert!(!record.injected);
    }

    #[test]
    fn test_deserialize_rejects_unknown_command() {
        let result = serde_json::from_str::<SensorRecord>(r#"{"user-command":42}"#);
        assert!(result.is_err());
    }
}
