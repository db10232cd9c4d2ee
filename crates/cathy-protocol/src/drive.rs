//! 离散行驶方向
//!
//! 红外信号方向被量化为 9 个方向之一，每个方向对应一组固定的
//! `(速度, 转弯半径)`，由 Open Interface 的 Drive 命令执行。

/// 直线行驶的转弯半径（OI 约定的特殊值）
pub const RADIUS_STRAIGHT: i16 = i16::MAX;
/// 原地逆时针旋转（向左）
pub const RADIUS_SPIN_LEFT: i16 = 1;
/// 原地顺时针旋转（向右）
pub const RADIUS_SPIN_RIGHT: i16 = -1;

/// 前进/后退速度（mm/s）
const CRUISE_MM_S: i16 = 200;
/// 原地旋转速度（mm/s）
const SPIN_MM_S: i16 = 150;
/// 弧线转弯半径（mm）
const ARC_RADIUS_MM: i16 = 500;

/// Drive 命令参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveVector {
    /// 速度（mm/s，负值为后退）
    pub velocity_mm_s: i16,
    /// 转弯半径（mm，正值向左）
    pub radius_mm: i16,
}

/// 行驶方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveBucket {
    Stop,
    Left,
    LeftFwd,
    Fwd,
    RightFwd,
    Right,
    RightAft,
    Aft,
    LeftAft,
}

impl DriveBucket {
    /// 以正前方为中心、每 45° 一个扇区，顺时针排列（角度正值偏右）
    const SECTORS: [DriveBucket; 8] = [
        DriveBucket::Fwd,
        DriveBucket::RightFwd,
        DriveBucket::Right,
        DriveBucket::RightAft,
        DriveBucket::Aft,
        DriveBucket::LeftAft,
        DriveBucket::Left,
        DriveBucket::LeftFwd,
    ];

    /// 把信号方向（度）量化为行驶方向
    ///
    /// 任意角度都会被归一化，`[-22.5°, 22.5°)` 为 Fwd。
    pub fn from_angle(angle_deg: i16) -> Self {
        let shifted = f32::from(angle_deg) + 22.5;
        let sector = (shifted / 45.0).floor() as i32;
        Self::SECTORS[sector.rem_euclid(8) as usize]
    }

    /// 查找表：方向 → Drive 命令参数
    pub fn vector(self) -> DriveVector {
        let (velocity_mm_s, radius_mm) = match self {
            Self::Stop => (0, RADIUS_STRAIGHT),
            Self::Left => (SPIN_MM_S, RADIUS_SPIN_LEFT),
            Self::LeftFwd => (CRUISE_MM_S, ARC_RADIUS_MM),
            Self::Fwd => (CRUISE_MM_S, RADIUS_STRAIGHT),
            Self::RightFwd => (CRUISE_MM_S, -ARC_RADIUS_MM),
            Self::Right => (SPIN_MM_S, RADIUS_SPIN_RIGHT),
            Self::RightAft => (-CRUISE_MM_S, -ARC_RADIUS_MM),
            Self::Aft => (-CRUISE_MM_S, RADIUS_STRAIGHT),
            Self::LeftAft => (-CRUISE_MM_S, ARC_RADIUS_MM),
        };
        DriveVector {
            velocity_mm_s,
            radius_mm,
        }
    }
}
