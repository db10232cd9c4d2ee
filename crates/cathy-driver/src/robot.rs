use crate::error::DriverError;
use cathy_protocol::BotStatus;

/// 机器人驱动接口
///
/// Bot 任务只通过这个 trait 操作机器人，真实实现是 [`OiBot`](crate::OiBot)，
/// 测试使用 `mock::MockRobot`。
pub trait RobotDriver: Send {
    /// 查询模式和电池状态
    ///
    /// `Ok(None)` 表示机器人没有给出完整应答（未连接或应答损坏），
    /// 只有串口本身的故障才返回 `Err`。
    fn info(&mut self) -> Result<Option<BotStatus>, DriverError>;

    /// 以给定速度（mm/s）和转弯半径（mm）行驶
    fn drive(&mut self, velocity_mm_s: i16, radius_mm: i16) -> Result<(), DriverError>;

    fn passive(&mut self) -> Result<(), DriverError>;

    fn safe(&mut self) -> Result<(), DriverError>;

    fn full(&mut self) -> Result<(), DriverError>;

    fn reset(&mut self) -> Result<(), DriverError>;

    fn power(&mut self) -> Result<(), DriverError>;

    /// 关闭连接，之后的调用返回 [`DriverError::Closed`]
    fn close(&mut self) -> Result<(), DriverError>;
}

impl<D: RobotDriver + ?Sized> RobotDriver for Box<D> {
    fn info(&mut self) -> Result<Option<BotStatus>, DriverError> {
        (**self).info()
    }

    fn drive(&mut self, velocity_mm_s: i16, radius_mm: i16) -> Result<(), DriverError> {
        (**self).drive(velocity_mm_s, radius_mm)
    }

    fn passive(&mut self) -> Result<(), DriverError> {
        (**self).passive()
    }

    fn safe(&mut self) -> Result<(), DriverError> {
        (**self).safe()
    }

    fn full(&mut self) -> Result<(), DriverError> {
        (**self).full()
    }

    fn reset(&mut self) -> Result<(), DriverError> {
        (**self).reset()
    }

    fn power(&mut self) -> Result<(), DriverError> {
        (**self).power()
    }

    fn close(&mut self) -> Result<(), DriverError> {
        (**self).close()
    }
}
