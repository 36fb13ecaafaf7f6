//! 运动执行接口
//!
//! 机械臂的点位 / 直线 / 力敏运动原语。运动规划与运动学安全由
//! 臂侧控制器自行负责，这里只约定调用形式与失败上报方式。

use async_trait::async_trait;
use thiserror::Error;

/// 笛卡尔坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// 碰撞处置策略：停在碰撞点继续，或按失败上报
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    StopAtCollision,
    FailAtCollision,
}

/// 运动失败
#[derive(Error, Debug)]
pub enum MotionError {
    #[error("unexpected collision detected")]
    CollisionDetected,

    #[error("frame not found: {0}")]
    FrameNotFound(String),

    #[error("arm interface error: {0}")]
    Interface(String),
}

/// 机械臂运动指挥接口
#[async_trait]
pub trait ArmCommander: Send + Sync {
    /// 点到点运动到命名坐标系，速度为额定速度的比例（0.0 ~ 1.0）
    async fn move_ptp(&self, frame: &str, tool: &str, rel_velocity: f64)
        -> Result<(), MotionError>;

    /// 直线运动到命名坐标系，笛卡尔速度单位 mm/s
    async fn move_lin(&self, frame: &str, tool: &str, cart_velocity: f64)
        -> Result<(), MotionError>;

    /// 力敏直线运动，超过力阈值按 `policy` 处置
    async fn move_lin_sensitive(
        &self,
        frame: &str,
        tool: &str,
        force_n: f64,
        cart_velocity: f64,
        policy: CollisionPolicy,
    ) -> Result<(), MotionError>;

    /// 沿给定轴做相对直线运动，遇到 `force_n` 以上的阻力即停
    ///
    /// `distance_mm` 带符号，恢复探压动作用它来回推
    async fn move_lin_rel_force(
        &self,
        distance_mm: f64,
        force_n: f64,
        velocity: f64,
        axis: Axis,
    ) -> Result<(), MotionError>;

    /// 手臂回到行驶位姿（底盘移动前必须收拢）
    async fn assert_drive_pos(&self) -> Result<(), MotionError>;

    /// 各轴回零标定
    async fn reference(&self) -> Result<(), MotionError>;
}
