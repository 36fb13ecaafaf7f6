//! 协同核心错误类型
//!
//! 故障分类：传输故障（通道 I/O）、协议故障（帧错位 / 超长标签）、
//! 任务故障（槽位占用 / 未知任务名）、物理与感知故障（运动 / 场景
//! 描述），以及无恢复路径的充电致命故障。

use thiserror::Error;

use crate::interfaces::arm::MotionError;

/// 协同核心运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum CoordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connect to {addr} timed out after {timeout_ms} ms")]
    ConnectTimeout { addr: String, timeout_ms: u64 },

    #[error("job channel is not connected")]
    NotConnected,

    #[error("job tag is {len} bytes, frame bound is {max}")]
    TagTooLong { len: usize, max: usize },

    #[error("corrupt frame: {0}")]
    CorruptFrame(String),

    #[error("task slot is occupied by an unfinished task")]
    TaskSlotOccupied,

    #[error("unknown task name: {0}")]
    UnknownTask(String),

    #[error("task '{task}' has invalid parameters: {what}")]
    BadTaskParameter { task: String, what: String },

    #[error("motion failed: {0}")]
    Motion(#[from] MotionError),

    #[error("scene description failed: {0}")]
    Scene(String),

    #[error("battery interface failed: {0}")]
    Battery(String),

    /// 充电装置带病运转，无自动恢复路径，需要人工诊断
    #[error("charging process is not working, human diagnosis required")]
    ChargingFault,
}
