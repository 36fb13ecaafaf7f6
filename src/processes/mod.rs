//! 四个具体状态机进程
//!
//! 自动充电、自动标定、外部任务纳入、任务执行，共用一个运行状态门
//! 与一个任务槽，由监管器按固定顺序逐拍轮询。每个进程的状态枚举都
//! 是私有的，只有运行状态门在进程之间共享。
//!
//! 应答等待一律受 `ack_timeout` 约束：超时即放弃当前阶段，归还
//! 状态门并退回检查态（任务执行进程的恢复请求例外，见该模块）。

pub mod calibration;
pub mod charging;
pub mod execution;
pub mod intake;

pub use calibration::{AutoCalibrationProcess, CalibrationConfig};
pub use charging::{AutoChargingProcess, ChargingConfig};
pub use execution::TaskExecutionProcess;
pub use intake::CommandIntakeProcess;
