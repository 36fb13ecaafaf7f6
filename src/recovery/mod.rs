//! 恢复与升级
//!
//! 自动检查报出意外的物理状况时怎么办：可恢复的故障按查表结果
//! 做纠正动作并有界重试，不可恢复的升级到限时人工干预等待。
//! 工作流执行器在检查步失败时把这里当叶子过程调用。

pub mod controller;
pub mod moves;

pub use controller::{RecoveryConfig, RecoveryController, RecoveryOutcome};
pub use moves::{check_pose, recovery_move, Direction, Rack, RecoveryMove, Station};
