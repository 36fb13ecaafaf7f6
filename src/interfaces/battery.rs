//! 电池与充电硬件接口
//!
//! 电量查询、充电继电器开合、充电阈值维护。电池化学与继电器时序
//! 属于底盘侧实现，自动充电进程只消费这几个谓词和开关。

use async_trait::async_trait;

use crate::core::error::CoordError;

#[async_trait]
pub trait BatteryManager: Send + Sync {
    /// 当前电量百分比
    async fn state_of_charge(&self) -> u8;

    /// 电量已低到需要充电（≤ 最低阈值）
    async fn charging_needed(&self) -> bool;

    /// 电量已高过充满阈值，可以收尾
    async fn charging_done(&self) -> bool;

    /// 充电装置带病运转（已使能却不进电），无自动恢复路径
    async fn charging_fault(&self) -> bool;

    /// 接通充电
    async fn start_charging(&self) -> Result<(), CoordError>;

    /// 断开充电
    async fn stop_charging(&self) -> Result<(), CoordError>;

    /// 一轮充电收尾后刷新下一轮的阈值
    async fn refresh_thresholds(&self);

    /// 人工强制充电到目标电量
    ///
    /// 目标电量必须高于当前电量至少 2 个百分点才接受，
    /// 返回是否真正开始充电。
    async fn force_start_charging(&self, target_charge: u8) -> Result<bool, CoordError>;

    /// 人工强制停止充电
    async fn force_stop_charging(&self) -> Result<(), CoordError>;
}
