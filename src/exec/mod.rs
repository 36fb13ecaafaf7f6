//! 任务执行器
//!
//! 把任务指令变体分发到对应的协作方调用上。优先任务（回行驶位、
//! 回零、强制充 / 停充、自动功能开关）由执行器直接处理；普通工作流
//! 任务转交给宿主注入的 [`WorkflowHandler`]。
//!
//! 执行结果用布尔值上报给任务执行进程：失败细节记进日志，进程层
//! 只关心任务该进 FINISHED 还是 ERROR。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::core::error::CoordError;
use crate::core::gate::AutoFunctionSwitches;
use crate::core::task::{Task, TaskCommand};
use crate::interfaces::arm::ArmCommander;
use crate::interfaces::battery::BatteryManager;

/// 工作流任务的执行缝
///
/// 实验流程（转运料架、装样之类）由宿主应用提供，核心只负责把
/// 任务名和参数递过去。
#[async_trait]
pub trait WorkflowHandler: Send + Sync {
    async fn run(&self, name: &str, parameters: &[String]) -> Result<(), CoordError>;
}

/// 默认工作流实现：记一条日志即算完成
///
/// 没有接入真实流程的宿主（测试、演示）用它兜底。
#[derive(Debug, Default)]
pub struct NoopWorkflow;

#[async_trait]
impl WorkflowHandler for NoopWorkflow {
    async fn run(&self, name: &str, parameters: &[String]) -> Result<(), CoordError> {
        info!("workflow '{}' ({:?}) acknowledged by noop handler", name, parameters);
        Ok(())
    }
}

/// 按指令种类分发的任务执行器
pub struct TaskExecutor {
    arm: Arc<dyn ArmCommander>,
    battery: Arc<dyn BatteryManager>,
    switches: Arc<AutoFunctionSwitches>,
    workflow: Arc<dyn WorkflowHandler>,
}

impl TaskExecutor {
    pub fn new(
        arm: Arc<dyn ArmCommander>,
        battery: Arc<dyn BatteryManager>,
        switches: Arc<AutoFunctionSwitches>,
        workflow: Arc<dyn WorkflowHandler>,
    ) -> Self {
        Self {
            arm,
            battery,
            switches,
            workflow,
        }
    }

    /// 执行一个任务，返回是否成功
    pub async fn execute(&self, task: &Task) -> bool {
        match self.dispatch(task).await {
            Ok(()) => true,
            Err(e) => {
                error!("task '{}' failed: {}", task.name(), e);
                false
            }
        }
    }

    async fn dispatch(&self, task: &Task) -> Result<(), CoordError> {
        match task.command() {
            TaskCommand::ArmToDrivePos => {
                info!("asserting arm in drive position");
                self.arm.assert_drive_pos().await?;
            }
            TaskCommand::ReferenceArm => {
                info!("referencing the arm");
                self.arm.reference().await?;
            }
            TaskCommand::ChargeRobot { target_charge } => {
                info!("attempting manual robot charging to {}%", target_charge);
                if !self.battery.force_start_charging(*target_charge).await? {
                    // 目标电量不比当前高，电池侧拒绝；任务本身算完成
                    warn!(
                        "manual charging to {}% rejected, state of charge already close",
                        target_charge
                    );
                }
            }
            TaskCommand::StopCharge => {
                info!("attempting manual robot charging stop");
                self.battery.force_stop_charging().await?;
            }
            TaskCommand::DisableAutoFunctions => {
                info!("disabling auto charging and calibration");
                self.switches.set_all(false);
            }
            TaskCommand::EnableAutoFunctions => {
                info!("enabling auto charging and calibration");
                self.switches.set_all(true);
            }
            TaskCommand::Workflow { name, parameters } => {
                self.workflow.run(name, parameters).await?;
            }
        }
        Ok(())
    }
}
