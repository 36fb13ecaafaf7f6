//! 任务模型与任务监视器
//!
//! 任务是指派给机械臂侧的工作单元，监视器是容量为一的槽位：
//! 一台机械臂一次只做一件事，仲裁"手臂是否空闲"靠它。
//! 监视器在指派与读取两个方向都做拷贝，执行方的工作副本与
//! 监视器的内部记录互不影响，避免状态检查线程与执行线程之间
//! 的丢失更新。

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::core::error::CoordError;
use crate::interfaces::bus::CommandMsg;

/// 任务生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Waiting,
    Executing,
    Finished,
    Error,
}

impl TaskStatus {
    /// 终态后任务不再流转，槽位可以被新任务替换
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TaskStatus::Waiting => "WAITING",
            TaskStatus::Executing => "EXECUTING",
            TaskStatus::Finished => "FINISHED",
            TaskStatus::Error => "ERROR",
        };
        write!(f, "{}", name)
    }
}

/// 任务指令：按种类带类型参数的标签变体
///
/// 优先任务按名字解析到具体变体，普通任务一律归入 `Workflow`
/// 交给工作流执行器。未知的优先任务名在解析时即拒绝。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCommand {
    /// 手臂回到行驶位姿
    ArmToDrivePos,
    /// 手臂各轴回零标定
    ReferenceArm,
    /// 人工强制充电到目标电量
    ChargeRobot { target_charge: u8 },
    /// 人工停止充电
    StopCharge,
    /// 关停自动充电与自动标定
    DisableAutoFunctions,
    /// 恢复自动充电与自动标定
    EnableAutoFunctions,
    /// 普通工作流任务，参数原样传递
    Workflow { name: String, parameters: Vec<String> },
}

impl TaskCommand {
    pub fn parse(
        name: &str,
        parameters: Vec<String>,
        priority: bool,
    ) -> Result<Self, CoordError> {
        if !priority {
            return Ok(TaskCommand::Workflow {
                name: name.to_string(),
                parameters,
            });
        }
        match name {
            "ArmToDrivePos" => Ok(TaskCommand::ArmToDrivePos),
            "ReferenceArm" => Ok(TaskCommand::ReferenceArm),
            "ChargeRobot" => {
                let raw = parameters.first().ok_or_else(|| CoordError::BadTaskParameter {
                    task: name.to_string(),
                    what: "missing target charge".to_string(),
                })?;
                let target_charge: u8 =
                    raw.parse().map_err(|_| CoordError::BadTaskParameter {
                        task: name.to_string(),
                        what: format!("target charge '{}' is not a percentage", raw),
                    })?;
                if target_charge > 100 {
                    return Err(CoordError::BadTaskParameter {
                        task: name.to_string(),
                        what: format!("target charge {} exceeds 100", target_charge),
                    });
                }
                Ok(TaskCommand::ChargeRobot { target_charge })
            }
            "StopCharge" => Ok(TaskCommand::StopCharge),
            "DisableAutoFunctions" => Ok(TaskCommand::DisableAutoFunctions),
            "EnableAutoFunctions" => Ok(TaskCommand::EnableAutoFunctions),
            other => Err(CoordError::UnknownTask(other.to_string())),
        }
    }

    /// 指令名，用于任务状态上报
    pub fn name(&self) -> &str {
        match self {
            TaskCommand::ArmToDrivePos => "ArmToDrivePos",
            TaskCommand::ReferenceArm => "ReferenceArm",
            TaskCommand::ChargeRobot { .. } => "ChargeRobot",
            TaskCommand::StopCharge => "StopCharge",
            TaskCommand::DisableAutoFunctions => "DisableAutoFunctions",
            TaskCommand::EnableAutoFunctions => "EnableAutoFunctions",
            TaskCommand::Workflow { name, .. } => name,
        }
    }
}

/// 机械臂任务
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    command: TaskCommand,
    priority: bool,
    seq: i64,
    status: TaskStatus,
}

impl Task {
    /// 内部合成的优先任务（无外部序号，记 -1）
    pub fn internal(command: TaskCommand) -> Self {
        Self {
            command,
            priority: true,
            seq: -1,
            status: TaskStatus::Waiting,
        }
    }

    /// 由外部指令构造，解析失败的指令不会产生任务
    pub fn from_command(cmd: &CommandMsg) -> Result<Self, CoordError> {
        let command = TaskCommand::parse(&cmd.name, cmd.parameters.clone(), cmd.priority)?;
        Ok(Self {
            command,
            priority: cmd.priority,
            seq: cmd.seq,
            status: TaskStatus::Waiting,
        })
    }

    pub fn command(&self) -> &TaskCommand {
        &self.command
    }

    pub fn name(&self) -> &str {
        self.command.name()
    }

    pub fn is_priority(&self) -> bool {
        self.priority
    }

    pub fn seq(&self) -> i64 {
        self.seq
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
    }
}

/// 任务监视器：容量为一的任务槽
#[derive(Debug, Default)]
pub struct TaskMonitor {
    slot: Mutex<Option<Task>>,
}

impl TaskMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 指派新任务
    ///
    /// 仅当槽位为空或既有任务已到终态时接受，否则报 `TaskSlotOccupied`。
    pub fn assign(&self, task: Task) -> Result<(), CoordError> {
        let mut slot = self.locked();
        if let Some(existing) = slot.as_ref() {
            if !existing.status().is_terminal() {
                return Err(CoordError::TaskSlotOccupied);
            }
        }
        *slot = Some(task);
        Ok(())
    }

    /// 当前任务的副本，执行方拿到的是工作副本而非内部记录
    pub fn assigned_task(&self) -> Option<Task> {
        self.locked().clone()
    }

    pub fn is_assigned(&self) -> bool {
        self.locked().is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.locked()
            .as_ref()
            .map(|t| t.status() == TaskStatus::Finished)
            .unwrap_or(false)
    }

    /// 任务开始执行
    pub fn mark_executing(&self) {
        if let Some(task) = self.locked().as_mut() {
            task.set_status(TaskStatus::Executing);
        }
    }

    /// 执行成功收尾，只有执行中的任务能进 FINISHED
    pub fn mark_finished(&self) {
        self.mark_terminal(TaskStatus::Finished);
    }

    /// 执行失败收尾，只有执行中的任务能进 ERROR
    pub fn mark_error(&self) {
        self.mark_terminal(TaskStatus::Error);
    }

    fn mark_terminal(&self, terminal: TaskStatus) {
        if let Some(task) = self.locked().as_mut() {
            if task.status() == TaskStatus::Executing {
                task.set_status(terminal);
            }
        }
    }

    fn locked(&self) -> std::sync::MutexGuard<'_, Option<Task>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
