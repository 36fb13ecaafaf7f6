//! 进程监管器
//!
//! 单轮询线程模型的落点：四个状态机进程挂在同一个监管任务上，
//! 每拍按固定顺序各推进一步。门的先查后设之所以安全，就因为
//! 任何时刻只有一个进程在推进。
//!
//! 轮询顺序是自动充电、自动标定、任务纳入、任务执行：门被争用时
//! 电量安全优先。每拍结束后向中间件总线发布机器人与任务状态。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::core::error::CoordError;
use crate::core::gate::OpGate;
use crate::core::process::StateMachineProcess;
use crate::core::task::TaskMonitor;
use crate::interfaces::battery::BatteryManager;
use crate::interfaces::bus::{RobotBus, RobotStatusReport, TaskStatusReport};
use crate::net::channel::JobPort;
use crate::processes::{
    AutoCalibrationProcess, AutoChargingProcess, CommandIntakeProcess, TaskExecutionProcess,
};

/// 监管器参数
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// 轮询周期
    pub tick: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(200),
        }
    }
}

pub struct Supervisor {
    charging: AutoChargingProcess,
    calibration: AutoCalibrationProcess,
    intake: CommandIntakeProcess,
    execution: TaskExecutionProcess,
    gate: Arc<OpGate>,
    monitor: Arc<TaskMonitor>,
    battery: Arc<dyn BatteryManager>,
    bus: Arc<dyn RobotBus>,
    port: Arc<dyn JobPort>,
    cfg: SupervisorConfig,
    halt_reported: bool,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        charging: AutoChargingProcess,
        calibration: AutoCalibrationProcess,
        intake: CommandIntakeProcess,
        execution: TaskExecutionProcess,
        gate: Arc<OpGate>,
        monitor: Arc<TaskMonitor>,
        battery: Arc<dyn BatteryManager>,
        bus: Arc<dyn RobotBus>,
        port: Arc<dyn JobPort>,
        cfg: SupervisorConfig,
    ) -> Self {
        Self {
            charging,
            calibration,
            intake,
            execution,
            gate,
            monitor,
            battery,
            bus,
            port,
            cfg,
            halt_reported: false,
        }
    }

    /// 主循环：按拍推进四个进程，直到被取消或出现致命故障
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), CoordError> {
        info!("supervisor started, tick = {:?}", self.cfg.tick);
        let mut ticker = tokio::time::interval(self.cfg.tick);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("supervisor stop requested");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            self.poll_once().await;
            self.publish_status().await;

            if self.charging.is_faulted() {
                error!("charging fault latched, supervisor stopping");
                return Err(CoordError::ChargingFault);
            }
        }
    }

    /// 单拍：固定顺序各推进一步（测试也从这里驱动）
    pub async fn poll_once(&mut self) {
        self.charging.execute().await;
        self.calibration.execute().await;
        self.intake.execute().await;
        self.execution.execute().await;

        if self.execution.is_halted() && !self.halt_reported {
            warn!("task execution halted in error state, operator attention required");
            self.halt_reported = true;
        }
    }

    async fn publish_status(&self) {
        let robot = RobotStatusReport {
            op_state: self.gate.current().to_string(),
            state_of_charge: self.battery.state_of_charge().await,
            channel_connected: self.port.is_connected(),
            stamp: chrono::Utc::now(),
        };
        if let Err(e) = self.bus.publish_robot_status(&robot).await {
            warn!("failed to publish robot status: {}", e);
        }

        let task = match self.monitor.assigned_task() {
            Some(task) => TaskStatusReport {
                name: task.name().to_string(),
                status: task.status(),
                seq: task.seq(),
                stamp: chrono::Utc::now(),
            },
            None => TaskStatusReport::idle(),
        };
        if let Err(e) = self.bus.publish_task_status(&task).await {
            warn!("failed to publish task status: {}", e);
        }
    }
}
