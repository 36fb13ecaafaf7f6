//! 自动标定进程
//!
//! 距上次标定超过设定间隔后：占门 → 请底盘去标定位 → 收到就位应答
//! 后给任务槽塞一个内部合成的"各轴回零"优先任务 → 任务收尾后通知
//! 对端标定完成、盖时间戳、还门。
//!
//! 上次标定时刻只在进程内存续（开机视为立即到期），跨次上电的持久
//! 化是宿主的事。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::core::gate::{AutoFunctionSwitches, OpGate, OpState};
use crate::core::process::{update_state_machine, StateMachineProcess};
use crate::core::task::{Task, TaskCommand, TaskMonitor, TaskStatus};
use crate::net::channel::JobPort;
use crate::net::message::{tags, JobMsg};

/// 自动标定参数
#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    /// 两次标定之间允许的最长间隔
    pub interval: Duration,
    /// 应答等待阶段的超时
    pub ack_timeout: Duration,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(4 * 60 * 60),
            ack_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CheckingForCalibration,
    PrepCalibration,
    Calibrating,
    PostCalibration,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::CheckingForCalibration => "CHECKING_FOR_CALIBRATION",
            State::PrepCalibration => "PREP_CALIBRATION",
            State::Calibrating => "CALIBRATING",
            State::PostCalibration => "POST_CALIBRATION",
        }
    }
}

pub struct AutoCalibrationProcess {
    port: Arc<dyn JobPort>,
    monitor: Arc<TaskMonitor>,
    gate: Arc<OpGate>,
    switches: Arc<AutoFunctionSwitches>,
    cfg: CalibrationConfig,
    state: State,
    /// `None` 表示开机后尚未标定过，第一时间就到期
    last_calibration: Option<Instant>,
    waiting_since: Option<Instant>,
    /// 本轮回零任务是否成功（失败则不盖时间戳，下一拍重来）
    round_ok: bool,
}

impl AutoCalibrationProcess {
    pub fn new(
        port: Arc<dyn JobPort>,
        monitor: Arc<TaskMonitor>,
        gate: Arc<OpGate>,
        switches: Arc<AutoFunctionSwitches>,
        cfg: CalibrationConfig,
    ) -> Self {
        Self {
            port,
            monitor,
            gate,
            switches,
            cfg,
            state: State::CheckingForCalibration,
            last_calibration: None,
            waiting_since: None,
            round_ok: false,
        }
    }

    fn calibration_due(&self) -> bool {
        match self.last_calibration {
            Some(last) => last.elapsed() > self.cfg.interval,
            None => true,
        }
    }

    fn ack_timed_out(&self) -> bool {
        self.waiting_since
            .map(|since| since.elapsed() >= self.cfg.ack_timeout)
            .unwrap_or(false)
    }

    async fn send(&self, msg: JobMsg) {
        if let Err(e) = self.port.send(&msg).await {
            error!("calibration process failed to send {}: {}", msg, e);
        }
    }
}

#[async_trait]
impl StateMachineProcess for AutoCalibrationProcess {
    fn name(&self) -> &'static str {
        "auto_calibration"
    }

    fn current_state(&self) -> &'static str {
        self.state.name()
    }

    async fn evaluate_transitions(&mut self) -> bool {
        match self.state {
            State::CheckingForCalibration => {
                if self.switches.allow_calibration()
                    && self.calibration_due()
                    && self.gate.compare_and_set(OpState::Idle, OpState::Calibrating)
                {
                    self.waiting_since = Some(Instant::now());
                    self.round_ok = false;
                    self.state = State::PrepCalibration;
                    return true;
                }
                false
            }
            State::PrepCalibration => {
                if self.port.inbound().take(&JobMsg::ack(tags::GOTO_CALIBRATE)) {
                    self.waiting_since = None;
                    self.state = State::Calibrating;
                    return true;
                }
                if self.ack_timed_out() {
                    warn!(
                        "calibration ack '{}' not received within {:?}, aborting phase",
                        tags::GOTO_CALIBRATE,
                        self.cfg.ack_timeout
                    );
                    self.waiting_since = None;
                    self.gate.set(OpState::Idle);
                    self.state = State::CheckingForCalibration;
                    return true;
                }
                false
            }
            State::Calibrating => {
                match self.monitor.assigned_task().map(|t| t.status()) {
                    Some(TaskStatus::Finished) => {
                        self.round_ok = true;
                        self.state = State::PostCalibration;
                        true
                    }
                    Some(TaskStatus::Error) => {
                        // 回零失败不盖时间戳，收尾后下一轮重试
                        error!("arm referencing task failed, calibration round lost");
                        self.round_ok = false;
                        self.state = State::PostCalibration;
                        true
                    }
                    _ => false,
                }
            }
            State::PostCalibration => {
                // 原型协议不等 done_calibrating 的应答，收尾即还门
                if self.round_ok {
                    self.last_calibration = Some(Instant::now());
                    info!("arm calibration finished");
                }
                self.gate.set(OpState::Idle);
                self.state = State::CheckingForCalibration;
                true
            }
        }
    }

    async fn run_state_action(&mut self) {
        match self.state {
            State::PrepCalibration => {
                self.send(JobMsg::request(tags::GOTO_CALIBRATE)).await;
            }
            State::Calibrating => {
                info!("robot is calibrating");
                if let Err(e) = self.monitor.assign(Task::internal(TaskCommand::ReferenceArm)) {
                    // 门在手里时槽位不该被占，占了说明宿主破坏了单轮询约定
                    error!("failed to assign referencing task: {}", e);
                }
            }
            State::PostCalibration => {
                self.send(JobMsg::request(tags::DONE_CALIBRATING)).await;
            }
            State::CheckingForCalibration => {}
        }
    }

    async fn execute(&mut self) {
        let gate = self.gate.current();
        if gate == OpState::Idle || gate == OpState::Calibrating {
            update_state_machine(self).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::net::mock::MockJobPort;

    fn process(cfg: CalibrationConfig) -> (
        AutoCalibrationProcess,
        Arc<MockJobPort>,
        Arc<TaskMonitor>,
        Arc<OpGate>,
    ) {
        let port = Arc::new(MockJobPort::new());
        let monitor = Arc::new(TaskMonitor::new());
        let gate = Arc::new(OpGate::new());
        gate.set(OpState::Idle);
        let proc = AutoCalibrationProcess::new(
            Arc::clone(&port) as Arc<dyn JobPort>,
            Arc::clone(&monitor),
            Arc::clone(&gate),
            Arc::new(AutoFunctionSwitches::new()),
            cfg,
        );
        (proc, port, monitor, gate)
    }

    fn fast_cfg() -> CalibrationConfig {
        CalibrationConfig {
            interval: Duration::from_secs(3600),
            ack_timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_due_at_boot_and_full_cycle() {
        let (mut proc, port, monitor, gate) = process(fast_cfg());

        // 开机即到期
        proc.execute().await;
        assert_eq!(proc.current_state(), "PREP_CALIBRATION");
        assert_eq!(gate.current(), OpState::Calibrating);
        assert_eq!(port.sent(), vec![JobMsg::request(tags::GOTO_CALIBRATE)]);

        port.inject(JobMsg::ack(tags::GOTO_CALIBRATE));
        proc.execute().await;
        assert_eq!(proc.current_state(), "CALIBRATING");
        let task = monitor.assigned_task().unwrap();
        assert_eq!(task.command(), &TaskCommand::ReferenceArm);
        assert!(task.is_priority());

        // 模拟任务执行进程跑完回零
        monitor.mark_executing();
        monitor.mark_finished();
        proc.execute().await;
        assert_eq!(proc.current_state(), "POST_CALIBRATION");

        proc.execute().await;
        assert_eq!(proc.current_state(), "CHECKING_FOR_CALIBRATION");
        assert_eq!(gate.current(), OpState::Idle);
        assert_eq!(port.sent_count(&JobMsg::request(tags::DONE_CALIBRATING)), 1);

        // 刚标定过，间隔未到不再触发
        proc.execute().await;
        assert_eq!(proc.current_state(), "CHECKING_FOR_CALIBRATION");
    }

    #[tokio::test]
    async fn test_ack_timeout_releases_gate() {
        let (mut proc, _port, _monitor, gate) = process(fast_cfg());
        proc.execute().await;
        assert_eq!(gate.current(), OpState::Calibrating);

        tokio::time::sleep(Duration::from_millis(60)).await;
        proc.execute().await;
        assert_eq!(proc.current_state(), "CHECKING_FOR_CALIBRATION");
        assert_eq!(gate.current(), OpState::Idle);
    }

    #[tokio::test]
    async fn test_failed_referencing_keeps_calibration_due() {
        let (mut proc, port, monitor, gate) = process(fast_cfg());
        proc.execute().await;
        port.inject(JobMsg::ack(tags::GOTO_CALIBRATE));
        proc.execute().await;

        monitor.mark_executing();
        monitor.mark_error();
        proc.execute().await;
        proc.execute().await;
        assert_eq!(gate.current(), OpState::Idle);

        // 时间戳没盖上，下一拍重新占门
        proc.execute().await;
        assert_eq!(proc.current_state(), "PREP_CALIBRATION");
    }

    #[tokio::test]
    async fn test_disabled_switch_blocks_calibration() {
        let port = Arc::new(MockJobPort::new());
        let gate = Arc::new(OpGate::new());
        gate.set(OpState::Idle);
        let switches = Arc::new(AutoFunctionSwitches::new());
        switches.set_all(false);
        let mut proc = AutoCalibrationProcess::new(
            Arc::clone(&port) as Arc<dyn JobPort>,
            Arc::new(TaskMonitor::new()),
            gate,
            switches,
            fast_cfg(),
        );

        proc.execute().await;
        assert_eq!(proc.current_state(), "CHECKING_FOR_CALIBRATION");
        assert!(port.sent().is_empty());
    }
}
