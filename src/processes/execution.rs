//! 任务执行进程
//!
//! 任务槽里出现待执行任务后：记住门的当前值并改成 EXECUTING →
//! 检查宿主应用是否在暂停运动（暂停则先请求恢复并等对端确认）→
//! 调执行器干活 → 成功则收尾并把门还原成之前的值；失败则任务记
//! ERROR、还门后进程停在终态，升级处理是调用方的事。
//!
//! 恢复请求的等待不设放弃路径：任务不能被丢下，超时只是把
//! `need_to_resume` 重发一遍（带日志的自转移），EXECUTING 绝不在
//! 收到确认前进入。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::core::gate::{OpGate, OpState};
use crate::core::process::{update_state_machine, StateMachineProcess};
use crate::core::task::{TaskMonitor, TaskStatus};
use crate::exec::TaskExecutor;
use crate::interfaces::app::AppStateMonitor;
use crate::net::channel::JobPort;
use crate::net::message::{tags, JobMsg, CODE_REQUEST};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CheckingForTask,
    CheckingAppState,
    Executing,
    RequestAppResume,
    /// 终态：任务执行失败，本层不做自动恢复
    Error,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::CheckingForTask => "CHECKING_FOR_TASK",
            State::CheckingAppState => "CHECKING_APP_STATE",
            State::Executing => "EXECUTING",
            State::RequestAppResume => "REQUEST_APP_RESUME",
            State::Error => "ERROR",
        }
    }
}

pub struct TaskExecutionProcess {
    executor: Arc<TaskExecutor>,
    port: Arc<dyn JobPort>,
    app: Arc<AppStateMonitor>,
    monitor: Arc<TaskMonitor>,
    gate: Arc<OpGate>,
    /// 恢复请求重发间隔
    resume_resend: Duration,
    state: State,
    /// 占门前的值，收尾时还原
    prior_gate: OpState,
    exec_ok: bool,
    waiting_since: Option<Instant>,
}

impl TaskExecutionProcess {
    pub fn new(
        executor: Arc<TaskExecutor>,
        port: Arc<dyn JobPort>,
        app: Arc<AppStateMonitor>,
        monitor: Arc<TaskMonitor>,
        gate: Arc<OpGate>,
        resume_resend: Duration,
    ) -> Self {
        Self {
            executor,
            port,
            app,
            monitor,
            gate,
            resume_resend,
            state: State::CheckingForTask,
            prior_gate: OpState::Idle,
            exec_ok: false,
            waiting_since: None,
        }
    }

    /// 进程是否已停在终态 ERROR
    pub fn is_halted(&self) -> bool {
        self.state == State::Error
    }

    async fn send_resume_request(&mut self) {
        if let Err(e) = self.port.send(&JobMsg::request(tags::NEED_TO_RESUME)).await {
            error!("execution process failed to send resume request: {}", e);
        }
        self.waiting_since = Some(Instant::now());
    }
}

#[async_trait]
impl StateMachineProcess for TaskExecutionProcess {
    fn name(&self) -> &'static str {
        "task_execution"
    }

    fn current_state(&self) -> &'static str {
        self.state.name()
    }

    async fn evaluate_transitions(&mut self) -> bool {
        match self.state {
            State::CheckingForTask => {
                let waiting = self
                    .monitor
                    .assigned_task()
                    .map(|t| t.status() == TaskStatus::Waiting)
                    .unwrap_or(false);
                if waiting {
                    self.exec_ok = false;
                    self.prior_gate = self.gate.current();
                    self.gate.set(OpState::Executing);
                    self.state = State::CheckingAppState;
                    return true;
                }
                false
            }
            State::CheckingAppState => {
                if self.app.is_pausing() {
                    self.state = State::RequestAppResume;
                } else {
                    self.state = State::Executing;
                }
                true
            }
            State::RequestAppResume => {
                if self
                    .port
                    .inbound()
                    .take(&JobMsg::new(tags::APP_RESUMED, CODE_REQUEST))
                {
                    self.waiting_since = None;
                    self.state = State::Executing;
                    return true;
                }
                let timed_out = self
                    .waiting_since
                    .map(|since| since.elapsed() >= self.resume_resend)
                    .unwrap_or(false);
                if timed_out {
                    // 自转移：重发请求，继续等
                    warn!(
                        "no '{}' confirmation within {:?}, resending resume request",
                        tags::APP_RESUMED,
                        self.resume_resend
                    );
                    return true;
                }
                false
            }
            State::Executing => {
                if self.exec_ok {
                    self.monitor.mark_finished();
                    self.gate.set(self.prior_gate);
                    self.state = State::CheckingForTask;
                } else {
                    self.monitor.mark_error();
                    self.gate.set(self.prior_gate);
                    error!("task execution failed, halting in terminal state");
                    self.state = State::Error;
                }
                true
            }
            State::Error => false,
        }
    }

    async fn run_state_action(&mut self) {
        match self.state {
            State::RequestAppResume => {
                self.send_resume_request().await;
            }
            State::Executing => {
                self.monitor.mark_executing();
                if let Some(task) = self.monitor.assigned_task() {
                    self.exec_ok = self.executor.execute(&task).await;
                }
            }
            State::CheckingForTask | State::CheckingAppState | State::Error => {}
        }
    }

    async fn execute(&mut self) {
        // 门值无关：本进程可以在别的进程持门期间替它执行任务
        update_state_machine(self).await;
    }
}
