//! 外部任务纳入进程
//!
//! 中间件适配器把舰队控制器下发的指令推进有界指令队列，本进程在
//! 门空闲时取队首指令、解析成任务、塞进任务槽，任务收尾后还门。
//! 解析不通过的指令记错误日志后丢弃，不占门。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::core::gate::{OpGate, OpState};
use crate::core::process::{update_state_machine, StateMachineProcess};
use crate::core::task::{Task, TaskMonitor, TaskStatus};
use crate::interfaces::bus::CommandQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingOnCmd,
    Executing,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::WaitingOnCmd => "WAITING_ON_CMD",
            State::Executing => "EXECUTING",
        }
    }
}

pub struct CommandIntakeProcess {
    commands: Arc<CommandQueue>,
    monitor: Arc<TaskMonitor>,
    gate: Arc<OpGate>,
    state: State,
    /// 已出队待指派的任务，进入 EXECUTING 的动作里消费
    pending: Option<Task>,
}

impl CommandIntakeProcess {
    pub fn new(commands: Arc<CommandQueue>, monitor: Arc<TaskMonitor>, gate: Arc<OpGate>) -> Self {
        Self {
            commands,
            monitor,
            gate,
            state: State::WaitingOnCmd,
            pending: None,
        }
    }
}

#[async_trait]
impl StateMachineProcess for CommandIntakeProcess {
    fn name(&self) -> &'static str {
        "command_intake"
    }

    fn current_state(&self) -> &'static str {
        self.state.name()
    }

    async fn evaluate_transitions(&mut self) -> bool {
        match self.state {
            State::WaitingOnCmd => {
                let cmd = match self.commands.peek() {
                    Some(cmd) => cmd,
                    None => return false,
                };
                let task = match Task::from_command(&cmd) {
                    Ok(task) => task,
                    Err(e) => {
                        error!("dropping command '{}' (seq {}): {}", cmd.name, cmd.seq, e);
                        let _ = self.commands.pop();
                        return false;
                    }
                };
                if !self
                    .gate
                    .compare_and_set(OpState::Idle, OpState::ExecutingExternalTask)
                {
                    return false;
                }
                let _ = self.commands.pop();
                self.pending = Some(task);
                self.state = State::Executing;
                true
            }
            State::Executing => match self.monitor.assigned_task().map(|t| t.status()) {
                Some(TaskStatus::Finished) => {
                    self.gate.set(OpState::Idle);
                    self.state = State::WaitingOnCmd;
                    true
                }
                Some(TaskStatus::Error) => {
                    warn!("external task ended in error, releasing the gate");
                    self.gate.set(OpState::Idle);
                    self.state = State::WaitingOnCmd;
                    true
                }
                _ => false,
            },
        }
    }

    async fn run_state_action(&mut self) {
        if self.state == State::Executing {
            if let Some(task) = self.pending.take() {
                if let Err(e) = self.monitor.assign(task) {
                    error!("failed to assign external task: {}", e);
                    self.gate.set(OpState::Idle);
                    self.state = State::WaitingOnCmd;
                }
            }
        }
    }

    async fn execute(&mut self) {
        let gate = self.gate.current();
        if gate == OpState::Idle || gate == OpState::ExecutingExternalTask {
            update_state_machine(self).await;
        }
    }
}
