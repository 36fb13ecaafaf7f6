//! 机器人中间件总线边界
//!
//! 舰队控制器通过中间件下发指令、接收状态。总线传输本身不在核心
//! 范围内：适配器把收到的指令推进 [`CommandQueue`]，核心把状态
//! 报文交给 [`RobotBus`] 实现发布出去。
//!
//! 指令按递增序号编号，进队时检查序号跳变：发现丢失只告警，
//! 不请求重传。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::CoordError;
use crate::core::task::TaskStatus;

/// 指令队列容量，塞满后新指令被丢弃并告警
pub const COMMAND_QUEUE_CAPACITY: usize = 10;

/// 外部下发的指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMsg {
    pub name: String,
    pub parameters: Vec<String>,
    pub priority: bool,
    pub seq: i64,
}

/// 周期上报的机器人状态
#[derive(Debug, Clone, Serialize)]
pub struct RobotStatusReport {
    /// 运行状态门的当前值
    pub op_state: String,
    pub state_of_charge: u8,
    /// 作业通道是否存活
    pub channel_connected: bool,
    pub stamp: DateTime<Utc>,
}

/// 周期上报的任务状态
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatusReport {
    pub name: String,
    pub status: TaskStatus,
    pub seq: i64,
    pub stamp: DateTime<Utc>,
}

impl TaskStatusReport {
    /// 槽位为空时的占位报文
    pub fn idle() -> Self {
        Self {
            name: String::new(),
            status: TaskStatus::Waiting,
            seq: -1,
            stamp: Utc::now(),
        }
    }
}

/// 状态发布接口，由具体中间件适配器实现
#[async_trait]
pub trait RobotBus: Send + Sync {
    async fn publish_robot_status(&self, report: &RobotStatusReport) -> Result<(), CoordError>;

    async fn publish_task_status(&self, report: &TaskStatusReport) -> Result<(), CoordError>;
}

/// 有界指令队列
///
/// 优先指令插队到队首，普通指令排到队尾。取指令的是外部任务
/// 纳入进程，喂指令的是中间件适配器的接收回调。
#[derive(Debug)]
pub struct CommandQueue {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    queue: VecDeque<CommandMsg>,
    last_seq: i64,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(COMMAND_QUEUE_CAPACITY),
                last_seq: 0,
            }),
        }
    }

    /// 进队一条指令，返回是否收下
    pub fn offer(&self, cmd: CommandMsg) -> bool {
        let mut inner = self.locked();
        if cmd.seq > inner.last_seq + 1 {
            warn!(
                "a task command was lost somewhere: got seq {}, expected {}",
                cmd.seq,
                inner.last_seq + 1
            );
        }
        inner.last_seq = cmd.seq;

        if inner.queue.len() >= COMMAND_QUEUE_CAPACITY {
            warn!(
                "command queue is full, dropping '{}' (seq {})",
                cmd.name, cmd.seq
            );
            return false;
        }
        if cmd.priority {
            inner.queue.push_front(cmd);
        } else {
            inner.queue.push_back(cmd);
        }
        true
    }

    /// 看一眼队首但不取走
    pub fn peek(&self) -> Option<CommandMsg> {
        self.locked().queue.front().cloned()
    }

    /// 取走队首指令
    pub fn pop(&self) -> Option<CommandMsg> {
        self.locked().queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.locked().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().queue.is_empty()
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(name: &str, priority: bool, seq: i64) -> CommandMsg {
        CommandMsg {
            name: name.to_string(),
            parameters: vec![],
            priority,
            seq,
        }
    }

    #[test]
    fn test_priority_commands_jump_the_queue() {
        let queue = CommandQueue::new();
        assert!(queue.offer(cmd("a", false, 1)));
        assert!(queue.offer(cmd("b", false, 2)));
        assert!(queue.offer(cmd("urgent", true, 3)));

        assert_eq!(queue.pop().unwrap().name, "urgent");
        assert_eq!(queue.pop().unwrap().name, "a");
        assert_eq!(queue.pop().unwrap().name, "b");
    }

    #[test]
    fn test_full_queue_drops_new_commands() {
        let queue = CommandQueue::new();
        for i in 0..COMMAND_QUEUE_CAPACITY {
            assert!(queue.offer(cmd("t", false, i as i64 + 1)));
        }
        assert!(!queue.offer(cmd("overflow", false, 99)));
        assert_eq!(queue.len(), COMMAND_QUEUE_CAPACITY);
    }

    #[test]
    fn test_seq_gap_is_tolerated() {
        // 跳号只告警，指令本身照常进队
        let queue = CommandQueue::new();
        assert!(queue.offer(cmd("a", false, 1)));
        assert!(queue.offer(cmd("b", false, 5)));
        assert_eq!(queue.len(), 2);
        assert!(queue.offer(cmd("c", false, 6)));
    }

    #[test]
    fn test_peek_leaves_command_in_place() {
        let queue = CommandQueue::new();
        queue.offer(cmd("a", false, 1));
        assert_eq!(queue.peek().unwrap().name, "a");
        assert_eq!(queue.len(), 1);
    }
}
