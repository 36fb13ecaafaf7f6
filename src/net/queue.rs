//! 入站消息队列
//!
//! 无界、线程安全。消费方按值匹配摘取自己等待的那条消息，
//! 其余并发到达的消息原样留给别的等待者。这就是协议事实上的
//! 多路复用机制：消息按字面内容关联，而不是按请求 id。

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::message::JobMsg;

/// 按值匹配出队的消息队列
#[derive(Debug, Default)]
pub struct MessageQueue {
    inner: Mutex<VecDeque<JobMsg>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 入队（由通道读循环调用）
    pub fn push(&self, msg: JobMsg) {
        self.locked().push_back(msg);
    }

    /// 摘取第一条与 `wanted` 值相等的消息，命中返回 true
    pub fn take(&self, wanted: &JobMsg) -> bool {
        let mut queue = self.locked();
        if let Some(pos) = queue.iter().position(|m| m == wanted) {
            let _ = queue.remove(pos);
            true
        } else {
            false
        }
    }

    /// 弹出队首消息（排空式消费者使用）
    pub fn pop(&self) -> Option<JobMsg> {
        self.locked().pop_front()
    }

    pub fn len(&self) -> usize {
        self.locked().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().is_empty()
    }

    // 锁中毒时接管内部数据继续运行，队列里没有需要保护的半成品状态
    fn locked(&self) -> MutexGuard<'_, VecDeque<JobMsg>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
