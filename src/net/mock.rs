//! 记录型作业端口
//!
//! 实现 `JobPort` 但不碰网络：发出的消息全部记录在内存里，
//! 入站队列由测试方直接注入。状态机的场景测试都靠它驱动。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use super::channel::JobPort;
use super::message::JobMsg;
use super::queue::MessageQueue;
use crate::core::error::CoordError;

#[derive(Default)]
pub struct MockJobPort {
    inbound: Arc<MessageQueue>,
    sent: Mutex<Vec<JobMsg>>,
    disconnected: AtomicBool,
}

impl MockJobPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// 向入站队列注入一条消息，模拟对端应答
    pub fn inject(&self, msg: JobMsg) {
        self.inbound.push(msg);
    }

    /// 已发出消息的快照（按发送顺序）
    pub fn sent(&self) -> Vec<JobMsg> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 与 `wanted` 值相等的已发出消息条数
    pub fn sent_count(&self, wanted: &JobMsg) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|m| *m == wanted)
            .count()
    }

    pub fn set_connected(&self, up: bool) {
        self.disconnected.store(!up, Ordering::Release);
    }
}

#[async_trait]
impl JobPort for MockJobPort {
    async fn send(&self, msg: &JobMsg) -> Result<(), CoordError> {
        if self.disconnected.load(Ordering::Acquire) {
            return Err(CoordError::NotConnected);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg.clone());
        Ok(())
    }

    fn inbound(&self) -> Arc<MessageQueue> {
        Arc::clone(&self.inbound)
    }

    fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::Acquire)
    }
}
