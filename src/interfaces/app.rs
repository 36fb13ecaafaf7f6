//! 宿主应用运动状态
//!
//! 臂侧宿主应用可能因为安全门、手动示教等原因暂停运动。任务执行
//! 进程在动手前查询这里：暂停中的应用必须先请求恢复并等到对端
//! 确认，才允许开始执行任务。

use std::sync::atomic::{AtomicBool, Ordering};

/// 宿主应用运动状态监视器，宿主在状态回调里改写
#[derive(Debug, Default)]
pub struct AppStateMonitor {
    pausing: AtomicBool,
}

impl AppStateMonitor {
    /// 新建时视为正常运行（未暂停）
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pausing(&self) {
        self.pausing.store(true, Ordering::Release);
    }

    pub fn set_resuming(&self) {
        self.pausing.store(false, Ordering::Release);
    }

    pub fn is_pausing(&self) -> bool {
        self.pausing.load(Ordering::Acquire)
    }
}
