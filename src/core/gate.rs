//! 运行状态门
//!
//! 全体后台进程共享的单一枚举值，描述机器人当下在做什么，同时充当
//! 互斥信号：只有观察到门处于 IDLE 的进程才允许把它改成自己的忙值，
//! 谁改成忙值谁负责在收尾（含出错路径）时改回原值或 IDLE。
//!
//! 取门用比较交换而不是先查后设，单轮询线程模型下两者等价，宿主
//! 违反该模型时比较交换仍然保证只有一个赢家。

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// 机器人运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpState {
    /// 未初始化（上电后、宿主把门置闲之前）
    Invalid = 0,
    /// 空闲，可被任一进程取用
    Idle = 1,
    /// 正在执行手动指派的任务
    Executing = 2,
    /// 正在执行外部指令下发的任务
    ExecutingExternalTask = 3,
    /// 正在充电流程中
    Charging = 4,
    /// 正在标定流程中
    Calibrating = 5,
}

impl OpState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => OpState::Idle,
            2 => OpState::Executing,
            3 => OpState::ExecutingExternalTask,
            4 => OpState::Charging,
            5 => OpState::Calibrating,
            _ => OpState::Invalid,
        }
    }
}

impl std::fmt::Display for OpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OpState::Invalid => "INVALID",
            OpState::Idle => "IDLE",
            OpState::Executing => "EXECUTING",
            OpState::ExecutingExternalTask => "EXECUTING_EXTERNAL_TASK",
            OpState::Charging => "CHARGING",
            OpState::Calibrating => "CALIBRATING",
        };
        write!(f, "{}", name)
    }
}

/// 运行状态门
///
/// 新建时为 `Invalid`，宿主完成启动后调用 `set(OpState::Idle)` 放行。
#[derive(Debug)]
pub struct OpGate {
    state: AtomicU8,
}

impl Default for OpGate {
    fn default() -> Self {
        Self::new()
    }
}

impl OpGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(OpState::Invalid as u8),
        }
    }

    pub fn current(&self) -> OpState {
        OpState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 仅当门当前为 `from` 时改成 `to`，返回是否改写成功
    pub fn compare_and_set(&self, from: OpState, to: OpState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 无条件改写，持门进程收尾时恢复原值用
    pub fn set(&self, to: OpState) {
        self.state.store(to as u8, Ordering::Release);
    }
}

/// 自动功能开关
///
/// 外部指令可以临时关停自动充电与自动标定（例如长流程实验期间
/// 不许机器人擅自离位），两个进程在各自的检查转移里查询开关。
#[derive(Debug)]
pub struct AutoFunctionSwitches {
    charging: AtomicBool,
    calibration: AtomicBool,
}

impl Default for AutoFunctionSwitches {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoFunctionSwitches {
    pub fn new() -> Self {
        Self {
            charging: AtomicBool::new(true),
            calibration: AtomicBool::new(true),
        }
    }

    pub fn allow_charging(&self) -> bool {
        self.charging.load(Ordering::Acquire)
    }

    pub fn allow_calibration(&self) -> bool {
        self.calibration.load(Ordering::Acquire)
    }

    pub fn set_all(&self, enabled: bool) {
        self.charging.store(enabled, Ordering::Release);
        self.calibration.store(enabled, Ordering::Release);
    }
}
