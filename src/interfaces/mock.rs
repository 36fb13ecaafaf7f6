//! 模拟协作方
//!
//! 全套可脚本化的接口实现：记录收到的调用、按剧本给应答。
//! 状态机与恢复控制器的场景测试靠它们驱动，演示程序也直接拿
//! 它们当"硬件"。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::arm::{ArmCommander, Axis, CollisionPolicy, MotionError};
use super::battery::BatteryManager;
use super::bus::{RobotBus, RobotStatusReport, TaskStatusReport};
use super::scene::SceneDescriber;
use crate::core::error::CoordError;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ========== 机械臂 ==========

/// 记录型机械臂：每次运动记一条文本流水
#[derive(Default)]
pub struct MockArm {
    motions: Mutex<Vec<String>>,
    fail_all: AtomicBool,
    latency: Duration,
}

impl MockArm {
    pub fn new() -> Self {
        Self::default()
    }

    /// 给每次运动加一段模拟耗时（演示程序用）
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// 之后的所有运动都失败
    pub fn set_fail(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::Release);
    }

    /// 运动流水快照
    pub fn motions(&self) -> Vec<String> {
        locked(&self.motions).clone()
    }

    /// 以 `prefix` 开头的流水条数
    pub fn motion_count(&self, prefix: &str) -> usize {
        locked(&self.motions)
            .iter()
            .filter(|m| m.starts_with(prefix))
            .count()
    }

    async fn record(&self, entry: String) -> Result<(), MotionError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_all.load(Ordering::Acquire) {
            return Err(MotionError::Interface("scripted motion failure".to_string()));
        }
        debug!("mock arm: {}", entry);
        locked(&self.motions).push(entry);
        Ok(())
    }
}

#[async_trait]
impl ArmCommander for MockArm {
    async fn move_ptp(
        &self,
        frame: &str,
        tool: &str,
        rel_velocity: f64,
    ) -> Result<(), MotionError> {
        self.record(format!("ptp:{}:{}:{}", frame, tool, rel_velocity)).await
    }

    async fn move_lin(
        &self,
        frame: &str,
        tool: &str,
        cart_velocity: f64,
    ) -> Result<(), MotionError> {
        self.record(format!("lin:{}:{}:{}", frame, tool, cart_velocity)).await
    }

    async fn move_lin_sensitive(
        &self,
        frame: &str,
        tool: &str,
        force_n: f64,
        cart_velocity: f64,
        policy: CollisionPolicy,
    ) -> Result<(), MotionError> {
        self.record(format!(
            "lin_sensitive:{}:{}:{}:{}:{:?}",
            frame, tool, force_n, cart_velocity, policy
        ))
        .await
    }

    async fn move_lin_rel_force(
        &self,
        distance_mm: f64,
        force_n: f64,
        velocity: f64,
        axis: Axis,
    ) -> Result<(), MotionError> {
        self.record(format!("force:{}:{}:{}:{}", axis, distance_mm, force_n, velocity))
            .await
    }

    async fn assert_drive_pos(&self) -> Result<(), MotionError> {
        self.record("drive_pos".to_string()).await
    }

    async fn reference(&self) -> Result<(), MotionError> {
        self.record("reference".to_string()).await
    }
}

// ========== 电池 ==========

#[derive(Debug)]
struct BatteryInner {
    soc: u8,
    base_min: u8,
    base_max: u8,
    min_threshold: u8,
    max_threshold: u8,
    charging: bool,
    fault: bool,
}

/// 可脚本化电池：阈值谓词与真件同构，电量由测试 / 演示方拨动
pub struct MockBattery {
    inner: Mutex<BatteryInner>,
}

impl MockBattery {
    /// 默认阈值：低于等于 40 需要充电，高于 90 算充满
    pub fn new(soc: u8) -> Self {
        Self::with_thresholds(soc, 40, 90)
    }

    pub fn with_thresholds(soc: u8, min: u8, max: u8) -> Self {
        Self {
            inner: Mutex::new(BatteryInner {
                soc,
                base_min: min,
                base_max: max,
                min_threshold: min,
                max_threshold: max,
                charging: false,
                fault: false,
            }),
        }
    }

    pub fn set_soc(&self, soc: u8) {
        locked(&self.inner).soc = soc.min(100);
    }

    pub fn set_fault(&self, fault: bool) {
        locked(&self.inner).fault = fault;
    }

    pub fn is_charging(&self) -> bool {
        locked(&self.inner).charging
    }

    /// 演示程序按拍拨动电量：充电中上升，否则缓慢下降
    pub fn tick(&self, delta: u8) {
        let mut inner = locked(&self.inner);
        if inner.charging {
            inner.soc = (inner.soc + delta).min(100);
        } else {
            inner.soc = inner.soc.saturating_sub(delta);
        }
    }

    pub fn thresholds(&self) -> (u8, u8) {
        let inner = locked(&self.inner);
        (inner.min_threshold, inner.max_threshold)
    }
}

#[async_trait]
impl BatteryManager for MockBattery {
    async fn state_of_charge(&self) -> u8 {
        locked(&self.inner).soc
    }

    async fn charging_needed(&self) -> bool {
        let inner = locked(&self.inner);
        inner.soc <= inner.min_threshold
    }

    async fn charging_done(&self) -> bool {
        let inner = locked(&self.inner);
        inner.soc > inner.max_threshold
    }

    async fn charging_fault(&self) -> bool {
        locked(&self.inner).fault
    }

    async fn start_charging(&self) -> Result<(), CoordError> {
        locked(&self.inner).charging = true;
        Ok(())
    }

    async fn stop_charging(&self) -> Result<(), CoordError> {
        locked(&self.inner).charging = false;
        Ok(())
    }

    async fn refresh_thresholds(&self) {
        // 阈值加 ±5 抖动，避免每轮都在同一电量点起停
        let jitter = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos()
            % 11) as i16
            - 5;
        let mut inner = locked(&self.inner);
        inner.min_threshold = (inner.base_min as i16 + jitter).clamp(1, 99) as u8;
        inner.max_threshold = (inner.base_max as i16 + jitter).clamp(1, 99) as u8;
    }

    async fn force_start_charging(&self, target_charge: u8) -> Result<bool, CoordError> {
        let mut inner = locked(&self.inner);
        if (target_charge as i16) > inner.soc as i16 + 1 {
            inner.charging = true;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn force_stop_charging(&self) -> Result<(), CoordError> {
        locked(&self.inner).charging = false;
        Ok(())
    }
}

// ========== 场景描述 ==========

/// 按剧本应答的场景描述服务
///
/// 预置应答按顺序消费，消费完后回落到固定默认应答。
pub struct MockScene {
    responses: Mutex<VecDeque<String>>,
    fallback: String,
    questions: Mutex<Vec<String>>,
}

impl MockScene {
    /// 默认一律回答 "True"
    pub fn new() -> Self {
        Self::with_fallback("True")
    }

    pub fn with_fallback(fallback: &str) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback: fallback.to_string(),
            questions: Mutex::new(Vec::new()),
        }
    }

    /// 追加一条一次性应答
    pub fn push_response(&self, response: &str) {
        locked(&self.responses).push_back(response.to_string());
    }

    /// 收到过的问题数
    pub fn question_count(&self) -> usize {
        locked(&self.questions).len()
    }
}

impl Default for MockScene {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SceneDescriber for MockScene {
    async fn describe(&self, question: &str) -> Result<String, CoordError> {
        locked(&self.questions).push(question.to_string());
        let response = locked(&self.responses)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        debug!("mock scene: '{}' -> '{}'", question, response);
        Ok(response)
    }
}

// ========== 中间件总线 ==========

/// 记录型总线：状态报文存内存，调试级日志输出 JSON
#[derive(Default)]
pub struct MockBus {
    robot_reports: Mutex<Vec<RobotStatusReport>>,
    task_reports: Mutex<Vec<TaskStatusReport>>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn robot_reports(&self) -> Vec<RobotStatusReport> {
        locked(&self.robot_reports).clone()
    }

    pub fn task_reports(&self) -> Vec<TaskStatusReport> {
        locked(&self.task_reports).clone()
    }
}

#[async_trait]
impl RobotBus for MockBus {
    async fn publish_robot_status(&self, report: &RobotStatusReport) -> Result<(), CoordError> {
        if let Ok(json) = serde_json::to_string(report) {
            debug!(topic = "robot_status", "{}", json);
        }
        locked(&self.robot_reports).push(report.clone());
        Ok(())
    }

    async fn publish_task_status(&self, report: &TaskStatusReport) -> Result<(), CoordError> {
        if let Ok(json) = serde_json::to_string(report) {
            debug!(topic = "task_status", "{}", json);
        }
        locked(&self.task_reports).push(report.clone());
        Ok(())
    }
}
