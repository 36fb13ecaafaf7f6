//! 自动充电进程
//!
//! 电量跌破阈值后：占门 → 请底盘去充电桩 → 收到就位应答后接通充电
//! → 等一段稳定时间再通知对端已开始 → 充到阈值以上收尾：断电、刷新
//! 阈值、请底盘驶离 → 收到应答后还门。
//!
//! 充电装置带病运转没有自动恢复路径：进程落入终态 CHARGE_FAULT，
//! 由监管器作为致命错误上抛。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::core::gate::{AutoFunctionSwitches, OpGate, OpState};
use crate::core::process::{update_state_machine, StateMachineProcess};
use crate::interfaces::battery::BatteryManager;
use crate::net::channel::JobPort;
use crate::net::message::{tags, JobMsg};

/// 自动充电参数
#[derive(Debug, Clone)]
pub struct ChargingConfig {
    /// 接通充电后等电流稳定的时间
    pub settle_delay: Duration,
    /// 每个应答等待阶段的超时
    pub ack_timeout: Duration,
}

impl Default for ChargingConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    CheckingForCharging,
    PrepCharging,
    ReadyToCharge,
    Charging,
    PostCharge,
    /// 终态：充电装置故障，等待人工诊断
    ChargeFault,
}

impl State {
    fn name(self) -> &'static str {
        match self {
            State::CheckingForCharging => "CHECKING_FOR_CHARGING",
            State::PrepCharging => "PREP_CHARGING",
            State::ReadyToCharge => "READY_TO_CHARGE",
            State::Charging => "CHARGING",
            State::PostCharge => "POST_CHARGE",
            State::ChargeFault => "CHARGE_FAULT",
        }
    }
}

pub struct AutoChargingProcess {
    port: Arc<dyn JobPort>,
    battery: Arc<dyn BatteryManager>,
    gate: Arc<OpGate>,
    switches: Arc<AutoFunctionSwitches>,
    cfg: ChargingConfig,
    state: State,
    /// 进入应答等待态的时刻，超时判定用
    waiting_since: Option<Instant>,
}

impl AutoChargingProcess {
    pub fn new(
        port: Arc<dyn JobPort>,
        battery: Arc<dyn BatteryManager>,
        gate: Arc<OpGate>,
        switches: Arc<AutoFunctionSwitches>,
        cfg: ChargingConfig,
    ) -> Self {
        Self {
            port,
            battery,
            gate,
            switches,
            cfg,
            state: State::CheckingForCharging,
            waiting_since: None,
        }
    }

    /// 充电装置是否已确认故障（监管器据此停机）
    pub fn is_faulted(&self) -> bool {
        self.state == State::ChargeFault
    }

    fn ack_timed_out(&self) -> bool {
        self.waiting_since
            .map(|since| since.elapsed() >= self.cfg.ack_timeout)
            .unwrap_or(false)
    }

    fn enter_waiting(&mut self, next: State) {
        self.waiting_since = Some(Instant::now());
        self.state = next;
    }

    /// 放弃当前阶段：还门、退回检查态
    fn abort_phase(&mut self, phase: &'static str) {
        warn!(
            "charging ack '{}' not received within {:?}, aborting phase",
            phase, self.cfg.ack_timeout
        );
        self.waiting_since = None;
        self.gate.set(OpState::Idle);
        self.state = State::CheckingForCharging;
    }

    async fn send(&self, msg: JobMsg) {
        // 发送失败不在这里重试：应答等不到，超时路径会收拾现场
        if let Err(e) = self.port.send(&msg).await {
            error!("charging process failed to send {}: {}", msg, e);
        }
    }
}

#[async_trait]
impl StateMachineProcess for AutoChargingProcess {
    fn name(&self) -> &'static str {
        "auto_charging"
    }

    fn current_state(&self) -> &'static str {
        self.state.name()
    }

    async fn evaluate_transitions(&mut self) -> bool {
        match self.state {
            State::CheckingForCharging => {
                if self.switches.allow_charging()
                    && self.battery.charging_needed().await
                    && self.gate.compare_and_set(OpState::Idle, OpState::Charging)
                {
                    self.enter_waiting(State::PrepCharging);
                    return true;
                }
                false
            }
            State::PrepCharging => {
                if self.port.inbound().take(&JobMsg::ack(tags::GOTO_CHARGE)) {
                    self.enter_waiting(State::ReadyToCharge);
                    return true;
                }
                if self.ack_timed_out() {
                    self.abort_phase(tags::GOTO_CHARGE);
                    return true;
                }
                false
            }
            State::ReadyToCharge => {
                if self.port.inbound().take(&JobMsg::ack(tags::STARTED_CHARGING)) {
                    self.waiting_since = None;
                    self.state = State::Charging;
                    return true;
                }
                if self.ack_timed_out() {
                    // 充电可能已经接通，先断开再放弃
                    if let Err(e) = self.battery.stop_charging().await {
                        error!("failed to stop charging during abort: {}", e);
                    }
                    self.abort_phase(tags::STARTED_CHARGING);
                    return true;
                }
                false
            }
            State::Charging => {
                if self.battery.charging_fault().await {
                    error!("charging process is not working, latching fault state");
                    self.state = State::ChargeFault;
                    return true;
                }
                if self.battery.charging_done().await {
                    self.enter_waiting(State::PostCharge);
                    return true;
                }
                false
            }
            State::PostCharge => {
                if self.port.inbound().take(&JobMsg::ack(tags::DONE_CHARGING)) {
                    self.waiting_since = None;
                    self.gate.set(OpState::Idle);
                    self.state = State::CheckingForCharging;
                    return true;
                }
                if self.ack_timed_out() {
                    self.abort_phase(tags::DONE_CHARGING);
                    return true;
                }
                false
            }
            State::ChargeFault => false,
        }
    }

    async fn run_state_action(&mut self) {
        match self.state {
            State::PrepCharging => {
                self.send(JobMsg::request(tags::GOTO_CHARGE)).await;
            }
            State::ReadyToCharge => {
                if let Err(e) = self.battery.start_charging().await {
                    error!("failed to start charging: {}", e);
                    return;
                }
                info!("robot started charging, settling for {:?}", self.cfg.settle_delay);
                tokio::time::sleep(self.cfg.settle_delay).await;
                // 稳定期占掉了等待时间，超时计时从通知发出后重新起算
                self.waiting_since = Some(Instant::now());
                self.send(JobMsg::request(tags::STARTED_CHARGING)).await;
            }
            State::PostCharge => {
                if let Err(e) = self.battery.stop_charging().await {
                    error!("failed to stop charging: {}", e);
                }
                self.battery.refresh_thresholds().await;
                self.send(JobMsg::request(tags::DONE_CHARGING)).await;
            }
            State::CheckingForCharging | State::Charging | State::ChargeFault => {}
        }
    }

    async fn execute(&mut self) {
        let gate = self.gate.current();
        if gate == OpState::Idle || gate == OpState::Charging {
            update_state_machine(self).await;
        }
    }
}
