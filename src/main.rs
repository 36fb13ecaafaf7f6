//! Waldo 演示入口
//!
//! 在一个进程里把两侧都跑起来：底盘侧起一个作业通道服务端加应答
//! 循环，机械臂侧用模拟协作方装配监管器，通过回环 TCP 互发作业
//! 消息。Ctrl+C 触发协作式停机。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waldo::config::load_config;
use waldo::core::gate::{AutoFunctionSwitches, OpGate, OpState};
use waldo::core::error::CoordError;
use waldo::core::supervisor::Supervisor;
use waldo::core::task::TaskMonitor;
use waldo::exec::{TaskExecutor, WorkflowHandler};
use waldo::interfaces::app::AppStateMonitor;
use waldo::interfaces::arm::ArmCommander;
use waldo::interfaces::battery::BatteryManager;
use waldo::interfaces::bus::{CommandMsg, CommandQueue, RobotBus};
use waldo::interfaces::mock::{MockArm, MockBattery, MockBus, MockScene};
use waldo::interfaces::scene::SceneDescriber;
use waldo::net::channel::{JobChannel, JobPort};
use waldo::net::message::{tags, JobMsg, CODE_REQUEST};
use waldo::processes::{
    AutoCalibrationProcess, AutoChargingProcess, CommandIntakeProcess, TaskExecutionProcess,
};
use waldo::recovery::{Rack, RecoveryController, RecoveryOutcome, Station};

/// 演示用工作流：执行前对料架跑一轮巡检
struct InspectionWorkflow {
    recovery: RecoveryController,
}

#[async_trait]
impl WorkflowHandler for InspectionWorkflow {
    async fn run(&self, name: &str, parameters: &[String]) -> Result<(), CoordError> {
        info!("workflow '{}' ({:?}) starting with rack inspection", name, parameters);
        let outcome = self
            .recovery
            .run_inspection(
                "Is the rack seated correctly in its slot?",
                Rack::ChemRack,
                Station::Base,
            )
            .await?;
        match outcome {
            RecoveryOutcome::Resolved => Ok(()),
            other => Err(CoordError::Scene(format!("inspection ended {:?}", other))),
        }
    }
}

/// 底盘侧应答循环：收到请求就回对应的确认
async fn base_responder(port: Arc<JobChannel>, cancel: CancellationToken) {
    let inbound = port.inbound();
    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        while let Some(msg) = inbound.pop() {
            let reply = match (msg.tag(), msg.code()) {
                (tags::GOTO_CHARGE, CODE_REQUEST) => Some(JobMsg::ack(tags::GOTO_CHARGE)),
                (tags::STARTED_CHARGING, CODE_REQUEST) => Some(JobMsg::ack(tags::STARTED_CHARGING)),
                (tags::DONE_CHARGING, CODE_REQUEST) => Some(JobMsg::ack(tags::DONE_CHARGING)),
                (tags::GOTO_CALIBRATE, CODE_REQUEST) => Some(JobMsg::ack(tags::GOTO_CALIBRATE)),
                (tags::NEED_TO_RESUME, CODE_REQUEST) => {
                    Some(JobMsg::new(tags::APP_RESUMED, CODE_REQUEST))
                }
                // done_calibrating 是单向通知
                _ => None,
            };
            if let Some(reply) = reply {
                info!("base: {} -> {}", msg, reply);
                if let Err(e) = port.send(&reply).await {
                    warn!("base failed to reply: {}", e);
                    return;
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).context("failed to load configuration")?;

    // 底盘侧：服务端通道 + 应答循环
    let server = Arc::new(
        JobChannel::listen("127.0.0.1:0", cfg.channel.to_options())
            .await
            .context("failed to bind base-side channel")?,
    );
    let addr = server
        .local_addr()
        .context("base-side channel has no local address")?;

    let cancel = CancellationToken::new();
    let base_task = tokio::spawn(base_responder(Arc::clone(&server), cancel.clone()));

    // 机械臂侧：客户端通道 + 模拟协作方
    let client = Arc::new(
        JobChannel::connect(&addr.to_string(), cfg.channel.to_options())
            .await
            .context("failed to connect arm-side channel")?,
    );

    let arm = Arc::new(MockArm::new().with_latency(Duration::from_millis(50)));
    let battery = Arc::new(MockBattery::new(35));
    let bus = Arc::new(MockBus::new());
    let scene = Arc::new(MockScene::new());

    let gate = Arc::new(OpGate::new());
    let monitor = Arc::new(TaskMonitor::new());
    let switches = Arc::new(AutoFunctionSwitches::new());
    let commands = Arc::new(CommandQueue::new());
    let app = Arc::new(AppStateMonitor::new());

    let recovery = RecoveryController::new(
        Arc::clone(&arm) as Arc<dyn ArmCommander>,
        Arc::clone(&scene) as Arc<dyn SceneDescriber>,
        cfg.recovery.to_config(),
        cancel.clone(),
    );
    let executor = Arc::new(TaskExecutor::new(
        Arc::clone(&arm) as Arc<dyn ArmCommander>,
        Arc::clone(&battery) as Arc<dyn BatteryManager>,
        Arc::clone(&switches),
        Arc::new(InspectionWorkflow { recovery }),
    ));

    let charging = AutoChargingProcess::new(
        Arc::clone(&client) as Arc<dyn JobPort>,
        Arc::clone(&battery) as Arc<dyn BatteryManager>,
        Arc::clone(&gate),
        Arc::clone(&switches),
        cfg.charging.to_config(),
    );
    let calibration = AutoCalibrationProcess::new(
        Arc::clone(&client) as Arc<dyn JobPort>,
        Arc::clone(&monitor),
        Arc::clone(&gate),
        Arc::clone(&switches),
        cfg.calibration.to_config(),
    );
    let intake = CommandIntakeProcess::new(
        Arc::clone(&commands),
        Arc::clone(&monitor),
        Arc::clone(&gate),
    );
    let execution = TaskExecutionProcess::new(
        executor,
        Arc::clone(&client) as Arc<dyn JobPort>,
        Arc::clone(&app),
        Arc::clone(&monitor),
        Arc::clone(&gate),
        cfg.execution.resume_resend(),
    );

    let mut supervisor = Supervisor::new(
        charging,
        calibration,
        intake,
        execution,
        Arc::clone(&gate),
        Arc::clone(&monitor),
        Arc::clone(&battery) as Arc<dyn BatteryManager>,
        Arc::clone(&bus) as Arc<dyn RobotBus>,
        Arc::clone(&client) as Arc<dyn JobPort>,
        cfg.supervisor.to_config(),
    );

    // 启动完成，放行状态门
    gate.set(OpState::Idle);
    info!("loopback demo wired on {}, press Ctrl+C to stop", addr);

    // 电池按拍拨动：充电中上升，否则缓慢耗电
    {
        let battery = Arc::clone(&battery);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(2));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => battery.tick(1),
                }
            }
        });
    }

    // 几秒后模拟舰队控制器下发一条转运指令
    {
        let commands = Arc::clone(&commands);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            commands.offer(CommandMsg {
                name: "TransferRack".to_string(),
                parameters: vec!["ChemRack".to_string(), "Base".to_string()],
                priority: false,
                seq: 1,
            });
        });
    }

    let run = tokio::select! {
        result = supervisor.run(cancel.clone()) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            cancel.cancel();
            Ok(())
        }
    };

    cancel.cancel();
    let _ = base_task.await;
    client.stop().await;
    server.stop().await;

    run.context("supervisor terminated with a fatal fault")?;
    Ok(())
}
