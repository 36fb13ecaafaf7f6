//! 恢复与升级控制器
//!
//! 有界重试的巡检循环：走到检查位姿 → 问场景描述服务 → 按字面子串
//! 分类应答。可恢复故障查表执行纠正动作后重查；不可恢复故障进入
//! 限时的人工干预等待；重试次数触顶无条件放弃。
//!
//! 协作方抛错（运动失败、视觉服务不可达）视为本次巡检致命，原样
//! 上抛，不再重试。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::moves::{check_pose, recovery_move, Direction, Rack, Station};
use crate::core::error::CoordError;
use crate::interfaces::arm::{ArmCommander, Axis};
use crate::interfaces::scene::SceneDescriber;

/// 相机工具中心点
const CAMERA_TOOL: &str = "/spacer/tcp";
/// 检查 / 恢复位姿运动的相对速度
const MOVE_VELOCITY: f64 = 0.3;
/// 探压力阈值（N）与速度（mm/s）
const PROBE_FORCE_N: f64 = 7.0;
const PROBE_VELOCITY: f64 = 10.0;
/// 收尾下压的行程与力阈值
const PRESS_DISTANCE_MM: f64 = -30.0;
const PRESS_FORCE_N: f64 = 10.0;

/// 一次巡检的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// 检查通过（或人工处理后通过）
    Resolved,
    /// 自动恢复重试触顶，放弃
    RetriesExhausted,
    /// 人工干预等待超时或被取消，未解决
    Unresolved,
}

/// 恢复控制器参数
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// 自动恢复尝试上限
    pub max_retries: u32,
    /// 人工干预等待期间的巡检间隔
    pub check_interval: Duration,
    /// 人工干预等待上限
    pub human_wait: Duration,
    /// 探压动作之间的稳定停顿
    pub probe_settle: Duration,
    /// 每次纠正动作后的停顿
    pub retry_pause: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            check_interval: Duration::from_secs(60),
            human_wait: Duration::from_secs(5 * 60),
            probe_settle: Duration::from_secs(1),
            retry_pause: Duration::from_secs(2),
        }
    }
}

pub struct RecoveryController {
    arm: Arc<dyn ArmCommander>,
    scene: Arc<dyn SceneDescriber>,
    cfg: RecoveryConfig,
    cancel: CancellationToken,
}

impl RecoveryController {
    pub fn new(
        arm: Arc<dyn ArmCommander>,
        scene: Arc<dyn SceneDescriber>,
        cfg: RecoveryConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            arm,
            scene,
            cfg,
            cancel,
        }
    }

    /// 对指定工位上的料架跑一轮巡检
    ///
    /// 循环直到检查通过、重试触顶、人工等待超时或协作方出错。
    pub async fn run_inspection(
        &self,
        question: &str,
        rack: Rack,
        station: Station,
    ) -> Result<RecoveryOutcome, CoordError> {
        let pose = check_pose(station, rack);
        let mut retries: u32 = 0;

        loop {
            if retries >= self.cfg.max_retries {
                warn!("max recovery retries ({}) exceeded, aborting inspection", retries);
                return Ok(RecoveryOutcome::RetriesExhausted);
            }

            self.arm.move_ptp(&pose, CAMERA_TOOL, MOVE_VELOCITY).await?;
            let result = self.scene.describe(question).await?;
            info!("inspection result: {}", result);

            if result.contains("True") {
                info!("inspection succeeded");
                return Ok(RecoveryOutcome::Resolved);
            }

            let recoverable = result.contains("False") && result.contains("recoverable");
            if recoverable {
                if let Some(direction) = Direction::from_response(&result) {
                    if let Some(mv) = recovery_move(rack, station, direction) {
                        info!("recoverable error, correcting towards {:?}", direction);
                        self.execute_recovery(&mv.frame, mv.axis, mv.distance_mm).await?;
                        retries += 1;
                        sleep(self.cfg.retry_pause).await;
                        continue;
                    }
                    warn!(
                        "no calibrated recovery move for {:?} at {:?}, escalating",
                        rack, station
                    );
                } else {
                    warn!("response reports recoverable but names no direction, escalating");
                }
            }

            // 不可恢复（含分类不出来的应答）：升级到人工干预等待
            error!("unrecoverable error, stopping and waiting for human intervention");
            if self.wait_for_human(question).await {
                info!("issue resolved by human, resuming");
                return Ok(RecoveryOutcome::Resolved);
            }
            warn!("human intervention timeout, aborting inspection");
            return Ok(RecoveryOutcome::Unresolved);
        }
    }

    /// 纠正动作：走到恢复位姿，然后沿轴做单趟探压
    ///
    /// 探压是一去一回加一次下压，每步之间留稳定停顿。
    async fn execute_recovery(
        &self,
        frame: &str,
        axis: Axis,
        distance_mm: f64,
    ) -> Result<(), CoordError> {
        self.arm.move_ptp(frame, CAMERA_TOOL, MOVE_VELOCITY).await?;

        self.arm
            .move_lin_rel_force(distance_mm, PROBE_FORCE_N, PROBE_VELOCITY, axis)
            .await?;
        sleep(self.cfg.probe_settle).await;
        self.arm
            .move_lin_rel_force(-distance_mm, PROBE_FORCE_N, PROBE_VELOCITY, axis)
            .await?;
        sleep(self.cfg.probe_settle).await;
        self.arm
            .move_lin_rel_force(PRESS_DISTANCE_MM, PRESS_FORCE_N, PROBE_VELOCITY, Axis::Z)
            .await?;
        Ok(())
    }

    /// 限时等人：每隔一段时间重问一次，问出 "True" 即解决
    ///
    /// 等待期间场景服务出错只告警不中断；取消令牌触发按未解决返回。
    async fn wait_for_human(&self, question: &str) -> bool {
        let deadline = Instant::now() + self.cfg.human_wait;
        while Instant::now() < deadline {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    warn!("human intervention wait cancelled");
                    return false;
                }
                _ = sleep(self.cfg.check_interval) => {}
            }

            info!("performing periodic check");
            match self.scene.describe(question).await {
                Ok(result) if result.contains("True") => return true,
                Ok(result) => info!("issue still unresolved: {}", result),
                Err(e) => warn!("periodic check failed: {}", e),
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::mock::{MockArm, MockScene};

    const QUESTION: &str = "Is the rack seated correctly in its slot?";

    fn controller(
        scene: Arc<MockScene>,
        cfg: RecoveryConfig,
    ) -> (RecoveryController, Arc<MockArm>, CancellationToken) {
        let arm = Arc::new(MockArm::new());
        let cancel = CancellationToken::new();
        let ctrl = RecoveryController::new(
            Arc::clone(&arm) as Arc<dyn ArmCommander>,
            scene as Arc<dyn SceneDescriber>,
            cfg,
            cancel.clone(),
        );
        (ctrl, arm, cancel)
    }

    fn fast_cfg() -> RecoveryConfig {
        RecoveryConfig {
            max_retries: 10,
            check_interval: Duration::from_millis(10),
            human_wait: Duration::from_millis(55),
            probe_settle: Duration::ZERO,
            retry_pause: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_success_returns_immediately() {
        let scene = Arc::new(MockScene::with_fallback("True"));
        let (ctrl, arm, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Resolved);
        assert_eq!(scene.question_count(), 1);
        assert_eq!(arm.motion_count("ptp:/RobotRacks/Check_ChemRack"), 1);
    }

    #[tokio::test]
    async fn test_recoverable_retries_exactly_ten_times() {
        let scene = Arc::new(MockScene::with_fallback("False recoverable left"));
        let (ctrl, arm, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::RetriesExhausted);
        // 每次恢复前都重跑完整检查
        assert_eq!(scene.question_count(), 10);
        assert_eq!(arm.motion_count("ptp:/RobotRacks/Recover/ChemRack_left"), 10);
        // 单趟探压：一去一回一下压
        assert_eq!(arm.motion_count("force:Y"), 20);
        assert_eq!(arm.motion_count("force:Z"), 10);
    }

    #[tokio::test]
    async fn test_recovery_then_success() {
        let scene = Arc::new(MockScene::with_fallback("True"));
        scene.push_response("False recoverable right");
        let (ctrl, arm, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::PxrdRack, Station::Yumi)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Resolved);
        assert_eq!(scene.question_count(), 2);
        assert_eq!(
            arm.motion_count(
                "ptp:/YumiStation_QR/CheckPose_10/CameraFrame/MarkerFrame/Recover/PXRDRack_right"
            ),
            1
        );
    }

    #[tokio::test]
    async fn test_unrecoverable_waits_then_gives_up() {
        let scene = Arc::new(MockScene::with_fallback("False"));
        let (ctrl, _, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Unresolved);
        // 首检一次 + 等待期内约 5 次周期复查
        assert!(scene.question_count() >= 4, "got {}", scene.question_count());
        assert!(scene.question_count() <= 7, "got {}", scene.question_count());
    }

    #[tokio::test]
    async fn test_human_resolves_during_wait() {
        let scene = Arc::new(MockScene::with_fallback("True"));
        scene.push_response("False");
        scene.push_response("False");
        let (ctrl, _, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Resolved);
        // 首检不可恢复，第一次复查仍未解决，第二次复查通过
        assert_eq!(scene.question_count(), 3);
    }

    #[tokio::test]
    async fn test_unparseable_response_escalates() {
        let scene = Arc::new(MockScene::with_fallback("the rack looks fine to me"));
        let (ctrl, _, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Unresolved);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_wait_as_unresolved() {
        let scene = Arc::new(MockScene::with_fallback("False"));
        let cfg = RecoveryConfig {
            check_interval: Duration::from_secs(60),
            human_wait: Duration::from_secs(300),
            ..fast_cfg()
        };
        let (ctrl, _, cancel) = controller(Arc::clone(&scene), cfg);
        cancel.cancel();

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Unresolved);
    }

    #[tokio::test]
    async fn test_motion_failure_aborts_with_error() {
        let scene = Arc::new(MockScene::with_fallback("False recoverable left"));
        let (ctrl, arm, _) = controller(scene, fast_cfg());
        arm.set_fail(true);

        let result = ctrl
            .run_inspection(QUESTION, Rack::ChemRack, Station::Base)
            .await;
        assert!(matches!(result, Err(CoordError::Motion(_))));
    }

    #[tokio::test]
    async fn test_missing_recovery_table_entry_escalates() {
        // PXRDRack 不会有 ChemSpeed 工位的恢复位姿
        let scene = Arc::new(MockScene::with_fallback("False recoverable left"));
        let (ctrl, arm, _) = controller(Arc::clone(&scene), fast_cfg());

        let outcome = ctrl
            .run_inspection(QUESTION, Rack::PxrdRack, Station::ChemSpeedLoad)
            .await
            .unwrap();
        assert_eq!(outcome, RecoveryOutcome::Unresolved);
        assert_eq!(arm.motion_count("force:"), 0);
    }
}
