//! 外部协作方接口
//!
//! 核心之外的一切都在这里收口成 trait：运动执行、电池 / 充电硬件、
//! 场景描述服务、机器人中间件总线、宿主应用运动状态。核心只规定
//! 自己发出的调用和期望拿回的数据，不关心对面的实现。
//!
//! `mock` 模块提供全套可脚本化的模拟实现，测试与演示程序共用。

pub mod app;
pub mod arm;
pub mod battery;
pub mod bus;
pub mod mock;
pub mod scene;

pub use app::AppStateMonitor;
pub use arm::{ArmCommander, Axis, CollisionPolicy, MotionError};
pub use battery::BatteryManager;
pub use bus::{CommandMsg, CommandQueue, RobotBus, RobotStatusReport, TaskStatusReport};
pub use mock::{MockArm, MockBattery, MockBus, MockScene};
pub use scene::SceneDescriber;
