//! Waldo - 移动机械臂协同核心
//!
//! 一台机器人，两套独立控制器（机械臂侧与移动底盘侧），谁都不许
//! 卡住对方的控制循环。本 crate 提供让这件事成立的三块硬骨头：
//!
//! - **net**: 异步非阻塞的作业消息通道（自定义二进制帧、按值匹配
//!   出队的入站队列、客户端 / 服务端两种角色）
//! - **core**: 协作式状态机调度——运行状态门仲裁谁当前拥有机械臂，
//!   容量为一的任务槽，决策 / 动作分离的状态机引擎，单轮询监管器
//! - **processes**: 四个具体进程（自动充电、自动标定、外部任务
//!   纳入、任务执行）
//! - **recovery**: 有界重试 + 人工干预升级的恢复控制器
//! - **exec**: 按指令种类分发的任务执行器与工作流缝
//! - **interfaces**: 运动 / 电池 / 场景描述 / 中间件总线等外部
//!   协作方的 trait 边界与模拟实现
//! - **config**: 文件 + 环境变量的配置装载

pub mod config;
pub mod core;
pub mod exec;
pub mod interfaces;
pub mod net;
pub mod processes;
pub mod recovery;

pub use self::config::{load_config, AppConfig};
pub use self::core::{CoordError, OpGate, OpState, Supervisor, TaskMonitor};
pub use self::net::{JobChannel, JobMsg, JobPort};
