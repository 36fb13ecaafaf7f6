//! 作业通道网络层
//!
//! 机械臂控制器与底盘控制器之间的异步消息通道：
//! - **message**: 作业消息（tag + code）与协议标签词表
//! - **codec**: 定长帧的二进制编解码
//! - **queue**: 按值匹配出队的入站消息队列
//! - **channel**: 非阻塞 TCP 通道（客户端 / 服务端角色）
//! - **mock**: 状态机测试用的记录型端口

pub mod channel;
pub mod codec;
pub mod message;
pub mod mock;
pub mod queue;

pub use channel::{ChannelOptions, JobChannel, JobPort};
pub use message::{tags, JobMsg, CODE_ACK, CODE_REQUEST};
pub use mock::MockJobPort;
pub use queue::MessageQueue;
