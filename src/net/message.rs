//! 作业消息定义
//!
//! 机械臂与底盘控制器之间交换的最小通信单元：一个字符串标签
//! 加一个整型代码。代码通常作为阶段标记使用（0 = 请求，1 = 应答）。

/// 请求阶段代码
pub const CODE_REQUEST: i32 = 0;
/// 应答阶段代码
pub const CODE_ACK: i32 = 1;

/// 协议标签词表
///
/// 入站队列按值匹配出队，收发双方必须对标签逐字一致，
/// 因此所有标签集中在此定义，不在调用点散落字面量。
pub mod tags {
    /// 请求底盘开往充电桩 / 确认已就位
    pub const GOTO_CHARGE: &str = "goto_charge";
    /// 充电已开始 / 底盘确认
    pub const STARTED_CHARGING: &str = "started_charging";
    /// 充电完成，请求驶离 / 底盘确认
    pub const DONE_CHARGING: &str = "done_charging";
    /// 请求底盘开往标定位 / 确认已就位
    pub const GOTO_CALIBRATE: &str = "goto_calibrate";
    /// 标定完成
    pub const DONE_CALIBRATING: &str = "done_calibrating";
    /// 请求宿主应用恢复运动
    pub const NEED_TO_RESUME: &str = "need_to_resume";
    /// 宿主应用已恢复
    pub const APP_RESUMED: &str = "app_resumed";
}

/// 作业消息
///
/// 相等性按值比较（tag 与 code 均相等）。消息一经发送即视为不可变，
/// 每条消息都是新构造的。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobMsg {
    tag: String,
    code: i32,
}

impl JobMsg {
    pub fn new(tag: impl Into<String>, code: i32) -> Self {
        Self {
            tag: tag.into(),
            code,
        }
    }

    /// 构造请求消息（code = 0）
    pub fn request(tag: impl Into<String>) -> Self {
        Self::new(tag, CODE_REQUEST)
    }

    /// 构造应答消息（code = 1）
    pub fn ack(tag: impl Into<String>) -> Self {
        Self::new(tag, CODE_ACK)
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn code(&self) -> i32 {
        self.code
    }
}

impl std::fmt::Display for JobMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.tag, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        let a = JobMsg::new("goto_charge", 0);
        let b = JobMsg::new("goto_charge", 0);
        let c = JobMsg::new("goto_charge", 1);
        let d = JobMsg::new("goto_calibrate", 0);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_phase_ctors() {
        assert_eq!(JobMsg::request(tags::GOTO_CHARGE), JobMsg::new("goto_charge", 0));
        assert_eq!(JobMsg::ack(tags::GOTO_CHARGE), JobMsg::new("goto_charge", 1));
    }
}
