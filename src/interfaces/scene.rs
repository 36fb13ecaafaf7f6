//! 场景描述接口
//!
//! 请求 - 应答式的视觉问答：发一句固定措辞的自然语言问题，拿回
//! 一段文本。恢复控制器按字面子串解析应答（"True" / "False" /
//! "recoverable" 以及方向词），这是一个双方必须逐字遵守的脆约定。

use async_trait::async_trait;

use crate::core::error::CoordError;

#[async_trait]
pub trait SceneDescriber: Send + Sync {
    /// 对当前相机画面提问，返回描述文本
    async fn describe(&self, question: &str) -> Result<String, CoordError>;
}
