//! 协议转换器 Trait 定义
//!
//! `RequestTranslator` 把客户端协议的请求转换为上游协议的请求。

use thiserror::Error;

use crate::error::GatewayError;

/// 请求转换器 Trait
///
/// # 类型参数
///
/// - `Input`: 客户端请求类型（如 `AnthropicMessagesRequest`）
/// - `Output`: 转换结果（如上游请求加告警）
/// - `Error`: 转换错误类型
pub trait RequestTranslator {
    type Input;
    type Output;
    type Error: std::error::Error + Send + Sync + 'static;

    fn translate_request(&self, request: Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 转换错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslateError {
    #[error("messages 不能为空")]
    EmptyMessages,
}

impl From<TranslateError> for GatewayError {
    fn from(err: TranslateError) -> Self {
        GatewayError::TranslationValidation(err.to_string())
    }
}
