//! 网关错误类型
//!
//! 定义请求处理过程中可能发生的错误，以及它们在 HTTP 边界上的表现形式。

use thiserror::Error;

/// 上游调用错误
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamError {
    /// HTTP 状态码（传输层错误时为空）
    pub status: Option<u16>,
    /// 错误信息
    pub message: String,
}

impl UpstreamError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "上游调用失败 (HTTP {}): {}", status, self.message),
            None => write!(f, "上游调用失败: {}", self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

/// 网关错误
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    /// 熔断器打开，上游被判定为不健康
    #[error("熔断器已打开，{remaining_ms}ms 后重试上游")]
    CircuitOpen { remaining_ms: u64 },

    /// 上游传输或协议错误
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// 模型能力解析失败（只在内部使用，不会返回给客户端）
    #[error("模型能力解析失败: {model} - {message}")]
    CapabilityResolution { model: String, message: String },

    /// 请求格式错误
    #[error("请求校验失败: {0}")]
    TranslationValidation(String),

    /// 客户端断开或写入失败
    #[error("SSE 写入失败: {0}")]
    StreamWrite(String),
}

impl GatewayError {
    /// 获取对应的 HTTP 状态码
    ///
    /// 流开始之前的所有错误都以客户端错误返回。
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::StreamWrite(_) => 499,
            _ => 400,
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::CircuitOpen { .. } => "circuit_open",
            GatewayError::Upstream(_) => "upstream_error",
            GatewayError::CapabilityResolution { .. } => "capability_resolution_error",
            GatewayError::TranslationValidation(_) => "invalid_request_error",
            GatewayError::StreamWrite(_) => "stream_write_error",
        }
    }

    /// 转换为 JSON 错误响应
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "error",
            "type": self.error_type(),
            "message": self.to_string()
        })
    }

    /// 记录带上下文的错误日志
    pub fn log_with_context(&self, request_id: &str, model: &str) {
        tracing::error!(
            request_id = %request_id,
            model = %model,
            error_type = %self.error_type(),
            error_message = %self.to_string(),
            "Request processing failed"
        );
    }
}
