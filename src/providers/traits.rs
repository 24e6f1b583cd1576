//! 上游 Provider Trait 定义
//!
//! 网关只通过这个接口访问上游，测试中可以替换为内存实现。

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::UpstreamError;
use crate::models::openai::{ChatCompletionRequest, ModelObject};
use crate::stream::events::UpstreamDelta;

/// 上游增量流
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<UpstreamDelta, UpstreamError>> + Send>>;

/// 上游客户端
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// 查询模型元数据
    async fn fetch_model(&self, model: &str) -> Result<ModelObject, UpstreamError>;

    /// 发起流式对话请求
    ///
    /// 建立连接失败或返回非 2xx 状态码时返回错误；流建立之后的错误
    /// 通过流中的 `Err` 项传递。
    async fn stream_chat(&self, request: &ChatCompletionRequest)
        -> Result<DeltaStream, UpstreamError>;
}
