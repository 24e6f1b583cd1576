//! OpenAI 兼容上游 Provider
//!
//! - `GET {base}/models/{id}` 查询模型元数据
//! - `POST {base}/chat/completions`（`stream=true`）获取增量流

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use super::traits::{DeltaStream, UpstreamClient};
use crate::error::UpstreamError;
use crate::models::openai::{ChatCompletionRequest, ModelObject};
use crate::server_utils::safe_truncate;
use crate::stream::parsers::{OpenAiSseParser, SseItem};

/// 错误响应体截断长度
const ERROR_BODY_LIMIT: usize = 512;

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    /// 记录完整请求体
    debug_requests: bool,
}

impl OpenAiProvider {
    pub fn new(client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            debug_requests: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug_requests = debug;
        self
    }

    /// 构建完整的 API URL
    pub fn build_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl UpstreamClient for OpenAiProvider {
    async fn fetch_model(&self, model: &str) -> Result<ModelObject, UpstreamError> {
        let url = self.build_url(&format!("models/{}", model));
        tracing::debug!("[UPSTREAM] 查询模型元数据: {}", url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::with_status(
                status.as_u16(),
                safe_truncate(&body, ERROR_BODY_LIMIT),
            ));
        }

        resp.json::<ModelObject>()
            .await
            .map_err(|e| UpstreamError::new(format!("解析模型元数据失败: {}", e)))
    }

    async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<DeltaStream, UpstreamError> {
        let url = self.build_url("chat/completions");

        if self.debug_requests {
            match serde_json::to_string(request) {
                Ok(body) => tracing::debug!("[UPSTREAM] 请求体: {}", body),
                Err(e) => tracing::debug!("[UPSTREAM] 请求体序列化失败: {}", e),
            }
        }
        tracing::info!(
            "[UPSTREAM] 发起流式请求: url={} model={} messages={}",
            url,
            request.model,
            request.messages.len()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("[UPSTREAM] 请求失败: {} - {}", status, body);
            return Err(UpstreamError::with_status(
                status.as_u16(),
                safe_truncate(&body, ERROR_BODY_LIMIT),
            ));
        }

        tracing::info!("[UPSTREAM] 流式响应开始: status={}", status);

        let bytes = resp.bytes_stream();
        let stream = async_stream::stream! {
            let mut bytes = std::pin::pin!(bytes);
            let mut parser = OpenAiSseParser::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        for item in parser.process(&chunk) {
                            match item {
                                SseItem::Delta(delta) => yield Ok(delta),
                                SseItem::Done => return,
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(UpstreamError::from(e));
                        return;
                    }
                }
            }
            for item in parser.finish() {
                if let SseItem::Delta(delta) = item {
                    yield Ok(delta);
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
