//! POST /v1/messages
//!
//! 1. 解析请求体
//! 2. 校验请求，选择模型并解析模型能力
//! 3. 转换为上游请求
//! 4. 通过调用器建立上游流（重试 + 熔断）
//! 5. 启动流处理管道，以 SSE 返回
//!
//! 1-4 任一步失败都返回 400 JSON；流开始后的上游错误直接中止响应体。

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::models::anthropic::AnthropicMessagesRequest;
use crate::server::AppState;
use crate::server_utils::{build_error_response, build_sse_response};
use crate::stream::{StreamPipeline, StreamTranslator, SSE_CHANNEL_CAPACITY};
use crate::translator::{validate_request, MessagesTranslator, RequestTranslator};

pub async fn messages(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4().simple().to_string()[..8].to_string();

    let request: AnthropicMessagesRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = GatewayError::TranslationValidation(format!("无效的请求体: {}", e));
            tracing::warn!("[MESSAGES] [{}] {}", request_id, error);
            return build_error_response(&error);
        }
    };

    let requested_model = request.model.clone().unwrap_or_default();
    match start_stream(&state, request, &request_id).await {
        Ok(response) => response,
        Err(error) => {
            error.log_with_context(&request_id, &requested_model);
            build_error_response(&error)
        }
    }
}

async fn start_stream(
    state: &AppState,
    request: AnthropicMessagesRequest,
    request_id: &str,
) -> Result<Response, GatewayError> {
    validate_request(&request)?;

    let mode = request.output_mode;
    let selection = state.policy.select(request.model.as_deref());
    let profile = state.resolver.resolve(&selection.model).await;

    let translation =
        MessagesTranslator::new(&state.policy, profile).translate_request(request)?;
    let model = translation.request.model.clone();

    tracing::info!(
        "[MESSAGES] [{}] model={} mode={:?} messages={} warnings={}",
        request_id,
        model,
        mode,
        translation.request.messages.len(),
        translation.warnings.len()
    );

    let upstream = state.invoker.invoke_streaming(&translation.request).await?;

    let translator = StreamTranslator::new(model, mode, state.config.output.fallback);
    let pipeline = StreamPipeline::new(
        translator,
        state.segmenter.clone(),
        state.materializer.clone(),
    );

    let (tx, mut rx) = mpsc::channel(SSE_CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let task_id = request_id.to_string();
    tokio::spawn(async move {
        match pipeline.run(upstream, tx, cancel).await {
            Ok(()) => tracing::info!("[MESSAGES] [{}] 流式响应完成", task_id),
            Err(GatewayError::StreamWrite(reason)) => {
                tracing::info!("[MESSAGES] [{}] 客户端断开: {}", task_id, reason)
            }
            Err(e) => tracing::error!("[MESSAGES] [{}] 流式响应中断: {}", task_id, e),
        }
    });

    let body = async_stream::stream! {
        while let Some(item) = rx.recv().await {
            yield item.map(Bytes::from);
        }
    };

    Ok(build_sse_response(Body::from_stream(body)))
}
