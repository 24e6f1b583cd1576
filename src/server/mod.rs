//! HTTP 服务器
//!
//! - `POST /v1/messages`: Anthropic Messages → OpenAI 流式转换
//! - `GET /health`: 健康检查
//! - `GET /v1/models`: 允许的模型及其生成上限

pub mod handlers;


use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::capability::CapabilityResolver;
use crate::config::Config;
use crate::error::GatewayError;
use crate::output::{FileMaterializer, FileSegmenter, HeuristicSegmenter};
use crate::providers::UpstreamClient;
use crate::resilience::{CircuitBreaker, ResilientInvoker, RetryConfig};
use crate::server_utils::build_error_response;
use crate::translator::ModelPolicy;

/// 请求体大小上限
pub const MAX_BODY_SIZE: usize = 32 * 1024 * 1024;

/// 应用状态
///
/// 启动时构建一次，之后只读；熔断器与能力缓存在请求间共享。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<CapabilityResolver>,
    pub invoker: Arc<ResilientInvoker>,
    pub policy: Arc<ModelPolicy>,
    pub segmenter: Arc<dyn FileSegmenter>,
    pub materializer: Arc<FileMaterializer>,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        upstream: Arc<dyn UpstreamClient>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let policy = ModelPolicy::new(
            config.models.allowed_models.clone(),
            config.models.default_model.clone(),
        );
        Self {
            resolver: Arc::new(CapabilityResolver::new(upstream.clone())),
            invoker: Arc::new(ResilientInvoker::new(
                upstream,
                breaker,
                RetryConfig::default(),
            )),
            policy: Arc::new(policy),
            segmenter: Arc::new(HeuristicSegmenter),
            materializer: Arc::new(FileMaterializer::new(config.output_base_dir())),
            config,
        }
    }

    /// 替换文件切分策略
    pub fn with_segmenter(mut self, segmenter: Arc<dyn FileSegmenter>) -> Self {
        self.segmenter = segmenter;
        self
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/v1/models", get(handlers::models))
        .route("/v1/messages", post(handlers::messages))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(middleware::map_response(body_limit_as_json))
        .with_state(state)
}

/// 请求体超限时 tower-http 返回纯文本 413，改写为统一的 JSON 错误
async fn body_limit_as_json(response: Response) -> Response {
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    let error = GatewayError::TranslationValidation(format!(
        "请求体超过 {} MiB 上限",
        MAX_BODY_SIZE / (1024 * 1024)
    ));
    tracing::warn!("[SERVER] {}", error);
    build_error_response(&error)
}

/// 启动服务器，Ctrl-C 时优雅退出
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("[SERVER] 监听 {}", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("[SERVER] 已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[SERVER] 监听退出信号失败: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SERVER] 收到退出信号，正在关闭");
}
