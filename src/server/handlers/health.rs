//! 健康检查与模型列表

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::capability::family_limit;
use crate::server::AppState;

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// GET /v1/models
///
/// 已解析过的模型返回缓存的上限，否则返回家族表中的上限。
pub async fn models(State(state): State<AppState>) -> impl IntoResponse {
    let mut ids = state.policy.allowed_models.clone();
    if !ids.contains(&state.policy.default_model) {
        ids.insert(0, state.policy.default_model.clone());
    }

    let data: Vec<_> = ids
        .iter()
        .map(|id| {
            let limit = state
                .resolver
                .cached(id)
                .map(|profile| profile.max_completion_tokens)
                .unwrap_or_else(|| family_limit(id));
            json!({
                "id": id,
                "object": "model",
                "owned_by": "openai",
                "max_completion_tokens": limit,
                "default": *id == state.policy.default_model,
            })
        })
        .collect();

    Json(json!({
        "object": "list",
        "data": data
    }))
}
