//! 模型能力解析
//!
//! 为模型名返回生成上限（`max_completion_tokens`），结果在进程生命周期内缓存。
//! 上限来自按最长前缀匹配的静态家族表；上游元数据查询只用于确认模型存在，
//! 查询失败时退回默认值，默认值同样缓存。

use dashmap::DashMap;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::providers::UpstreamClient;

/// 未知模型或查询失败时的默认上限
pub const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 16_384;

/// 模型家族上限表（前缀 → 上限）
///
/// 匹配时取最长前缀，与声明顺序无关。
pub const FAMILY_LIMITS: &[(&str, u32)] = &[
    // 推理模型
    ("o1", 100_000),
    ("o1-mini", 65_536),
    ("o1-preview", 32_768),
    ("o3", 100_000),
    ("o3-mini", 100_000),
    ("o4-mini", 100_000),
    ("gpt-5", 100_000),
    // 紧凑模型
    ("gpt-4o", 16_384),
    ("gpt-4o-mini", 16_384),
    ("gpt-4.1", 16_384),
    // 旧版对话模型
    ("gpt-4", 4_096),
    ("gpt-4-turbo", 4_096),
    ("gpt-3.5-turbo", 4_096),
];

/// 模型能力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityProfile {
    pub max_completion_tokens: u32,
}

impl Default for CapabilityProfile {
    fn default() -> Self {
        Self {
            max_completion_tokens: DEFAULT_MAX_COMPLETION_TOKENS,
        }
    }
}

/// 按最长前缀查表
pub fn family_limit(model: &str) -> u32 {
    FAMILY_LIMITS
        .iter()
        .filter(|(prefix, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_MAX_COMPLETION_TOKENS)
}

/// 模型能力解析器
pub struct CapabilityResolver {
    upstream: Arc<dyn UpstreamClient>,
    cache: DashMap<String, CapabilityProfile>,
}

impl CapabilityResolver {
    pub fn new(upstream: Arc<dyn UpstreamClient>) -> Self {
        Self {
            upstream,
            cache: DashMap::new(),
        }
    }

    /// 解析模型能力，失败时返回默认值
    pub async fn resolve(&self, model: &str) -> CapabilityProfile {
        if let Some(profile) = self.cache.get(model) {
            return *profile;
        }

        match self.lookup(model).await {
            Ok(profile) => {
                self.cache.insert(model.to_string(), profile);
                tracing::debug!(
                    "[CAPABILITY] {} max_completion_tokens={}",
                    model,
                    profile.max_completion_tokens
                );
                profile
            }
            Err(e) => {
                tracing::warn!("[CAPABILITY] {}，使用默认上限", e);
                let profile = CapabilityProfile::default();
                self.cache.insert(model.to_string(), profile);
                profile
            }
        }
    }

    /// 已缓存的模型能力
    pub fn cached(&self, model: &str) -> Option<CapabilityProfile> {
        self.cache.get(model).map(|p| *p)
    }

    async fn lookup(&self, model: &str) -> Result<CapabilityProfile, GatewayError> {
        let metadata = self.upstream.fetch_model(model).await.map_err(|e| {
            GatewayError::CapabilityResolution {
                model: model.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(CapabilityProfile {
            max_completion_tokens: family_limit(&metadata.id),
        })
    }
}
