//! 带重试与熔断的上游调用器

use std::sync::Arc;

use super::circuit_breaker::CircuitBreaker;
use super::retry::RetryConfig;
use crate::error::GatewayError;
use crate::models::openai::ChatCompletionRequest;
use crate::providers::{DeltaStream, UpstreamClient};

/// 上游调用器
///
/// 只保护“建立流”这一步；流建立之后的错误不重试。
pub struct ResilientInvoker {
    upstream: Arc<dyn UpstreamClient>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryConfig,
}

impl ResilientInvoker {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            upstream,
            breaker,
            retry,
        }
    }

    /// 发起流式调用
    ///
    /// 1. 熔断器打开且未冷却 → `CircuitOpen`，不调用上游
    /// 2. 失败计数达到阈值 → 立即返回触发熔断的错误
    /// 3. 尝试次数耗尽 → 返回最后一次错误
    pub async fn invoke_streaming(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<DeltaStream, GatewayError> {
        self.breaker.check()?;

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.upstream.stream_chat(request).await {
                Ok(stream) => {
                    self.breaker.record_success();
                    if attempt > 1 {
                        tracing::info!("[RETRY] 第 {} 次尝试成功", attempt);
                    }
                    return Ok(stream);
                }
                Err(e) => {
                    if self.breaker.record_failure() {
                        tracing::error!(
                            "[RETRY] 第 {} 次尝试失败，熔断器已打开: {}",
                            attempt,
                            e
                        );
                        return Err(e.into());
                    }
                    if attempt >= self.retry.max_attempts {
                        tracing::error!("[RETRY] 第 {} 次尝试失败，重试次数耗尽: {}", attempt, e);
                        return Err(e.into());
                    }

                    let delay = self.retry.backoff_delay(attempt);
                    tracing::warn!(
                        "[RETRY] 第 {} 次尝试失败: {}，{}ms 后重试",
                        attempt,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
