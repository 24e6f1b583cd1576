//! 测试用上游实现
//!
//! 按脚本依次返回流或错误，记录收到的请求。

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::traits::{DeltaStream, UpstreamClient};
use crate::error::UpstreamError;
use crate::models::openai::{ChatCompletionRequest, ModelObject};
use crate::stream::events::UpstreamDelta;

enum Script {
    Stream(Vec<Result<UpstreamDelta, UpstreamError>>),
    /// 输出若干增量后挂起，直到流被丢弃
    Hanging(Vec<UpstreamDelta>, Arc<AtomicBool>),
    Error(UpstreamError),
}

#[derive(Default)]
pub struct MockUpstream {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    stream_calls: AtomicU32,
    metadata_calls: AtomicU32,
    metadata_fails: bool,
}

impl MockUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_metadata() -> Self {
        Self {
            metadata_fails: true,
            ..Default::default()
        }
    }

    pub fn push_stream(&self, deltas: Vec<UpstreamDelta>) -> &Self {
        self.scripts
            .lock()
            .push_back(Script::Stream(deltas.into_iter().map(Ok).collect()));
        self
    }

    pub fn push_stream_items(&self, items: Vec<Result<UpstreamDelta, UpstreamError>>) -> &Self {
        self.scripts.lock().push_back(Script::Stream(items));
        self
    }

    /// 返回的标志在流被丢弃时置为 true
    pub fn push_hanging_stream(&self, deltas: Vec<UpstreamDelta>) -> Arc<AtomicBool> {
        let dropped = Arc::new(AtomicBool::new(false));
        self.scripts
            .lock()
            .push_back(Script::Hanging(deltas, dropped.clone()));
        dropped
    }

    pub fn push_error(&self, error: UpstreamError) -> &Self {
        self.scripts.lock().push_back(Script::Error(error));
        self
    }

    pub fn stream_calls(&self) -> u32 {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> u32 {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ChatCompletionRequest> {
        self.requests.lock().last().cloned()
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn fetch_model(&self, model: &str) -> Result<ModelObject, UpstreamError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if self.metadata_fails {
            return Err(UpstreamError::with_status(404, "model not found"));
        }
        Ok(ModelObject {
            id: model.to_string(),
            owned_by: Some("mock".to_string()),
            created: None,
        })
    }

    async fn stream_chat(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<DeltaStream, UpstreamError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let script = self.scripts.lock().pop_front();
        match script {
            Some(Script::Stream(items)) => Ok(Box::pin(futures::stream::iter(items))),
            Some(Script::Hanging(deltas, dropped)) => {
                let flag = DropFlag(dropped);
                Ok(Box::pin(async_stream::stream! {
                    let _flag = flag;
                    for delta in deltas {
                        yield Ok::<_, UpstreamError>(delta);
                    }
                    futures::future::pending::<()>().await;
                }))
            }
            Some(Script::Error(error)) => Err(error),
            None => Err(UpstreamError::new("no scripted response")),
        }
    }
}
