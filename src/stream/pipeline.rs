//! 请求级流处理管道
//!
//! 把上游增量流驱动过 `StreamTranslator`，渲染为 SSE 帧写入响应通道：
//!
//! ```text
//! DeltaStream ──> [StreamTranslator] ──> StreamEvent ──> [anthropic_sse] ──> mpsc ──> HTTP body
//! ```
//!
//! 通道是有界的，写入会等待客户端消费。客户端断开后接收端被丢弃，
//! 管道取消 `CancellationToken` 并停止消费上游，上游连接随之关闭。

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::models::anthropic::OutputMode;
use crate::output::{FileMaterializer, FileSegmenter};
use crate::providers::DeltaStream;
use crate::stream::events::StreamEvent;
use crate::stream::generators::anthropic_sse;
use crate::stream::state::StreamTranslator;

/// SSE 帧发送端；`Err` 会中止响应体
pub type SseSender = mpsc::Sender<Result<String, GatewayError>>;

/// SSE 通道容量
pub const SSE_CHANNEL_CAPACITY: usize = 64;

/// 单个请求的流处理管道
pub struct StreamPipeline {
    translator: StreamTranslator,
    segmenter: Arc<dyn FileSegmenter>,
    materializer: Arc<FileMaterializer>,
}

impl StreamPipeline {
    pub fn new(
        translator: StreamTranslator,
        segmenter: Arc<dyn FileSegmenter>,
        materializer: Arc<FileMaterializer>,
    ) -> Self {
        Self {
            translator,
            segmenter,
            materializer,
        }
    }

    /// 消费上游流直到结束、出错或客户端断开
    ///
    /// - 上游出错：向通道写入错误（响应体异常终止，没有 `message_stop`），返回该错误
    /// - 客户端断开：返回 `StreamWrite`，上游流在返回时被丢弃
    pub async fn run(
        mut self,
        upstream: DeltaStream,
        tx: SseSender,
        cancel: CancellationToken,
    ) -> Result<(), GatewayError> {
        let mut upstream = upstream;

        let events = self.translator.start();
        send_events(&tx, &cancel, events).await?;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("[PIPELINE] 请求已取消，停止读取上游");
                    return Err(GatewayError::StreamWrite("request cancelled".to_string()));
                }
                _ = tx.closed() => {
                    tracing::info!("[PIPELINE] 客户端已断开，停止读取上游");
                    cancel.cancel();
                    return Err(GatewayError::StreamWrite("client disconnected".to_string()));
                }
                item = upstream.next() => item,
            };

            match item {
                Some(Ok(delta)) => {
                    let events = self.translator.on_delta(&delta);
                    send_events(&tx, &cancel, events).await?;
                }
                Some(Err(e)) => {
                    tracing::error!("[PIPELINE] 上游流中断: {}", e);
                    let error = GatewayError::Upstream(e);
                    let _ = tx.send(Err(error.clone())).await;
                    return Err(error);
                }
                None => break,
            }
        }
        drop(upstream);

        let files = match self.translator.mode() {
            OutputMode::File => Some(self.materialize().await),
            OutputMode::Stream => None,
        };

        let events = self.translator.finish(files);
        send_events(&tx, &cancel, events).await?;

        tracing::debug!(
            "[PIPELINE] 流结束: blocks={}, output_tokens={}",
            self.translator.blocks().len(),
            self.translator.output_tokens()
        );
        Ok(())
    }

    /// 切分累积文本并写入文件，返回写入的相对路径
    async fn materialize(&self) -> Vec<String> {
        let text = self.translator.full_text().to_string();
        let segmenter = self.segmenter.clone();
        let materializer = self.materializer.clone();

        tokio::task::spawn_blocking(move || {
            let segments = segmenter.segment(&text);
            materializer.write_all(&segments)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::error!("[OUTPUT] 文件写入任务失败: {}", e);
            Vec::new()
        })
    }
}

async fn send_events(
    tx: &SseSender,
    cancel: &CancellationToken,
    events: Vec<StreamEvent>,
) -> Result<(), GatewayError> {
    for event in events {
        if tx.send(Ok(anthropic_sse::generate(&event))).await.is_err() {
            cancel.cancel();
            return Err(GatewayError::StreamWrite(format!(
                "client disconnected before {}",
                event.event_name()
            )));
        }
    }
    Ok(())
}
