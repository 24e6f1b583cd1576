//! OpenAI SSE 流解析器
//!
//! 把上游 `bytes_stream()` 的字节块切成 SSE 行，解析 `data:` 行中的
//! chat completion chunk，输出 `UpstreamDelta`。

use tracing::warn;

use crate::models::openai::ChatCompletionChunk;
use crate::stream::events::{ToolCallFragment, UpstreamDelta};

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum SseItem {
    Delta(UpstreamDelta),
    /// `data: [DONE]`
    Done,
}

/// OpenAI SSE 流解析器
///
/// 字节块可能在任意位置切断（包括多字节字符中间），未完成的行保留在缓冲区中。
#[derive(Debug, Default)]
pub struct OpenAiSseParser {
    buffer: Vec<u8>,
    done: bool,
}

impl OpenAiSseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否已收到 `[DONE]`
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// 处理一个字节块
    pub fn process(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(bytes);

        let mut items = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = self.parse_line(&line) {
                items.push(item);
            }
        }
        items
    }

    /// 流结束时处理缓冲区中剩余的最后一行
    pub fn finish(&mut self) -> Vec<SseItem> {
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line).into_iter().collect()
    }

    fn parse_line(&mut self, line: &[u8]) -> Option<SseItem> {
        if self.done {
            return None;
        }
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?.trim_start();

        if data.trim() == "[DONE]" {
            self.done = true;
            return Some(SseItem::Done);
        }
        if data.is_empty() {
            return None;
        }

        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => chunk_to_delta(chunk).map(SseItem::Delta),
            Err(e) => {
                warn!("[OpenAiSseParser] 解析 JSON 失败: {} - data: {}", e, data);
                None
            }
        }
    }
}

/// chunk → 增量
///
/// 只读取第一个 choice；没有任何有效内容的 chunk 返回 `None`。
pub fn chunk_to_delta(chunk: ChatCompletionChunk) -> Option<UpstreamDelta> {
    let usage = chunk.usage;
    let choice = chunk.choices.into_iter().next();

    let mut delta = UpstreamDelta {
        usage,
        ..Default::default()
    };

    if let Some(choice) = choice {
        delta.finish_reason = choice.finish_reason;
        delta.content = choice.delta.content.filter(|s| !s.is_empty());
        delta.tool_calls = choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let (name, arguments) = match call.function {
                    Some(function) => (function.name, function.arguments.unwrap_or_default()),
                    None => (None, String::new()),
                };
                ToolCallFragment {
                    index: call.index,
                    id: call.id.filter(|id| !id.is_empty()),
                    name: name.filter(|n| !n.is_empty()),
                    arguments,
                }
            })
            .collect();
    }

    (!delta.is_empty()).then_some(delta)
}
