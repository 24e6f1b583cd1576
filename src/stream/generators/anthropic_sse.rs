//! Anthropic SSE 生成器
//!
//! 将 `StreamEvent` 渲染为 Anthropic Messages API SSE 格式。
//!
//! ```text
//! event: message_start
//! data: {"type":"message_start","message":{...}}
//!
//! event: content_block_start
//! data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}
//!
//! event: content_block_delta
//! data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}
//!
//! event: content_block_stop
//! data: {"type":"content_block_stop","index":0}
//!
//! event: message_delta
//! data: {"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}
//!
//! event: message_stop
//! data: {"type":"message_stop"}
//! ```

use serde_json::{json, Value};

use crate::stream::events::{ContentBlockType, StreamEvent};

/// 渲染为完整的 SSE 事件字符串（包含 `event:` 和 `data:` 行）
pub fn generate(event: &StreamEvent) -> String {
    format!("event: {}\ndata: {}\n\n", event.event_name(), event_data(event))
}

/// 事件的 `data:` JSON
pub fn event_data(event: &StreamEvent) -> Value {
    match event {
        StreamEvent::MessageStart { id, model } => json!({
            "type": "message_start",
            "message": {
                "id": id,
                "type": "message",
                "role": "assistant",
                "model": model,
                "content": [],
                "stop_reason": Value::Null,
                "stop_sequence": Value::Null,
                "usage": {
                    "input_tokens": 0,
                    "output_tokens": 0
                }
            }
        }),
        StreamEvent::ContentBlockStart { index, block_type } => {
            let content_block = match block_type {
                ContentBlockType::Text => json!({"type": "text", "text": ""}),
                ContentBlockType::ToolUse { id, name } => json!({
                    "type": "tool_use",
                    "id": id,
                    "name": name,
                    "input": {}
                }),
            };
            json!({
                "type": "content_block_start",
                "index": index,
                "content_block": content_block
            })
        }
        StreamEvent::TextDelta { index, text } => json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "text_delta", "text": text}
        }),
        StreamEvent::InputJsonDelta {
            index,
            partial_json,
        } => json!({
            "type": "content_block_delta",
            "index": index,
            "delta": {"type": "input_json_delta", "partial_json": partial_json}
        }),
        StreamEvent::ContentBlockStop { index } => json!({
            "type": "content_block_stop",
            "index": index
        }),
        StreamEvent::FilesCreated { files } => json!({
            "type": "files_created",
            "files": files
        }),
        StreamEvent::MessageDelta {
            stop_reason,
            output_tokens,
        } => json!({
            "type": "message_delta",
            "delta": {
                "stop_reason": stop_reason.to_anthropic_str(),
                "stop_sequence": Value::Null
            },
            "usage": {"output_tokens": output_tokens}
        }),
        StreamEvent::MessageStop => json!({"type": "message_stop"}),
    }
}
