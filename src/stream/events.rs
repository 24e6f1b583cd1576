//! 流事件类型
//!
//! - `UpstreamDelta`: 上游 chunk 解析后的增量，作为状态机的输入
//! - `StreamEvent`: 目标协议的 SSE 事件，作为状态机的输出
//!
//! ```text
//! 上游 SSE ──> [OpenAiSseParser] ──> UpstreamDelta ──> [StreamTranslator] ──> StreamEvent ──> [generator] ──> 客户端 SSE
//! ```

use serde::{Deserialize, Serialize};

use crate::models::openai::CompletionUsage;

/// 上游增量
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamDelta {
    /// 文本片段
    pub content: Option<String>,
    /// 工具调用片段
    pub tool_calls: Vec<ToolCallFragment>,
    pub finish_reason: Option<String>,
    pub usage: Option<CompletionUsage>,
}

impl UpstreamDelta {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }

    /// 是否不携带任何内容
    pub fn is_empty(&self) -> bool {
        self.content.as_deref().map_or(true, str::is_empty)
            && self.tool_calls.is_empty()
            && self.finish_reason.is_none()
            && self.usage.is_none()
    }
}

/// 工具调用片段
///
/// 同一个工具调用的第一个片段通常带 `id` 和 `name`，后续片段只带参数。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallFragment {
    /// 上游的工具调用序号
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    /// 参数 JSON 片段
    pub arguments: String,
}

impl ToolCallFragment {
    pub fn new(id: Option<&str>, name: Option<&str>, arguments: &str) -> Self {
        Self {
            index: 0,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: arguments.to_string(),
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }
}

/// 目标协议流事件
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    MessageStart {
        id: String,
        model: String,
    },
    ContentBlockStart {
        index: u32,
        block_type: ContentBlockType,
    },
    TextDelta {
        index: u32,
        text: String,
    },
    InputJsonDelta {
        index: u32,
        partial_json: String,
    },
    ContentBlockStop {
        index: u32,
    },
    /// file 模式下落地的文件（相对路径）
    FilesCreated {
        files: Vec<String>,
    },
    MessageDelta {
        stop_reason: StopReason,
        output_tokens: u32,
    },
    MessageStop,
}

impl StreamEvent {
    /// SSE `event:` 字段
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::TextDelta { .. } | StreamEvent::InputJsonDelta { .. } => {
                "content_block_delta"
            }
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::FilesCreated { .. } => "files_created",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
        }
    }

    /// 事件引用的内容块索引
    pub fn block_index(&self) -> Option<u32> {
        match self {
            StreamEvent::ContentBlockStart { index, .. }
            | StreamEvent::TextDelta { index, .. }
            | StreamEvent::InputJsonDelta { index, .. }
            | StreamEvent::ContentBlockStop { index } => Some(*index),
            _ => None,
        }
    }
}

/// 内容块类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentBlockType {
    Text,
    ToolUse { id: String, name: String },
}

/// 停止原因
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    #[default]
    EndTurn,
    ToolUse,
}

impl StopReason {
    pub fn to_anthropic_str(&self) -> &'static str {
        match self {
            Self::EndTurn => "end_turn",
            Self::ToolUse => "tool_use",
        }
    }
}
