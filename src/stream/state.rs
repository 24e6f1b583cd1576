//! 流式状态机
//!
//! 消费上游增量，按顺序产出目标协议的流事件。每个请求独占一个实例。
//!
//! ```text
//! Idle ──start()──> Streaming ──finish()──> Closed
//!
//! Streaming 内部：NoBlock ──> TextBlockOpen | ToolBlockOpen
//! ```
//!
//! 内容块只在另一类增量到达时关闭（工具块遇到新的工具调用也会关闭），
//! 最后一个块在上游结束后由 `finish()` 统一关闭。

use serde_json::Value;
use uuid::Uuid;

use crate::models::anthropic::OutputMode;
use crate::models::openai::CompletionUsage;
use crate::stream::events::{
    ContentBlockType, StopReason, StreamEvent, ToolCallFragment, UpstreamDelta,
};

/// 已打开过的内容块
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// 累积的参数 JSON 文本
        arguments: String,
        /// 最近一次成功解析的参数
        input: Value,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OpenBlock {
    None,
    Text,
    Tool {
        upstream_index: u32,
        upstream_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Streaming,
    Closed,
}

/// 流式状态机
#[derive(Debug)]
pub struct StreamTranslator {
    message_id: String,
    model: String,
    mode: OutputMode,
    fallback: bool,
    phase: Phase,
    content_block_index: u32,
    blocks: Vec<Block>,
    open: OpenBlock,
    /// 所有文本片段（file 模式落地用）
    full_text: String,
    /// 输出字符数（用于估算 token）
    output_chars: usize,
    usage: Option<CompletionUsage>,
}

impl StreamTranslator {
    pub fn new(model: impl Into<String>, mode: OutputMode, fallback: bool) -> Self {
        Self::with_id(
            format!("msg_{}", Uuid::new_v4().simple()),
            model,
            mode,
            fallback,
        )
    }

    pub fn with_id(
        message_id: impl Into<String>,
        model: impl Into<String>,
        mode: OutputMode,
        fallback: bool,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            model: model.into(),
            mode,
            fallback,
            phase: Phase::Idle,
            content_block_index: 0,
            blocks: Vec::new(),
            open: OpenBlock::None,
            full_text: String::new(),
            output_chars: 0,
            usage: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn content_block_index(&self) -> u32 {
        self.content_block_index
    }

    /// 累积的完整文本
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    /// 开始消息，必须在消费任何增量之前调用
    pub fn start(&mut self) -> Vec<StreamEvent> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }
        self.phase = Phase::Streaming;
        vec![StreamEvent::MessageStart {
            id: self.message_id.clone(),
            model: self.model.clone(),
        }]
    }

    /// 处理一个上游增量
    ///
    /// 同一个增量同时带文本和工具调用时，先处理文本。
    pub fn on_delta(&mut self, delta: &UpstreamDelta) -> Vec<StreamEvent> {
        let mut events = self.start();
        if self.phase == Phase::Closed {
            return events;
        }

        if let Some(usage) = delta.usage {
            self.usage = Some(usage);
        }
        if let Some(text) = delta.content.as_deref().filter(|t| !t.is_empty()) {
            self.on_text(text, &mut events);
        }
        for fragment in &delta.tool_calls {
            self.on_tool_fragment(fragment, &mut events);
        }
        events
    }

    /// 结束消息
    ///
    /// `files_created` 只在 file 模式下传入，为空时按 fallback 开关把累积文本
    /// 作为一个 text_delta 补发。
    pub fn finish(&mut self, files_created: Option<Vec<String>>) -> Vec<StreamEvent> {
        let mut events = self.start();
        if self.phase == Phase::Closed {
            return events;
        }

        // 上游没有产生任何内容时补一个空文本块，保证 start/stop 成对
        if self.open == OpenBlock::None {
            self.open_text_block(&mut events);
        }

        let no_files = files_created.as_ref().map_or(false, |files| files.is_empty());
        if self.mode == OutputMode::File && no_files && self.fallback && !self.full_text.is_empty()
        {
            if self.open == OpenBlock::Text {
                events.push(StreamEvent::TextDelta {
                    index: self.content_block_index,
                    text: self.full_text.clone(),
                });
            } else {
                tracing::debug!("[STREAM] 最后一个内容块是工具调用，跳过文本回退");
            }
        }

        let stop_reason = match self.open {
            OpenBlock::Tool { .. } => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        };
        self.close_block(&mut events);

        if let Some(files) = files_created {
            events.push(StreamEvent::FilesCreated { files });
        }

        events.push(StreamEvent::MessageDelta {
            stop_reason,
            output_tokens: self.output_tokens(),
        });
        events.push(StreamEvent::MessageStop);
        self.phase = Phase::Closed;
        events
    }

    /// 输出 token 数：优先使用上游统计，否则按字符数 / 4 估算
    pub fn output_tokens(&self) -> u32 {
        match self.usage {
            Some(usage) if usage.completion_tokens > 0 => usage.completion_tokens,
            _ => (self.output_chars / 4) as u32,
        }
    }

    fn on_text(&mut self, text: &str, events: &mut Vec<StreamEvent>) {
        if matches!(self.open, OpenBlock::Tool { .. }) {
            self.close_block(events);
        }
        if self.open == OpenBlock::None {
            self.open_text_block(events);
        }

        if let Some(Block::Text { text: buffer }) = self.blocks.last_mut() {
            buffer.push_str(text);
        }
        self.full_text.push_str(text);
        self.output_chars += text.chars().count();

        if self.mode == OutputMode::Stream {
            events.push(StreamEvent::TextDelta {
                index: self.content_block_index,
                text: text.to_string(),
            });
        }
    }

    fn on_tool_fragment(&mut self, fragment: &ToolCallFragment, events: &mut Vec<StreamEvent>) {
        if self.open == OpenBlock::Text {
            self.close_block(events);
        }

        let starts_new_call = match &self.open {
            OpenBlock::Tool {
                upstream_index,
                upstream_id,
            } => {
                let id_changed = matches!(
                    (&fragment.id, upstream_id),
                    (Some(new_id), Some(open_id)) if new_id != open_id
                );
                id_changed || fragment.index != *upstream_index
            }
            _ => true,
        };

        if starts_new_call {
            self.close_block(events);
            self.open_tool_block(fragment, events);
        }

        if let Some(Block::ToolUse {
            arguments, input, ..
        }) = self.blocks.last_mut()
        {
            arguments.push_str(&fragment.arguments);
            if let Ok(parsed) = serde_json::from_str::<Value>(arguments) {
                *input = parsed;
            }
        }
        self.output_chars += fragment.arguments.chars().count();

        events.push(StreamEvent::InputJsonDelta {
            index: self.content_block_index,
            partial_json: fragment.arguments.clone(),
        });
    }

    fn open_text_block(&mut self, events: &mut Vec<StreamEvent>) {
        self.blocks.push(Block::Text {
            text: String::new(),
        });
        self.open = OpenBlock::Text;
        events.push(StreamEvent::ContentBlockStart {
            index: self.content_block_index,
            block_type: ContentBlockType::Text,
        });
    }

    fn open_tool_block(&mut self, fragment: &ToolCallFragment, events: &mut Vec<StreamEvent>) {
        let id = fragment
            .id
            .clone()
            .unwrap_or_else(|| format!("toolu_{}", Uuid::new_v4().simple()));
        let name = fragment.name.clone().unwrap_or_default();

        self.blocks.push(Block::ToolUse {
            id: id.clone(),
            name: name.clone(),
            arguments: String::new(),
            input: Value::Object(Default::default()),
        });
        self.open = OpenBlock::Tool {
            upstream_index: fragment.index,
            upstream_id: fragment.id.clone(),
        };
        events.push(StreamEvent::ContentBlockStart {
            index: self.content_block_index,
            block_type: ContentBlockType::ToolUse { id, name },
        });
    }

    fn close_block(&mut self, events: &mut Vec<StreamEvent>) {
        if self.open == OpenBlock::None {
            return;
        }
        events.push(StreamEvent::ContentBlockStop {
            index: self.content_block_index,
        });
        self.content_block_index += 1;
        self.open = OpenBlock::None;
    }
}
