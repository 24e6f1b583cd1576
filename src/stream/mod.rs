//! 流式处理层
//!
//! 把上游 OpenAI 增量流实时转换为 Anthropic Messages SSE 事件流：
//!
//! ```text
//! 上游字节流 ──> [OpenAiSseParser] ──> UpstreamDelta ──> [StreamTranslator] ──> StreamEvent ──> [anthropic_sse] ──> SSE
//! ```
//!
//! # 模块结构
//!
//! - `events`: 上游增量与下游流事件类型
//! - `parsers`: 上游 SSE 解析器
//! - `state`: 内容块生命周期状态机
//! - `generators`: Anthropic SSE 格式生成器
//! - `pipeline`: 单个请求的流处理管道（背压、取消、文件落地）

pub mod events;
pub mod generators;
pub mod parsers;
pub mod pipeline;
pub mod state;


pub use events::{ContentBlockType, StopReason, StreamEvent, ToolCallFragment, UpstreamDelta};
pub use parsers::{OpenAiSseParser, SseItem};
pub use pipeline::{SseSender, StreamPipeline, SSE_CHANNEL_CAPACITY};
pub use state::{Block, Phase, StreamTranslator};
