//! 上游流式响应解析器

pub mod openai_sse;

pub use openai_sse::{chunk_to_delta, OpenAiSseParser, SseItem};
