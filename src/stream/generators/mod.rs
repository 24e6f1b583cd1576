//! SSE 流生成器
//!
//! 将 `StreamEvent` 渲染为客户端协议的 SSE 格式。

pub mod anthropic_sse;
