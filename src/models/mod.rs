//! 协议数据模型
//!
//! - `anthropic`: 客户端使用的 Messages API
//! - `openai`: 上游使用的 Chat Completions API

pub mod anthropic;
pub mod openai;
