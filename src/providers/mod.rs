//! 上游 Provider
//!
//! - `traits`: `UpstreamClient` 接口与增量流类型
//! - `openai`: OpenAI 兼容 API 实现

#[cfg(test)]
pub mod mock;
pub mod openai;
pub mod traits;

pub use openai::OpenAiProvider;
pub use traits::{DeltaStream, UpstreamClient};
