//! relaycast
//!
//! 让使用 Anthropic Messages 协议的 CLI 驱动 OpenAI Chat Completions 上游的流式网关。
//!
//! ```text
//! HTTP 请求 ──> server ──> translator（capability）──> resilience ──> 上游流 ──> stream ──> SSE
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod output;
pub mod providers;
pub mod proxy;
pub mod resilience;
pub mod server;
pub mod server_utils;
pub mod services;
pub mod stream;
pub mod translator;

pub use config::Config;
pub use error::{GatewayError, UpstreamError};
