//! 代理模块
//!
//! 构建访问上游使用的 HTTP 客户端

mod client_factory;

pub use client_factory::{ClientError, ClientFactory};
