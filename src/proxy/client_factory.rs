//! 上游 HTTP 客户端工厂
//!
//! 流式响应可能持续很久，只设置连接超时，不设置整体请求超时。

use reqwest::{Client, Proxy};
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    /// 只支持 http/https 代理
    #[error("不支持的代理地址: {0}")]
    UnsupportedProxy(String),

    #[error("HTTP 客户端构建失败: {0}")]
    Build(#[from] reqwest::Error),
}

/// HTTP 客户端工厂
#[derive(Debug, Clone, Default)]
pub struct ClientFactory {
    proxy: Option<String>,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置代理，空字符串视为未设置
    pub fn with_proxy(mut self, proxy_url: Option<String>) -> Self {
        self.proxy = proxy_url.filter(|url| !url.trim().is_empty());
        self
    }

    pub fn create_client(&self) -> Result<Client, ClientError> {
        let mut builder = Client::builder().connect_timeout(CONNECT_TIMEOUT);

        if let Some(url) = self.proxy.as_deref() {
            let lower = url.to_ascii_lowercase();
            if !(lower.starts_with("http://") || lower.starts_with("https://")) {
                return Err(ClientError::UnsupportedProxy(url.to_string()));
            }
            builder = builder.proxy(Proxy::all(url)?);
            tracing::info!("[HTTP] 通过代理 {} 访问上游", url);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_proxy_is_ignored() {
        let factory = ClientFactory::new().with_proxy(Some("  ".to_string()));
        assert!(factory.proxy.is_none());
        assert!(factory.create_client().is_ok());
    }

    #[test]
    fn test_http_proxy_accepted() {
        let factory = ClientFactory::new().with_proxy(Some("HTTP://127.0.0.1:7890".to_string()));
        assert!(factory.create_client().is_ok());
    }

    #[test]
    fn test_socks_proxy_rejected() {
        let factory = ClientFactory::new().with_proxy(Some("socks5://127.0.0.1:1080".to_string()));
        assert!(matches!(
            factory.create_client(),
            Err(ClientError::UnsupportedProxy(_))
        ));
    }
}
