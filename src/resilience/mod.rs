//! 容错机制模块
//!
//! 提供上游调用的重试与熔断

mod circuit_breaker;
mod invoker;
mod retry;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot, Clock, ManualClock, SystemClock,
};
pub use invoker::ResilientInvoker;
pub use retry::RetryConfig;
