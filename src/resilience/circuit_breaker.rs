//! 熔断器
//!
//! 连续失败达到阈值后打开，冷却期内直接拒绝请求；冷却结束后的第一次检查
//! 把状态重置为关闭。时间通过 `Clock` 读取，测试中可以手动推进。

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::GatewayError;

/// 时间源
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 基于 tokio 时间的时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的时钟
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        *self.offset.lock() += duration;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// 打开熔断器所需的连续失败次数
    pub failure_threshold: u32,
    /// 打开后的冷却时间
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_millis(30_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    pub consecutive_failures: u32,
    pub open: bool,
    /// 剩余打开时间（毫秒）
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct State {
    consecutive_failures: u32,
    open: bool,
    open_until: Option<Instant>,
}

/// 熔断器
///
/// 每个进程一个实例，由网关创建并通过 `Arc` 交给调用器。
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self::with_clock(cfg, Arc::new(SystemClock))
    }

    pub fn with_clock(cfg: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cfg,
            clock,
            state: Mutex::new(State::default()),
        }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.cfg
    }

    /// 检查是否允许调用上游
    pub fn check(&self) -> Result<(), GatewayError> {
        let now = self.clock.now();
        let mut st = self.state.lock();
        if !st.open {
            return Ok(());
        }

        match st.open_until {
            Some(until) if now < until => Err(GatewayError::CircuitOpen {
                remaining_ms: (until - now).as_millis() as u64,
            }),
            _ => {
                tracing::info!("[CIRCUIT] 冷却结束，熔断器关闭");
                st.open = false;
                st.open_until = None;
                st.consecutive_failures = 0;
                Ok(())
            }
        }
    }

    pub fn record_success(&self) {
        let mut st = self.state.lock();
        st.consecutive_failures = 0;
        st.open = false;
        st.open_until = None;
    }

    /// 记录一次失败，返回本次是否触发熔断
    pub fn record_failure(&self) -> bool {
        let now = self.clock.now();
        let mut st = self.state.lock();
        st.consecutive_failures = st.consecutive_failures.saturating_add(1);

        if !st.open && st.consecutive_failures >= self.cfg.failure_threshold {
            st.open = true;
            st.open_until = Some(now + self.cfg.cooldown);
            tracing::error!(
                "[CIRCUIT] 连续失败 {} 次，熔断器打开 {}ms",
                st.consecutive_failures,
                self.cfg.cooldown.as_millis()
            );
            return true;
        }
        false
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = self.clock.now();
        let st = self.state.lock();
        let open_remaining_ms = st
            .open_until
            .filter(|until| *until > now && st.open)
            .map(|until| (until - now).as_millis() as u64);
        CircuitBreakerSnapshot {
            consecutive_failures: st.consecutive_failures,
            open: st.open,
            open_remaining_ms,
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn breaker() -> (CircuitBreaker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cb = CircuitBreaker::with_clock(CircuitBreakerConfig::default(), clock.clone());
        (cb, clock)
    }

    #[test]
    fn test_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.failure_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_secs(30));
    }

    #[test]
    fn test_opens_after_threshold() {
        let (cb, _clock) = breaker();
        assert!(!cb.record_failure());
        assert!(!cb.record_failure());
        assert!(cb.check().is_ok());
        assert!(cb.record_failure());

        match cb.check() {
            Err(GatewayError::CircuitOpen { remaining_ms }) => assert_eq!(remaining_ms, 30_000),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(cb.snapshot().open);
    }

    #[test]
    fn test_success_resets_failures() {
        let (cb, _clock) = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.snapshot().consecutive_failures, 0);
        assert!(!cb.record_failure());
    }

    #[test]
    fn test_closes_after_cooldown() {
        let (cb, clock) = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }

        clock.advance(Duration::from_millis(29_999));
        assert!(cb.check().is_err());

        clock.advance(Duration::from_millis(1));
        assert!(cb.check().is_ok());

        let snapshot = cb.snapshot();
        assert!(!snapshot.open);
        assert_eq!(snapshot.consecutive_failures, 0);
        assert!(snapshot.open_remaining_ms.is_none());
    }
}
