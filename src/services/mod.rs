//! 启动期服务
//!
//! - `onboarding`: 首次运行时初始化 CLI 本地配置

pub mod onboarding;

pub use onboarding::{seed_cli_config, SeedOutcome};
