//! 首次运行时初始化 CLI 配置
//!
//! CLI 在没有用户级配置文件时会进入交互式引导。网关启动时写入一个
//! 带随机用户标识和引导完成标记的配置文件；文件已存在时什么都不做。

use anyhow::Context;
use rand::RngCore;
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::Path;

/// 初始化结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Created,
    AlreadyPresent,
}

/// 生成 64 位十六进制的随机用户标识
pub fn generate_user_id() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// 初始配置内容
pub fn seed_document(user_id: &str) -> Value {
    json!({
        "userID": user_id,
        "hasCompletedOnboarding": true,
        "firstStartTime": chrono::Utc::now().to_rfc3339(),
    })
}

/// 配置文件不存在时写入初始配置
pub fn seed_cli_config(path: &Path) -> anyhow::Result<SeedOutcome> {
    if path.exists() {
        tracing::debug!("[ONBOARDING] 配置已存在: {}", path.display());
        return Ok(SeedOutcome::AlreadyPresent);
    }

    let document = seed_document(&generate_user_id());
    write_json_file_atomic(path, &document)
        .with_context(|| format!("写入 CLI 配置失败: {}", path.display()))?;

    tracing::info!("[ONBOARDING] 已初始化 CLI 配置: {}", path.display());
    Ok(SeedOutcome::Created)
}

/// 临时文件 + 重命名写入 JSON
fn write_json_file_atomic(path: &Path, value: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    let content = serde_json::to_string_pretty(value)?;
    let mut temp_file = fs::File::create(&temp_path)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.flush()?;
    drop(temp_file);

    fs::rename(&temp_path, path)?;
    Ok(())
}
