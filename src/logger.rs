//! 日志管理模块
//!
//! 控制台输出 + 可选的文件输出。文件写入在后台线程中完成，请求处理线程只把
//! 格式化好的日志行放进有界队列；队列满时直接丢弃该行。
use chrono::{Duration, Local, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, SyncSender};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// 日志文件名
pub const LOG_FILE_NAME: &str = "relaycast.log";

/// 后台写入队列容量
const QUEUE_CAPACITY: usize = 4096;

/// 默认压低的嘈杂模块
const NOISY_TARGETS: &[&str] = &["hyper=warn", "reqwest=warn", "h2=warn", "tower_http=warn"];

/// 构建日志过滤器
///
/// 设置了 `RUST_LOG` 时以它为准，否则使用配置的级别加上嘈杂模块的压制规则。
pub fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(level)))
}

fn filter_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(NOISY_TARGETS.iter().map(|d| d.to_string()));
    directives.join(",")
}

/// 初始化全局 tracing subscriber
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> anyhow::Result<()> {
    let filter = build_env_filter(&config.level);

    let file_layer = if config.enabled {
        let sink = FileSink::spawn(LogFileWriter::new(
            log_dir.join(LOG_FILE_NAME),
            config.max_file_size,
            config.retention_days,
        ))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(sink),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(())
}

// ============================================================================
// 文件输出
// ============================================================================

/// 文件日志写入器（只在后台线程中使用）
pub struct LogFileWriter {
    path: PathBuf,
    max_file_size: u64,
    retention_days: u32,
}

impl LogFileWriter {
    pub fn new(path: PathBuf, max_file_size: u64, retention_days: u32) -> Self {
        Self {
            path,
            max_file_size,
            retention_days,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入一行日志，失败时静默忽略
    pub fn write_line(&self, line: &str) {
        self.rotate_log_file_if_needed();
        let sanitized = sanitize_log_message(line.trim_end());
        let local_time = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(file, "{} {}", local_time, sanitized);
        }
    }

    fn rotate_log_file_if_needed(&self) {
        let Ok(metadata) = fs::metadata(&self.path) else {
            return;
        };

        if metadata.len() <= self.max_file_size {
            return;
        }

        let suffix = Local::now().format("%Y%m%d-%H%M%S%.3f");
        let rotated = self.path.with_file_name(format!(
            "{}.{}",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            suffix
        ));

        let _ = fs::rename(&self.path, &rotated);
        self.prune_old_logs();
    }

    /// 删除超过保留天数的轮转文件
    pub fn prune_old_logs(&self) {
        let Some(dir) = self.path.parent() else {
            return;
        };
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let cutoff = Utc::now() - Duration::days(self.retention_days as i64);
        let prefix = format!(
            "{}.",
            self.path.file_name().unwrap_or_default().to_string_lossy()
        );

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if !file_name.starts_with(&prefix) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let modified = chrono::DateTime::<Utc>::from(modified);
            if modified < cutoff {
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

/// 后台文件输出
///
/// 作为 `fmt::layer().with_writer(..)` 的 `MakeWriter` 使用。
#[derive(Clone)]
pub struct FileSink {
    tx: SyncSender<String>,
}

impl FileSink {
    /// 启动后台写入线程
    pub fn spawn(writer: LogFileWriter) -> io::Result<Self> {
        if let Some(dir) = writer.path().parent() {
            fs::create_dir_all(dir)?;
        }
        let (tx, rx) = mpsc::sync_channel(QUEUE_CAPACITY);
        std::thread::Builder::new()
            .name("relaycast-log-writer".to_string())
            .spawn(move || run_writer(writer, rx))?;
        Ok(Self { tx })
    }

    #[cfg(test)]
    fn from_sender(tx: SyncSender<String>) -> Self {
        Self { tx }
    }
}

fn run_writer(writer: LogFileWriter, rx: Receiver<String>) {
    writer.prune_old_logs();
    while let Ok(line) = rx.recv() {
        writer.write_line(&line);
    }
}

/// 单次事件的写入句柄
pub struct SinkWriter {
    tx: SyncSender<String>,
}

impl Write for SinkWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // 队列满或后台线程退出时丢弃
        let _ = self
            .tx
            .try_send(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for FileSink {
    type Writer = SinkWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SinkWriter {
            tx: self.tx.clone(),
        }
    }
}

// ============================================================================
// 脱敏
// ============================================================================

static SANITIZE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        // Bearer token
        (r"Bearer\s+[A-Za-z0-9._-]+", "Bearer ***"),
        // API key 各种格式
        (
            r#"api[_-]?key["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "api_key: ***",
        ),
        (
            r#"access[_-]?token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "access_token: ***",
        ),
        (
            r#"refresh[_-]?token["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "refresh_token: ***",
        ),
        // 通用 token
        (r#"\btoken["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#, "token: ***"),
        (
            r#"client[_-]?secret["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "client_secret: ***",
        ),
        (r#"password["']?\s*[:=]\s*["']?[^\s"',}]+"#, "password: ***"),
        (
            r#"\bsecret["']?\s*[:=]\s*["']?[A-Za-z0-9._-]+"#,
            "secret: ***",
        ),
        // OpenAI 风格的裸 key
        (r"\bsk-[A-Za-z0-9_-]{8,}", "sk-***"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// 日志脱敏
pub fn sanitize_log_message(message: &str) -> String {
    let mut sanitized = message.to_string();
    for (re, replacement) in SANITIZE_PATTERNS.iter() {
        sanitized = re.replace_all(&sanitized, *replacement).to_string();
    }
    sanitized
}
