//! 文件落地

use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use super::segmenter::FileSegment;

#[derive(Debug, Error)]
pub enum MaterializeError {
    /// 绝对路径、`..` 或空路径
    #[error("拒绝写入不安全的路径: {0}")]
    UnsafePath(String),

    #[error("写入文件失败: {path} - {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 文件落地器
///
/// 所有片段都写在基准目录之下，返回写入成功的相对路径。
#[derive(Debug, Clone)]
pub struct FileMaterializer {
    base_dir: PathBuf,
}

impl FileMaterializer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// 规范化相对路径
    ///
    /// 去掉 `.` 分量，拒绝绝对路径与 `..`。
    pub fn normalize(path: &str) -> Result<PathBuf, MaterializeError> {
        let mut normalized = PathBuf::new();
        for component in Path::new(path.trim()).components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(MaterializeError::UnsafePath(path.to_string()));
                }
            }
        }
        if normalized.as_os_str().is_empty() {
            return Err(MaterializeError::UnsafePath(path.to_string()));
        }
        Ok(normalized)
    }

    /// 写入单个片段，返回相对路径
    pub fn write_segment(&self, segment: &FileSegment) -> Result<String, MaterializeError> {
        let relative = Self::normalize(&segment.path)?;
        let target = self.base_dir.join(&relative);
        let display = relative.to_string_lossy().replace('\\', "/");

        let io_err = |source| MaterializeError::Io {
            path: display.clone(),
            source,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&target, &segment.content).map_err(io_err)?;

        Ok(display)
    }

    /// 写入所有非空片段
    ///
    /// 单个片段失败只记录日志并跳过。
    pub fn write_all(&self, segments: &[FileSegment]) -> Vec<String> {
        let mut written = Vec::new();
        for segment in segments {
            if segment.content.trim().is_empty() {
                continue;
            }
            match self.write_segment(segment) {
                Ok(path) => {
                    tracing::info!("[OUTPUT] 已写入文件: {}", path);
                    written.push(path);
                }
                Err(e) => tracing::warn!("[OUTPUT] {}", e),
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(path: &str, content: &str) -> FileSegment {
        FileSegment {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_normalize_rejects_unsafe_paths() {
        assert!(matches!(
            FileMaterializer::normalize("/etc/passwd"),
            Err(MaterializeError::UnsafePath(_))
        ));
        assert!(matches!(
            FileMaterializer::normalize("../outside.txt"),
            Err(MaterializeError::UnsafePath(_))
        ));
        assert!(matches!(
            FileMaterializer::normalize("src/../../x.rs"),
            Err(MaterializeError::UnsafePath(_))
        ));
        assert!(matches!(
            FileMaterializer::normalize("./"),
            Err(MaterializeError::UnsafePath(_))
        ));
        assert_eq!(
            FileMaterializer::normalize("./src/main.rs").unwrap(),
            PathBuf::from("src/main.rs")
        );
    }

    #[test]
    fn test_write_all_creates_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = FileMaterializer::new(dir.path());

        let written = materializer.write_all(&[
            segment("src/main.rs", "fn main() {}\n"),
            segment("README.md", "# demo\n"),
        ]);

        assert_eq!(written, vec!["src/main.rs", "README.md"]);
        assert_eq!(
            fs::read_to_string(dir.path().join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
        assert!(dir.path().join("README.md").exists());
    }

    #[test]
    fn test_write_all_skips_unsafe_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let materializer = FileMaterializer::new(dir.path().join("work"));

        let written = materializer.write_all(&[
            segment("../escape.txt", "nope\n"),
            segment("empty.txt", "  \n"),
            segment("ok.txt", "yes\n"),
        ]);

        assert_eq!(written, vec!["ok.txt"]);
        assert!(!dir.path().join("escape.txt").exists());
        assert!(!dir.path().join("work/empty.txt").exists());
    }
}
