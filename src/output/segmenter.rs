//! 文本切分策略

use once_cell::sync::Lazy;
use regex::Regex;

/// 识别为文件名的扩展名
pub const RECOGNIZED_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "tsx", "jsx", "mjs", "json", "toml", "yaml", "yml", "md", "txt",
    "html", "htm", "css", "scss", "sh", "bash", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp",
    "cs", "rb", "php", "swift", "sql", "xml", "ini", "cfg", "conf", "env", "vue", "svelte", "lua",
    "csv",
];

/// 文件名行：允许 markdown 标题、加粗、反引号修饰以及结尾冒号
static FILENAME_LINE: Lazy<Option<Regex>> = Lazy::new(|| {
    let extensions = RECOGNIZED_EXTENSIONS.join("|");
    Regex::new(&format!(
        r"^\s*(?:#{{1,6}}\s*)?(?:\*\*)?`?([A-Za-z0-9_][A-Za-z0-9_./-]*\.(?:{extensions}))`?(?:\*\*)?\s*:?\s*(?:\*\*)?\s*$"
    ))
    .ok()
});

/// 文件片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSegment {
    /// 相对路径
    pub path: String,
    pub content: String,
}

/// 文本切分策略
pub trait FileSegmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<FileSegment>;
}

/// 默认的启发式切分
///
/// - 文件名行开始一个新片段
/// - 代码块外的空行结束当前片段
/// - 代码块标记行本身不写入文件
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicSegmenter;

impl HeuristicSegmenter {
    /// 提取文件名行中的路径
    pub fn filename_of(line: &str) -> Option<&str> {
        FILENAME_LINE
            .as_ref()?
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl FileSegmenter for HeuristicSegmenter {
    fn segment(&self, text: &str) -> Vec<FileSegment> {
        let mut segments = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;
        let mut in_fence = false;

        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                continue;
            }

            let starts_file = !(in_fence && current.is_some());
            if starts_file {
                if let Some(path) = Self::filename_of(line) {
                    flush(&mut segments, &mut current);
                    current = Some((path.to_string(), Vec::new()));
                    continue;
                }
            }

            if line.trim().is_empty() && !in_fence {
                flush(&mut segments, &mut current);
                continue;
            }

            if let Some((_, lines)) = current.as_mut() {
                lines.push(line);
            }
        }
        flush(&mut segments, &mut current);

        segments
            .into_iter()
            .filter(|s| !s.content.trim().is_empty())
            .collect()
    }
}

fn flush(segments: &mut Vec<FileSegment>, current: &mut Option<(String, Vec<&str>)>) {
    if let Some((path, lines)) = current.take() {
        let mut content = lines.join("\n");
        content.push('\n');
        segments.push(FileSegment { path, content });
    }
}
