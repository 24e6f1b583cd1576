//! 输出落地
//!
//! file 模式下把模型生成的完整文本切分为文件片段，并写入本地目录。
//!
//! - `segmenter`: 文本 → 文件片段的切分策略
//! - `materializer`: 把片段安全地写到基准目录下

mod materializer;
mod segmenter;

pub use materializer::{FileMaterializer, MaterializeError};
pub use segmenter::{FileSegment, FileSegmenter, HeuristicSegmenter};
