//! 协议转换层
//!
//! 把客户端的 Anthropic Messages 请求转换为上游 OpenAI Chat Completions 请求。
//! 响应方向的转换在 `stream` 模块中以状态机的形式完成。
//!
//! ```text
//! translator/
//! ├── traits.rs    # 转换器 trait 与错误类型
//! └── request.rs   # Anthropic → OpenAI 请求
//! ```

pub mod request;
pub mod traits;


pub use request::{
    translate_request, validate_request, MessagesTranslator, ModelPolicy, ModelSelection, Translation,
    OPERATIONAL_INSTRUCTIONS,
};
pub use traits::{RequestTranslator, TranslateError};
