//! 请求处理器

mod health;
mod messages;

pub use health::{health, models};
pub use messages::messages;
