//! 数据模型

mod api;
mod content;

pub use api::*;
pub use content::*;
