//! 通用工具

mod text;

pub use text::{mask_api_key, truncate};
