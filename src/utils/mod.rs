//! Utility functions and helpers.

pub mod hash;
pub mod http;
pub mod text;

pub use hash::hash_id;
pub use text::{escape_html, strip_html, truncate_graphemes};
