//! Compose ファイルの読み込み

pub mod model;
pub mod parser;

pub use model::*;
pub use parser::{interpolate, parse, parse_file};
