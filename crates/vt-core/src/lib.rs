//! vulnerable-target のテンプレートカタログ
//!
//! `templates/<id>/index.yaml` を読み込み、検証し、ID で引けるカタログを提供します。

pub mod catalog;
pub mod error;
pub mod loader;
pub mod template;

pub use catalog::{Catalog, EXAMPLE_TEMPLATE_ID, ValidationReport, validate_root};
pub use error::{Result, TemplateError};
pub use loader::{DESCRIPTOR_FILE, load_template};
pub use template::{Info, ProviderConfig, Template};
