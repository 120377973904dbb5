//! Docker Compose オーケストレーター
//!
//! テンプレートの Compose ファイルを読み込み、bollard 経由で Docker 上に展開します。

pub mod build;
pub mod compose;
pub mod converter;
pub mod docker;
pub mod error;
pub mod labels;
pub mod port;
pub mod project;
pub mod provider;
pub mod runtime;
pub mod security;
pub mod waiter;

pub use docker::DockerRuntime;
pub use error::{ContainerError, Result};
pub use project::{Project, project_name};
pub use provider::{ALIAS_NAME, ComposeProvider, PROVIDER_NAME};
pub use runtime::{ComposeRuntime, TeardownReport};
pub use security::{SecurityWarning, validate_project};

use std::path::Path;
use std::sync::Arc;
use vt_config::ComposeSettings;
use vt_provider::Registry;
use vt_state::DeploymentLedger;

/// Compose プロバイダーを標準名と短縮名の両方で登録
pub fn register_providers(
    registry: &mut Registry,
    templates_root: &Path,
    settings: &ComposeSettings,
    ledger: &DeploymentLedger,
    runtime: Arc<dyn ComposeRuntime>,
) {
    for name in [PROVIDER_NAME, ALIAS_NAME] {
        registry.register(Arc::new(ComposeProvider::new(
            name,
            templates_root,
            settings.clone(),
            ledger.clone(),
            runtime.clone(),
        )));
    }
}
