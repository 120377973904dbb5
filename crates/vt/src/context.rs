//! 起動時に一度だけ構築する共有コンテキスト

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use vt_config::Settings;
use vt_container::{ComposeRuntime, DockerRuntime};
use vt_core::Catalog;
use vt_provider::Registry;
use vt_state::DeploymentLedger;

pub struct AppContext {
    pub catalog: Arc<Catalog>,
    pub registry: Registry,
    pub ledger: DeploymentLedger,
    pub settings: Settings,
}

impl AppContext {
    /// 設定・カタログ・台帳を読み込み、プロバイダーを登録する
    ///
    /// カタログが1件でも不正なら起動を中止します。
    pub async fn load(templates_dir: &Path) -> anyhow::Result<Self> {
        let settings = vt_config::load_settings()?;

        let catalog = Catalog::load(templates_dir).with_context(|| {
            format!(
                "テンプレートの読み込みに失敗しました: {}",
                templates_dir.display()
            )
        })?;

        let ledger_path = vt_config::ledger_path()?;
        let ledger = DeploymentLedger::open(&ledger_path)
            .await
            .with_context(|| {
                format!(
                    "デプロイメント台帳を開けませんでした: {}",
                    ledger_path.display()
                )
            })?;

        let runtime: Arc<dyn ComposeRuntime> =
            Arc::new(DockerRuntime::new(settings.compose.daemon_timeout()));
        let mut registry = Registry::new();
        vt_container::register_providers(
            &mut registry,
            templates_dir,
            &settings.compose,
            &ledger,
            runtime,
        );

        info!(
            templates = catalog.len(),
            providers = ?registry.names(),
            "Application context ready"
        );

        Ok(Self {
            catalog: Arc::new(catalog),
            registry,
            ledger,
            settings,
        })
    }
}
