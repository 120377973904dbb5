//! Docker Compose プロバイダー
//!
//! テンプレートの Compose ファイルを読み込み、[`ComposeRuntime`] で起動・停止し、
//! 成功した操作をデプロイメント台帳に記録します。

use crate::compose::ComposeFile;
use crate::project::{self, Project};
use crate::runtime::ComposeRuntime;
use crate::security;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use vt_config::ComposeSettings;
use vt_core::Template;
use vt_provider::{Provider, ProviderError, Result, StatusReport};
use vt_state::{DeploymentLedger, LedgerError};

/// 標準のプロバイダー名
pub const PROVIDER_NAME: &str = "docker-compose";

/// 短縮名。Docker 上のプロジェクトも台帳の行も標準名と共有する
pub const ALIAS_NAME: &str = "compose";

pub struct ComposeProvider {
    name: String,
    templates_root: PathBuf,
    settings: ComposeSettings,
    ledger: DeploymentLedger,
    runtime: Arc<dyn ComposeRuntime>,
    projects: RwLock<HashMap<String, Project>>,
}

impl ComposeProvider {
    pub fn new(
        name: impl Into<String>,
        templates_root: impl Into<PathBuf>,
        settings: ComposeSettings,
        ledger: DeploymentLedger,
        runtime: Arc<dyn ComposeRuntime>,
    ) -> Self {
        Self {
            name: name.into(),
            templates_root: templates_root.into(),
            settings,
            ledger,
            runtime,
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Compose ファイルを読み込み、管理ラベルを付与したプロジェクトを返す
    pub fn load_project(&self, template: &Template) -> Result<Project> {
        let config = template
            .provider(&self.name)
            .ok_or_else(|| ProviderError::Unsupported {
                provider: self.name.clone(),
                template: template.id.clone(),
            })?;

        let path = project::resolve_descriptor(&self.templates_root, &template.id, &config.path)?;
        let mut project = project::load_project(&path, &template.id)?;
        project::apply_template_config(&mut project, template);
        Ok(project)
    }

    /// キャッシュ済みのプロジェクト。なければ読み込み直す
    ///
    /// 読み込めない場合（Compose ファイルの削除など）はサービス定義のない
    /// プロジェクトを返し、ラベルによる検出だけで後片付けできるようにします。
    async fn cached_project(&self, template: &Template) -> Project {
        if let Some(project) = self.projects.read().await.get(&template.id) {
            return project.clone();
        }

        match self.load_project(template) {
            Ok(project) => project,
            Err(e) => {
                warn!(template = %template.id, error = %e, "Could not reload project, falling back to label discovery");
                Project {
                    name: project::project_name(&template.id),
                    template_id: template.id.clone(),
                    working_dir: self.templates_root.join(&template.id),
                    config_file: PathBuf::new(),
                    compose: ComposeFile::default(),
                }
            }
        }
    }

    async fn bring_up(&self, project: &Project) -> Result<()> {
        self.runtime.up(project, &self.settings).await?;

        if self.settings.wait_healthy {
            match self
                .runtime
                .wait_healthy(project, self.settings.health_timeout())
                .await
            {
                Ok(true) => info!(project = %project.name, "All services are ready"),
                Ok(false) => warn!(
                    project = %project.name,
                    timeout_secs = self.settings.health_timeout_secs,
                    "Services did not become healthy in time"
                ),
                Err(e) => warn!(project = %project.name, error = %e, "Health check failed"),
            }
        }

        Ok(())
    }

    /// 台帳に記録するプロバイダー名
    ///
    /// どちらの名前で登録されていても同じ `vt-<id>` プロジェクトを操作するため、
    /// 台帳のキーは常に標準名に揃えます。
    fn ledger_name(&self) -> &str {
        PROVIDER_NAME
    }

    fn already_running(&self, template: &Template) -> ProviderError {
        ProviderError::AlreadyRunning {
            provider: self.name.clone(),
            template: template.id.clone(),
        }
    }

    fn not_running(&self, template: &Template) -> ProviderError {
        ProviderError::NotRunning {
            provider: self.name.clone(),
            template: template.id.clone(),
        }
    }
}

#[async_trait]
impl Provider for ComposeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(provider = %self.name, template = %template.id))]
    async fn start(&self, template: &Template) -> Result<()> {
        if self.ledger.deployment_exists(self.ledger_name(), &template.id).await? {
            return Err(self.already_running(template));
        }

        let project = self.load_project(template)?;
        let warnings = security::validate_project(&project);
        if !warnings.is_empty() {
            info!(count = warnings.len(), "Security warnings recorded");
        }

        tokio::time::timeout(self.settings.timeout(), self.bring_up(&project))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!(
                    "starting '{}' took longer than {}s",
                    template.id, self.settings.timeout_secs
                ))
            })??;

        match self.ledger.add_new_deployment(self.ledger_name(), &template.id).await {
            Ok(()) => {}
            Err(LedgerError::AlreadyExists { .. }) => return Err(self.already_running(template)),
            Err(e) => return Err(e.into()),
        }

        self.projects
            .write()
            .await
            .insert(template.id.clone(), project);

        info!("Template started");
        Ok(())
    }

    #[instrument(skip_all, fields(provider = %self.name, template = %template.id))]
    async fn stop(&self, template: &Template) -> Result<()> {
        if !self.ledger.deployment_exists(self.ledger_name(), &template.id).await? {
            return Err(self.not_running(template));
        }

        let project = self.cached_project(template).await;

        let report = tokio::time::timeout(
            self.settings.timeout(),
            self.runtime.down(&project, &self.settings),
        )
        .await
        .map_err(|_| {
            ProviderError::Timeout(format!(
                "stopping '{}' took longer than {}s",
                template.id, self.settings.timeout_secs
            ))
        })??;

        if !report.is_clean() {
            warn!(
                removed = report.removed,
                failed = report.failed,
                "Some resources could not be removed"
            );
        }

        match self.ledger.remove_deployment(self.ledger_name(), &template.id).await {
            Ok(()) => {}
            Err(LedgerError::NotFound { .. }) => return Err(self.not_running(template)),
            Err(e) => return Err(e.into()),
        }

        self.projects.write().await.remove(&template.id);

        info!(removed = report.removed, "Template stopped");
        Ok(())
    }

    async fn status(&self, template: &Template) -> Result<StatusReport> {
        if template.provider(&self.name).is_none() {
            return Err(ProviderError::Unsupported {
                provider: self.name.clone(),
                template: template.id.clone(),
            });
        }

        let project_name = project::project_name(&template.id);
        let services = self.runtime.ps(&project_name).await?;
        Ok(StatusReport::new(project_name, services))
    }
}
