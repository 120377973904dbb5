use crate::error::Result;
use crate::project::Project;
use crate::waiter;
use async_trait::async_trait;
use std::time::Duration;
use vt_config::ComposeSettings;
use vt_provider::ServiceStatus;

/// Compose プロジェクトを実際に動かすランタイム
#[async_trait]
pub trait ComposeRuntime: Send + Sync {
    /// ネットワーク・ボリューム・サービスを作成して起動
    async fn up(&self, project: &Project, settings: &ComposeSettings) -> Result<()>;

    /// プロジェクトのリソースを削除（失敗したリソースは記録して続行）
    async fn down(&self, project: &Project, settings: &ComposeSettings) -> Result<TeardownReport>;

    /// プロジェクトに属するコンテナの状態（停止中を含む）
    async fn ps(&self, project_name: &str) -> Result<Vec<ServiceStatus>>;

    /// すべてのサービスが準備完了になるまで待機。タイムアウト時は `Ok(false)`
    async fn wait_healthy(&self, project: &Project, timeout: Duration) -> Result<bool> {
        waiter::wait_until_ready(self, project, timeout, waiter::POLL_INTERVAL).await
    }
}

/// 削除処理の結果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub removed: usize,
    pub failed: usize,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}
