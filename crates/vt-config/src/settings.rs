//! `~/.vt/config.yaml` の設定値
//!
//! すべての項目は省略可能で、省略時はデフォルト値が使われます。

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub compose: ComposeSettings,
    pub monitor: MonitorSettings,
}

/// Compose プロバイダーの動作設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeSettings {
    /// 起動処理全体のタイムアウト（秒）
    pub timeout_secs: u64,
    /// 停止時にボリュームも削除する
    pub remove_volumes: bool,
    /// 定義から外れたコンテナも削除する
    pub remove_orphans: bool,
    /// 起動後にヘルスチェックを待機する
    pub wait_healthy: bool,
    pub health_timeout_secs: u64,
    /// コンテナ停止の猶予（秒）
    pub stop_timeout_secs: u64,
    /// Docker API 呼び出し1回あたりのタイムアウト（秒）
    pub daemon_timeout_secs: u64,
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            remove_volumes: true,
            remove_orphans: true,
            wait_healthy: true,
            health_timeout_secs: 120,
            stop_timeout_secs: 10,
            daemon_timeout_secs: 10,
        }
    }
}

impl ComposeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn daemon_timeout(&self) -> Duration {
        Duration::from_secs(self.daemon_timeout_secs)
    }
}

/// ステータスモニターの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// watch モードの再取得間隔（ミリ秒）
    pub refresh_interval_ms: u64,
    /// テンプレート1件あたりの状態取得タイムアウト（ミリ秒）
    pub query_timeout_ms: u64,
    /// 通知の表示時間（ミリ秒）
    pub toast_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 2000,
            query_timeout_ms: 5000,
            toast_ms: 3000,
        }
    }
}

impl MonitorSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_ms)
    }
}

impl Settings {
    /// 設定ファイルを読み込む。ファイルがなければデフォルト値
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // 空ファイルは null として解釈されるため、デフォルト扱いにする
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }
}
