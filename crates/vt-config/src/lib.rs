pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{ComposeSettings, MonitorSettings, Settings};

use std::path::{Path, PathBuf};

/// データディレクトリを上書きする環境変数
pub const HOME_ENV: &str = "VT_HOME";

/// テンプレートルートを上書きする環境変数
pub const TEMPLATES_ENV: &str = "VT_TEMPLATES_DIR";

/// デプロイメント台帳のファイル名
pub const LEDGER_FILE: &str = "deployments.db";

/// モニター実行中のログファイル名
pub const LOG_FILE: &str = "vt.log";

/// 設定ファイル名
pub const CONFIG_FILE: &str = "config.yaml";

/// データディレクトリ（`$VT_HOME` または `~/.vt`）を取得
///
/// 存在しない場合は作成します。
pub fn app_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(HOME_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => dirs::home_dir()
            .ok_or(ConfigError::HomeDirNotFound)?
            .join(".vt"),
    };

    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        tracing::debug!(path = %dir.display(), "Created application directory");
    }

    Ok(dir)
}

/// デプロイメント台帳のパス
pub fn ledger_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(LEDGER_FILE))
}

/// ログファイルのパス
pub fn log_path() -> Result<PathBuf> {
    Ok(app_dir()?.join(LOG_FILE))
}

/// テンプレートルートを決定
///
/// 以下の優先順位:
/// 1. 明示的な指定（`--templates-dir`）
/// 2. 環境変数 VT_TEMPLATES_DIR
/// 3. カレントディレクトリの `templates/`
pub fn templates_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(TEMPLATES_ENV)
        && !path.is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    Ok(std::env::current_dir()?.join("templates"))
}

/// データディレクトリの設定ファイルを読み込む（なければデフォルト）
pub fn load_settings() -> Result<Settings> {
    Settings::load(&app_dir()?.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_app_dir_from_env() {
        let temp = tempfile::tempdir().unwrap();
        let home = temp.path().join("vt-home");

        temp_env::with_var(HOME_ENV, Some(&home), || {
            let dir = app_dir().unwrap();
            assert_eq!(dir, home);
            assert!(dir.exists());
            assert_eq!(ledger_path().unwrap(), home.join(LEDGER_FILE));
            assert_eq!(log_path().unwrap(), home.join(LOG_FILE));
        });
    }

    #[test]
    #[serial]
    fn test_templates_dir_priority() {
        let explicit = PathBuf::from("/srv/labs");

        temp_env::with_var(TEMPLATES_ENV, Some("/from/env"), || {
            assert_eq!(templates_dir(Some(&explicit)).unwrap(), explicit);
            assert_eq!(templates_dir(None).unwrap(), PathBuf::from("/from/env"));
        });

        temp_env::with_var_unset(TEMPLATES_ENV, || {
            let dir = templates_dir(None).unwrap();
            assert!(dir.ends_with("templates"));
        });
    }

    #[test]
    #[serial]
    fn test_load_settings_defaults_without_file() {
        let temp = tempfile::tempdir().unwrap();

        temp_env::with_var(HOME_ENV, Some(temp.path()), || {
            let settings = load_settings().unwrap();
            assert_eq!(settings, Settings::default());
        });
    }
}
