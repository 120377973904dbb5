use std::path::PathBuf;
use thiserror::Error;
use vt_provider::ProviderError;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • OrbStackまたはDocker Desktopがインストールされているか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error("Docker APIエラー: {0}")]
    DockerApiError(String),

    #[error(
        "イメージ '{image}' を取得できません: {reason}\n\nヒント:\n  • イメージ名とタグを確認してください"
    )]
    ImageNotFound { image: String, reason: String },

    #[error("イメージのビルドに失敗しました ({image}): {reason}")]
    BuildFailed { image: String, reason: String },

    #[error("不正なパス: {path}\n理由: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("Compose ファイルの解析に失敗しました: {path}\n理由: {reason}")]
    ComposeParse { path: PathBuf, reason: String },

    #[error("サービス定義エラー: {0}")]
    InvalidService(String),

    #[error("タイムアウトしました: {operation} ({secs}秒)")]
    Timeout { operation: String, secs: u64 },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for ContainerError {
    fn from(err: bollard::errors::Error) -> Self {
        match &err {
            bollard::errors::Error::DockerResponseServerError { .. } => {
                // 404/409 などは呼び出し側で個別に処理される
                ContainerError::DockerApiError(err.to_string())
            }
            _ => {
                let err_str = err.to_string();
                if err_str.contains("Connection refused")
                    || err_str.contains("No such file or directory")
                    || err_str.contains("error trying to connect")
                {
                    ContainerError::DockerConnectionFailed(err_str)
                } else {
                    ContainerError::DockerApiError(err_str)
                }
            }
        }
    }
}

impl From<ContainerError> for ProviderError {
    fn from(err: ContainerError) -> Self {
        match err {
            ContainerError::DockerConnectionFailed(msg) => ProviderError::RuntimeUnavailable(msg),
            ContainerError::Timeout { .. } => ProviderError::Timeout(err.to_string()),
            ContainerError::InvalidPath { .. }
            | ContainerError::ComposeParse { .. }
            | ContainerError::InvalidService(_) => ProviderError::Validation(err.to_string()),
            other => ProviderError::Backend(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ContainerError>;
