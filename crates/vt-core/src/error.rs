use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("テンプレートIDが空です")]
    EmptyId,

    #[error(
        "テンプレート '{0}': IDに使用できない文字が含まれています\nヒント: 英数字で始まり、英数字と '_' '.' '-' のみ使用できます"
    )]
    InvalidId(String),

    #[error("テンプレート '{0}': providers が指定されていません")]
    NoProviders(String),

    #[error("テンプレート '{template}': プロバイダー '{provider}' の path が空です")]
    EmptyPath { template: String, provider: String },

    #[error("テンプレート '{template}': 絶対パスは使用できません: {path}")]
    AbsolutePath { template: String, path: String },

    #[error("テンプレート '{template}': パスに '..' を含めることはできません: {path}")]
    PathTraversal { template: String, path: String },

    #[error(
        "テンプレート '{template}': 対応していない拡張子です: {path}\nヒント: .yml または .yaml を使用してください"
    )]
    InvalidExtension { template: String, path: String },

    #[error("テンプレートIDがディレクトリ名と一致しません: id='{id}', ディレクトリ='{dir}'")]
    IdMismatch { id: String, dir: String },

    #[error("テンプレート定義ファイルが見つかりません: {0}")]
    DescriptorNotFound(PathBuf),

    #[error("テンプレート '{0}' が見つかりません")]
    NotFound(String),

    #[error("YAMLパースエラー: {path}\n理由: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TemplateError>;
