//! テンプレート定義
//!
//! `templates/<id>/index.yaml` に記述される脆弱性ラボ環境の定義です。

use crate::error::{Result, TemplateError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::LazyLock;

/// テンプレートIDの形式
pub const TEMPLATE_ID_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9_.-]*$";

static TEMPLATE_ID_REGEX: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(TEMPLATE_ID_PATTERN).ok());

/// プロバイダー設定ファイルとして許可される拡張子
pub const ALLOWED_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// 脆弱性ラボ環境のテンプレート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// テンプレートのメタ情報
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub references: Vec<String>,
    /// 対象技術（旧形式の `targets` も受け付ける）
    #[serde(default, alias = "targets")]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_yaml::Value>>,
}

/// プロバイダーごとの設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub path: String,
}

impl Template {
    /// テンプレート定義を検証
    ///
    /// ID の形式、providers の有無、各 path の安全性を確認します。
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)?;

        if self.providers.is_empty() {
            return Err(TemplateError::NoProviders(self.id.clone()));
        }

        for (provider, config) in &self.providers {
            validate_provider_path(&self.id, provider, &config.path)?;
        }

        Ok(())
    }

    /// 指定プロバイダーの設定を取得
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    /// タグまたは対象技術に `term` を含むか（大文字小文字を区別しない）
    pub fn matches(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.info
            .tags
            .iter()
            .chain(self.info.technologies.iter())
            .any(|value| value.to_lowercase().contains(&term))
    }
}

/// ID は英数字で始まり、英数字・`_`・`.`・`-` のみで構成される
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(TemplateError::EmptyId);
    }

    let valid = TEMPLATE_ID_REGEX
        .as_ref()
        .is_some_and(|re| re.is_match(id));

    if valid {
        Ok(())
    } else {
        Err(TemplateError::InvalidId(id.to_string()))
    }
}

fn validate_provider_path(template: &str, provider: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(TemplateError::EmptyPath {
            template: template.to_string(),
            provider: provider.to_string(),
        });
    }

    let as_path = Path::new(path);
    if as_path.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return Err(TemplateError::AbsolutePath {
            template: template.to_string(),
            path: path.to_string(),
        });
    }

    // Windows 形式の区切りも考慮して検査
    let has_parent = as_path
        .components()
        .any(|c| matches!(c, Component::ParentDir))
        || path.split(['/', '\\']).any(|segment| segment == "..");
    if has_parent {
        return Err(TemplateError::PathTraversal {
            template: template.to_string(),
            path: path.to_string(),
        });
    }

    let extension = as_path.extension().and_then(|e| e.to_str());
    if !extension.is_some_and(|ext| ALLOWED_EXTENSIONS.contains(&ext)) {
        return Err(TemplateError::InvalidExtension {
            template: template.to_string(),
            path: path.to_string(),
        });
    }

    Ok(())
}
