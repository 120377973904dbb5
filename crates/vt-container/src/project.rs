//! テンプレートから Compose プロジェクトを構築
//!
//! パス解決、プロジェクト名の決定、管理ラベルの付与を行います。

use crate::compose::{self, ComposeFile, NetworkDefinition, ServiceNetworks, VolumeDefinition};
use crate::error::{ContainerError, Result};
use crate::labels;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, instrument};
use vt_core::Template;

/// すべてのサービスが参加する既定ネットワーク
pub const DEFAULT_NETWORK: &str = "default";

/// 削除してはいけない Docker 組み込みネットワーク
pub const BUILTIN_NETWORKS: &[&str] = &["bridge", "host", "none"];

/// 読み込み済みの Compose プロジェクト
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub template_id: String,
    /// Compose ファイルのあるディレクトリ
    pub working_dir: PathBuf,
    pub config_file: PathBuf,
    pub compose: ComposeFile,
}

/// テンプレートIDからプロジェクト名を生成
///
/// `vt-` を前置し、英小文字・数字・`-` 以外は `-` に置き換えます。
/// 例: `test_template` → `vt-test-template`
pub fn project_name(template_id: &str) -> String {
    let normalized: String = template_id
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("vt-{}", normalized)
}

/// `templates/<id>/<path>` を解決
///
/// テンプレート検証と同じく、絶対パスと `..` を拒否します。
pub fn resolve_descriptor(templates_root: &Path, template_id: &str, path: &str) -> Result<PathBuf> {
    let relative = Path::new(path);
    let invalid = |reason: &str| ContainerError::InvalidPath {
        path: relative.to_path_buf(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("パスが空です"));
    }
    if relative.is_absolute() || path.starts_with('/') || path.starts_with('\\') {
        return Err(invalid("絶対パスは使用できません"));
    }
    if relative.components().any(|c| matches!(c, Component::ParentDir))
        || path.split(['/', '\\']).any(|s| s == "..")
    {
        return Err(invalid("'..' を含めることはできません"));
    }

    let resolved = templates_root.join(template_id).join(relative);
    validate_file(&resolved)?;
    Ok(resolved)
}

/// 存在する通常ファイルであることを確認
fn validate_file(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|_| ContainerError::InvalidPath {
        path: path.to_path_buf(),
        reason: "ファイルが存在しません".to_string(),
    })?;

    if metadata.is_dir() {
        return Err(ContainerError::InvalidPath {
            path: path.to_path_buf(),
            reason: "ディレクトリが指定されています".to_string(),
        });
    }

    Ok(())
}

/// Compose ファイルを読み込んでプロジェクトを作成
#[instrument(fields(path = %compose_path.display()))]
pub fn load_project(compose_path: &Path, template_id: &str) -> Result<Project> {
    let compose = compose::parse_file(compose_path)?;

    let working_dir = compose_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let working_dir = std::fs::canonicalize(&working_dir).unwrap_or(working_dir);

    let project = Project {
        name: project_name(template_id),
        template_id: template_id.to_string(),
        working_dir,
        config_file: compose_path.to_path_buf(),
        compose,
    };

    debug!(
        project = %project.name,
        services = project.compose.services.len(),
        "Project loaded"
    );
    Ok(project)
}

impl Project {
    /// サービスのコンテナ名
    pub fn container_name(&self, service: &str) -> String {
        self.compose
            .services
            .get(service)
            .and_then(|s| s.container_name.clone())
            .unwrap_or_else(|| format!("{}-{}-1", self.name, service))
    }

    /// Docker 上のネットワーク名
    pub fn network_name(&self, network: &str) -> String {
        match self.compose.networks.get(network).and_then(|d| d.as_ref()) {
            Some(NetworkDefinition {
                name: Some(name), ..
            }) => name.clone(),
            Some(NetworkDefinition { external: true, .. }) => network.to_string(),
            _ => format!("{}_{}", self.name, network),
        }
    }

    /// Docker 上のボリューム名
    pub fn volume_name(&self, volume: &str) -> String {
        match self.compose.volumes.get(volume).and_then(|d| d.as_ref()) {
            Some(VolumeDefinition {
                name: Some(name), ..
            }) => name.clone(),
            Some(VolumeDefinition { external: true, .. }) => volume.to_string(),
            _ => format!("{}_{}", self.name, volume),
        }
    }

    /// vt が作成・削除するネットワーク（外部ネットワークを除く）
    pub fn managed_networks(&self) -> Vec<String> {
        self.compose
            .networks
            .iter()
            .filter(|(_, def)| !def.as_ref().is_some_and(|d| d.external))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// vt が作成・削除する名前付きボリューム（外部ボリュームを除く）
    pub fn managed_volumes(&self) -> Vec<String> {
        self.compose
            .volumes
            .iter()
            .filter(|(_, def)| !def.as_ref().is_some_and(|d| d.external))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// サービスが参加するネットワーク。network_mode 指定時は空
    pub fn service_networks(&self, service: &str) -> Vec<String> {
        let Some(definition) = self.compose.services.get(service) else {
            return Vec::new();
        };
        if definition.network_mode.is_some() {
            return Vec::new();
        }
        if definition.networks.is_empty() {
            return vec![DEFAULT_NETWORK.to_string()];
        }
        definition.networks.names()
    }

    /// depends_on を考慮した起動順
    pub fn service_order(&self) -> Result<Vec<String>> {
        let mut order = Vec::new();
        let mut done = BTreeSet::new();
        let mut visiting = BTreeSet::new();

        for name in self.compose.services.keys() {
            self.visit(name, &mut visiting, &mut done, &mut order)?;
        }

        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        visiting: &mut BTreeSet<String>,
        done: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if !visiting.insert(name.to_string()) {
            return Err(ContainerError::InvalidService(format!(
                "depends_on が循環しています: {}",
                name
            )));
        }

        let service = self.compose.services.get(name).ok_or_else(|| {
            ContainerError::InvalidService(format!("依存先のサービス '{}' が定義されていません", name))
        })?;

        for dependency in service.depends_on.names() {
            self.visit(&dependency, visiting, done, order)?;
        }

        visiting.remove(name);
        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }

    /// プロジェクト共通ラベル
    pub fn project_labels(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(labels::COMPOSE_PROJECT.to_string(), self.name.clone());
        map.insert(labels::VT_TEMPLATE.to_string(), self.template_id.clone());
        map.insert(labels::VT_MANAGED.to_string(), "true".to_string());
        map
    }
}

/// テンプレート情報をプロジェクトに反映
///
/// 各サービスに管理ラベルを付与し、`default` ネットワークを用意します。
pub fn apply_template_config(project: &mut Project, template: &Template) {
    let working_dir = project.working_dir.display().to_string();
    let config_file = project.config_file.display().to_string();

    for (name, service) in project.compose.services.iter_mut() {
        let service_labels = &mut service.labels;
        service_labels.insert(labels::COMPOSE_PROJECT, project.name.as_str());
        service_labels.insert(labels::COMPOSE_SERVICE, name.as_str());
        service_labels.insert(labels::COMPOSE_WORKING_DIR, working_dir.as_str());
        service_labels.insert(labels::COMPOSE_CONFIG_FILES, config_file.as_str());
        service_labels.insert(labels::COMPOSE_ONEOFF, "False");
        service_labels.insert(labels::VT_TEMPLATE, template.id.as_str());
        service_labels.insert(labels::VT_AUTHOR, template.info.author.as_str());
        service_labels.insert(labels::VT_MANAGED, "true");

        // 明示的なネットワーク指定がなければ default に参加
        if service.network_mode.is_none() && service.networks.is_empty() {
            service.networks = ServiceNetworks::List(vec![DEFAULT_NETWORK.to_string()]);
        }
    }

    project
        .compose
        .networks
        .entry(DEFAULT_NETWORK.to_string())
        .or_insert_with(|| {
            Some(NetworkDefinition {
                driver: Some("bridge".to_string()),
                ..Default::default()
            })
        });
}
