//! テンプレートローダー
//!
//! テンプレートディレクトリの発見と定義ファイルの読み込み

use crate::error::{Result, TemplateError};
use crate::template::Template;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// テンプレート定義ファイル名
pub const DESCRIPTOR_FILE: &str = "index.yaml";

/// 定義ファイル名の候補（優先順）
const DESCRIPTOR_CANDIDATES: &[&str] = &[DESCRIPTOR_FILE, "index.yml"];

/// テンプレートディレクトリ内の定義ファイルを探す
pub fn find_descriptor(dir: &Path) -> Option<PathBuf> {
    DESCRIPTOR_CANDIDATES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// 1つのテンプレートを読み込んで検証
///
/// 定義ファイルの `id` はディレクトリ名と一致している必要があります。
#[instrument(fields(dir = %dir.display()))]
pub fn load_template(dir: &Path) -> Result<Template> {
    let path = find_descriptor(dir)
        .ok_or_else(|| TemplateError::DescriptorNotFound(dir.join(DESCRIPTOR_FILE)))?;

    let content = std::fs::read_to_string(&path)?;
    let template: Template =
        serde_yaml::from_str(&content).map_err(|source| TemplateError::Yaml {
            path: path.clone(),
            source,
        })?;

    template.validate()?;

    let dir_name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if template.id != dir_name {
        return Err(TemplateError::IdMismatch {
            id: template.id,
            dir: dir_name.to_string(),
        });
    }

    debug!(template = %template.id, providers = template.providers.len(), "Template loaded");
    Ok(template)
}

/// テンプレートルート直下のディレクトリを名前順で列挙
pub fn template_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_template(root: &Path, dir: &str, id: &str) -> PathBuf {
        let template_dir = root.join(dir);
        fs::create_dir_all(&template_dir).unwrap();
        fs::write(
            template_dir.join(DESCRIPTOR_FILE),
            format!(
                "id: {id}\ninfo:\n  name: Test\n  author: tester\nproviders:\n  docker-compose:\n    path: docker-compose.yaml\n"
            ),
        )
        .unwrap();
        template_dir
    }

    #[test]
    fn test_load_template() {
        let temp = tempdir().unwrap();
        let dir = write_template(temp.path(), "juice-shop", "juice-shop");

        let template = load_template(&dir).unwrap();
        assert_eq!(template.id, "juice-shop");
        assert_eq!(template.info.author, "tester");
        assert_eq!(
            template.provider("docker-compose").unwrap().path,
            "docker-compose.yaml"
        );
    }

    #[test]
    fn test_load_template_id_mismatch() {
        let temp = tempdir().unwrap();
        let dir = write_template(temp.path(), "folder", "other");

        let err = load_template(&dir).unwrap_err();
        assert!(matches!(err, TemplateError::IdMismatch { .. }));
    }

    #[test]
    fn test_load_template_missing_descriptor() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("empty");
        fs::create_dir(&dir).unwrap();

        let err = load_template(&dir).unwrap_err();
        assert!(matches!(err, TemplateError::DescriptorNotFound(_)));
    }

    #[test]
    fn test_load_template_yml_fallback() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("alt");
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join("index.yml"),
            "id: alt\nproviders:\n  docker-compose:\n    path: c.yml\n",
        )
        .unwrap();

        assert_eq!(load_template(&dir).unwrap().id, "alt");
    }

    #[test]
    fn test_load_template_broken_yaml() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("broken");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(DESCRIPTOR_FILE), "id: [unterminated").unwrap();

        let err = load_template(&dir).unwrap_err();
        assert!(matches!(err, TemplateError::Yaml { .. }));
    }

    #[test]
    fn test_template_dirs_skips_files() {
        let temp = tempdir().unwrap();
        write_template(temp.path(), "b", "b");
        write_template(temp.path(), "a", "a");
        fs::write(temp.path().join("README.md"), "docs").unwrap();

        let dirs = template_dirs(temp.path()).unwrap();
        let names: Vec<_> = dirs
            .iter()
            .map(|d| d.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
