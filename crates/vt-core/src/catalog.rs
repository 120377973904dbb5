//! テンプレートカタログ
//!
//! 起動時に一度だけ構築され、以降は読み取り専用で各コンポーネントに渡されます。

use crate::error::{Result, TemplateError};
use crate::loader::{load_template, template_dirs};
use crate::template::Template;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// 一覧やモニターに表示しない雛形テンプレートのID
pub const EXAMPLE_TEMPLATE_ID: &str = "example-template";

/// ID をキーにしたテンプレートの集合
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    root: PathBuf,
    templates: HashMap<String, Template>,
}

impl Catalog {
    /// テンプレートルート配下をすべて読み込む
    ///
    /// 不正なテンプレートが1つでもあれば即座にエラーを返します。
    #[instrument(fields(root = %root.display()))]
    pub fn load(root: &Path) -> Result<Self> {
        let mut templates = HashMap::new();
        for dir in template_dirs(root)? {
            let template = load_template(&dir)?;
            templates.insert(template.id.clone(), template);
        }

        info!(count = templates.len(), "Template catalog loaded");
        Ok(Self {
            root: root.to_path_buf(),
            templates,
        })
    }

    /// 読み込み済みのテンプレートからカタログを構築
    pub fn from_templates(root: impl Into<PathBuf>, templates: Vec<Template>) -> Self {
        Self {
            root: root.into(),
            templates: templates.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, id: &str) -> Result<&Template> {
        self.templates
            .get(id)
            .ok_or_else(|| TemplateError::NotFound(id.to_string()))
    }

    /// 全テンプレート（順序不定）
    pub fn all(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    /// ID順に並べたテンプレート
    pub fn sorted(&self) -> Vec<&Template> {
        let mut templates: Vec<_> = self.templates.values().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    /// 雛形を除いたID順のテンプレート
    pub fn visible(&self) -> Vec<&Template> {
        self.sorted()
            .into_iter()
            .filter(|t| t.id != EXAMPLE_TEMPLATE_ID)
            .collect()
    }

    /// タグ・対象技術で絞り込み
    pub fn filter(&self, term: &str) -> Vec<&Template> {
        self.visible()
            .into_iter()
            .filter(|t| t.matches(term))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// `validate` コマンドの結果
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub passed: Vec<String>,
    pub failures: Vec<(String, TemplateError)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failures.len()
    }
}

/// テンプレートを1つずつ検証する
///
/// 1つのテンプレートが失敗しても残りの検証は続行されます。
#[instrument(fields(root = %root.display()))]
pub fn validate_root(root: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    for dir in template_dirs(root)? {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match load_template(&dir) {
            Ok(template) => report.passed.push(template.id),
            Err(e) => {
                warn!(template = %name, error = %e, "Template validation failed");
                report.failures.push((name, e));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::DESCRIPTOR_FILE;
    use std::fs;
    use tempfile::tempdir;

    fn write_descriptor(root: &Path, dir: &str, body: &str) {
        let template_dir = root.join(dir);
        fs::create_dir_all(&template_dir).unwrap();
        fs::write(template_dir.join(DESCRIPTOR_FILE), body).unwrap();
    }

    fn valid(id: &str, tags: &str) -> String {
        format!(
            "id: {id}\ninfo:\n  name: {id}\n  author: a\n  tags: [{tags}]\n  technologies: [nginx]\nproviders:\n  docker-compose:\n    path: docker-compose.yaml\n"
        )
    }

    #[test]
    fn test_catalog_load_and_get() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "dvwa", &valid("dvwa", "php"));
        write_descriptor(temp.path(), "juice-shop", &valid("juice-shop", "owasp"));

        let catalog = Catalog::load(temp.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("dvwa").unwrap().id, "dvwa");
        assert!(matches!(
            catalog.get("missing"),
            Err(TemplateError::NotFound(_))
        ));
    }

    #[test]
    fn test_catalog_load_fails_fast() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "good", &valid("good", "x"));
        write_descriptor(temp.path(), "bad", "id: bad\nproviders: {}\n");

        let err = Catalog::load(temp.path()).unwrap_err();
        assert!(matches!(err, TemplateError::NoProviders(_)));
    }

    #[test]
    fn test_visible_hides_example() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "a", &valid("a", "x"));
        write_descriptor(
            temp.path(),
            EXAMPLE_TEMPLATE_ID,
            &valid(EXAMPLE_TEMPLATE_ID, "x"),
        );

        let catalog = Catalog::load(temp.path()).unwrap();
        assert_eq!(catalog.all().count(), 2);
        let visible: Vec<_> = catalog.visible().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(visible, vec!["a"]);
    }

    #[test]
    fn test_filter_case_insensitive() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "a", &valid("a", "OWASP, xss"));
        write_descriptor(temp.path(), "b", &valid("b", "sqli"));

        let catalog = Catalog::load(temp.path()).unwrap();
        let ids: Vec<_> = catalog.filter("owasp").iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(catalog.filter("NGINX").len(), 2);
        assert!(catalog.filter("java").is_empty());
    }

    #[test]
    fn test_validate_root_isolates_errors() {
        let temp = tempdir().unwrap();
        write_descriptor(temp.path(), "first", &valid("first", "x"));
        write_descriptor(temp.path(), "mismatch", &valid("something-else", "x"));
        write_descriptor(temp.path(), "third", &valid("third", "x"));

        let report = validate_root(temp.path()).unwrap();
        assert!(!report.is_ok());
        assert_eq!(report.total(), 3);
        assert_eq!(report.passed, vec!["first", "third"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "mismatch");
        assert!(matches!(
            report.failures[0].1,
            TemplateError::IdMismatch { .. }
        ));
    }
}
