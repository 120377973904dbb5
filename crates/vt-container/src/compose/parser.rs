//! Compose ファイルパーサー
//!
//! 環境変数の展開（`${VAR}`, `${VAR:-default}`, `$VAR`）を行ってから YAML を読み込みます。

use super::model::ComposeFile;
use crate::error::{ContainerError, Result};
use regex::{Captures, Regex};
use std::path::Path;
use tracing::{debug, instrument};

const VARIABLE_PATTERN: &str =
    r"\$\$|\$\{([A-Za-z_][A-Za-z0-9_]*)(?:(:?-)([^}]*))?\}|\$([A-Za-z_][A-Za-z0-9_]*)";

/// 変数を展開
///
/// `$$` はリテラルの `$` になります。
/// `${VAR:-x}` は未定義または空のとき、`${VAR-x}` は未定義のときのみ `x` になります。
pub fn interpolate<F>(content: &str, lookup: F) -> std::result::Result<String, regex::Error>
where
    F: Fn(&str) -> Option<String>,
{
    let re = Regex::new(VARIABLE_PATTERN)?;

    let expanded = re.replace_all(content, |caps: &Captures| {
        if &caps[0] == "$$" {
            return "$".to_string();
        }

        if let Some(name) = caps.get(1) {
            let value = lookup(name.as_str());
            let default = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            return match caps.get(2).map(|m| m.as_str()) {
                Some(":-") => value.filter(|v| !v.is_empty()).unwrap_or_else(|| default.to_string()),
                Some(_) => value.unwrap_or_else(|| default.to_string()),
                None => value.unwrap_or_default(),
            };
        }

        caps.get(4)
            .and_then(|name| lookup(name.as_str()))
            .unwrap_or_default()
    });

    Ok(expanded.into_owned())
}

/// 文字列から Compose ファイルを解析
pub fn parse(content: &str, path: &Path) -> Result<ComposeFile> {
    let expanded = interpolate(content, |name| std::env::var(name).ok()).map_err(|e| {
        ContainerError::ComposeParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    let compose: ComposeFile =
        serde_yaml::from_str(&expanded).map_err(|e| ContainerError::ComposeParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if compose.services.is_empty() {
        return Err(ContainerError::ComposeParse {
            path: path.to_path_buf(),
            reason: "services が定義されていません".to_string(),
        });
    }

    debug!(services = compose.services.len(), "Compose file parsed");
    Ok(compose)
}

/// ファイルから Compose ファイルを解析
#[instrument(fields(path = %path.display()))]
pub fn parse_file(path: &Path) -> Result<ComposeFile> {
    let content = std::fs::read_to_string(path)?;
    parse(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_interpolate_forms() {
        let vars = lookup(&[("PORT", "3000"), ("EMPTY", "")]);

        assert_eq!(interpolate("${PORT}:80", &vars).unwrap(), "3000:80");
        assert_eq!(interpolate("$PORT", &vars).unwrap(), "3000");
        assert_eq!(interpolate("${MISSING:-8080}", &vars).unwrap(), "8080");
        assert_eq!(interpolate("${EMPTY:-x}", &vars).unwrap(), "x");
        assert_eq!(interpolate("${EMPTY-x}", &vars).unwrap(), "");
        assert_eq!(interpolate("${MISSING-x}", &vars).unwrap(), "x");
        assert_eq!(interpolate("${MISSING}", &vars).unwrap(), "");
        assert_eq!(interpolate("cost $$5", &vars).unwrap(), "cost $5");
    }

    #[test]
    fn test_parse_compose() {
        let yaml = r#"
services:
  web:
    image: bkimminich/juice-shop
    ports:
      - "${VT_TEST_UNSET_PORT:-3000}:3000"
volumes:
  data:
"#;
        let compose = parse(yaml, Path::new("docker-compose.yaml")).unwrap();
        let web = &compose.services["web"];
        assert_eq!(web.image.as_deref(), Some("bkimminich/juice-shop"));
        assert_eq!(
            web.ports,
            vec![super::super::model::PortSpec::Short("3000:3000".to_string())]
        );
        assert!(compose.volumes.contains_key("data"));
    }

    #[test]
    fn test_parse_without_services() {
        let err = parse("volumes: {}\n", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ContainerError::ComposeParse { .. }));
    }

    #[test]
    fn test_parse_invalid_yaml() {
        let err = parse("services: [", Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ContainerError::ComposeParse { .. }));
    }
}
