use assert_cmd::Command;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// テンプレートディレクトリとデータディレクトリを持つ一時環境
pub struct TestProject {
    pub root: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("templates")).unwrap();
        Self { root }
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.root.path().join("templates")
    }

    pub fn home_dir(&self) -> PathBuf {
        self.root.path().join("home")
    }

    /// `templates/<dir>/index.yaml` を書き込む
    pub fn write_descriptor(&self, dir: &str, content: &str) {
        let dir = self.templates_dir().join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.yaml"), content).unwrap();
    }

    /// Compose ファイル付きの標準的なテンプレートを追加
    pub fn add_template(&self, id: &str, technologies: &[&str], tags: &[&str]) {
        self.write_descriptor(
            id,
            &format!(
                r#"id: {id}
info:
  name: {id} lab
  author: vt-team
  description: Intentionally vulnerable {id}
  technologies: [{}]
  tags: [{}]
providers:
  docker-compose:
    path: docker-compose.yml
"#,
                technologies.join(", "),
                tags.join(", "),
            ),
        );
        fs::write(
            self.templates_dir().join(id).join("docker-compose.yml"),
            "services:\n  web:\n    image: nginx:alpine\n    ports:\n      - \"8080:80\"\n",
        )
        .unwrap();
    }

    /// テンプレートとデータディレクトリを指定済みの `vt` コマンド
    pub fn vt(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("vt").unwrap();
        cmd.env("VT_HOME", self.home_dir())
            .env_remove("VT_TEMPLATES_DIR")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .arg("--templates-dir")
            .arg(self.templates_dir());
        cmd
    }
}
