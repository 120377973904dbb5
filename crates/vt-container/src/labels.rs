//! 管理用ラベル
//!
//! コンテナ・ネットワーク・ボリュームに付与し、vt が作成したリソースだけを発見・操作するために使います。

pub const COMPOSE_PROJECT: &str = "com.docker.compose.project";
pub const COMPOSE_SERVICE: &str = "com.docker.compose.service";
pub const COMPOSE_WORKING_DIR: &str = "com.docker.compose.project.working_dir";
pub const COMPOSE_CONFIG_FILES: &str = "com.docker.compose.project.config_files";
pub const COMPOSE_ONEOFF: &str = "com.docker.compose.oneoff";
pub const COMPOSE_NETWORK: &str = "com.docker.compose.network";
pub const COMPOSE_VOLUME: &str = "com.docker.compose.volume";

pub const VT_TEMPLATE: &str = "vulnerable-target.template";
pub const VT_AUTHOR: &str = "vulnerable-target.author";
pub const VT_MANAGED: &str = "vulnerable-target.managed";

/// プロジェクトに属するリソースを絞り込むフィルタ値
pub fn project_filter(project: &str) -> String {
    format!("{}={}", COMPOSE_PROJECT, project)
}
