//! プロジェクトのセキュリティ検査
//!
//! 脆弱な環境を動かすこと自体が目的なので、危険な設定は拒否せず警告として記録します。

use crate::port::{Mount, MountKind, parse_volume};
use crate::project::Project;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// 追加されると警告する capability
pub const DANGEROUS_CAPABILITIES: &[&str] = &[
    "ALL",
    "SYS_ADMIN",
    "NET_ADMIN",
    "SYS_PTRACE",
    "SYS_MODULE",
    "SYS_RAWIO",
    "DAC_READ_SEARCH",
];

/// バインドマウントすると警告するホストパス
pub const SENSITIVE_HOST_PATHS: &[&str] = &["/", "/etc", "/sys", "/proc", "/dev"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityWarning {
    Privileged { service: String },
    HostNetwork { service: String },
    DangerousCapability { service: String, capability: String },
    MissingImage { service: String },
    SensitiveMount { service: String, source: String },
}

impl fmt::Display for SecurityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecurityWarning::Privileged { service } => {
                write!(f, "サービス '{}' は privileged モードで実行されます", service)
            }
            SecurityWarning::HostNetwork { service } => {
                write!(f, "サービス '{}' はホストネットワークを使用します", service)
            }
            SecurityWarning::DangerousCapability {
                service,
                capability,
            } => write!(
                f,
                "サービス '{}' に危険な capability が追加されています: {}",
                service, capability
            ),
            SecurityWarning::MissingImage { service } => {
                write!(f, "サービス '{}' に image も build も指定されていません", service)
            }
            SecurityWarning::SensitiveMount { service, source } => write!(
                f,
                "サービス '{}' がホストの重要なパスをマウントしています: {}",
                service, source
            ),
        }
    }
}

/// プロジェクトを検査し、見つかった警告を返す（ログにも出力）
pub fn validate_project(project: &Project) -> Vec<SecurityWarning> {
    let mut warnings = Vec::new();

    for (name, service) in &project.compose.services {
        let service_name = name.to_string();

        if service.privileged {
            warnings.push(SecurityWarning::Privileged {
                service: service_name.clone(),
            });
        }

        if service.network_mode.as_deref() == Some("host") {
            warnings.push(SecurityWarning::HostNetwork {
                service: service_name.clone(),
            });
        }

        for capability in &service.cap_add {
            let normalized = capability
                .trim()
                .to_uppercase()
                .trim_start_matches("CAP_")
                .to_string();
            if DANGEROUS_CAPABILITIES.contains(&normalized.as_str()) {
                warnings.push(SecurityWarning::DangerousCapability {
                    service: service_name.clone(),
                    capability: capability.clone(),
                });
            }
        }

        if service.image.is_none() && service.build.is_none() {
            warnings.push(SecurityWarning::MissingImage {
                service: service_name.clone(),
            });
        }

        for spec in &service.volumes {
            let Ok(Mount {
                kind: MountKind::Bind,
                source: Some(source),
                ..
            }) = parse_volume(spec, &project.working_dir)
            else {
                continue;
            };
            if is_sensitive_path(&source) {
                warnings.push(SecurityWarning::SensitiveMount {
                    service: service_name.clone(),
                    source,
                });
            }
        }
    }

    for warning in &warnings {
        warn!(project = %project.name, "{}", warning);
    }

    warnings
}

/// `/` は完全一致、それ以外は配下も含めて判定
pub fn is_sensitive_path(source: &str) -> bool {
    let path = Path::new(source);
    SENSITIVE_HOST_PATHS.iter().any(|sensitive| {
        if *sensitive == "/" {
            path == Path::new("/")
        } else {
            path.starts_with(sensitive)
        }
    })
}
