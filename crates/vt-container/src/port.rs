//! ポート・ボリューム指定の解析

use crate::compose::{PortNumber, PortSpec, VolumeSpec};
use crate::error::{ContainerError, Result};
use std::path::{Component, Path, PathBuf};

/// 解析済みのポートマッピング
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    /// None の場合は Docker が空きポートを割り当てる
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

impl PortMapping {
    /// Docker API のキー形式 (`80/tcp`)
    pub fn container_key(&self) -> String {
        format!("{}/{}", self.container_port, self.protocol)
    }
}

/// ポート指定を解析（範囲指定は展開される）
pub fn parse_port(spec: &PortSpec) -> Result<Vec<PortMapping>> {
    match spec {
        PortSpec::Number(port) => Ok(vec![PortMapping {
            host_ip: None,
            host_port: None,
            container_port: *port,
            protocol: "tcp".to_string(),
        }]),
        PortSpec::Short(short) => parse_short_port(short),
        PortSpec::Long(config) => {
            let host_port = match &config.published {
                Some(PortNumber::Number(n)) => Some(*n),
                Some(PortNumber::String(s)) if s.is_empty() => None,
                Some(PortNumber::String(s)) => Some(parse_number(s, s)?),
                None => None,
            };
            Ok(vec![PortMapping {
                host_ip: config.host_ip.clone(),
                host_port,
                container_port: config.target,
                protocol: config.protocol.clone().unwrap_or_else(|| "tcp".to_string()),
            }])
        }
    }
}

/// `[ip:][host:]container[/proto]`
fn parse_short_port(spec: &str) -> Result<Vec<PortMapping>> {
    let (binding, protocol) = spec.split_once('/').unwrap_or((spec, "tcp"));

    let mut parts = binding.rsplitn(3, ':');
    let container = parts.next().unwrap_or_default();
    let host = parts.next().filter(|h| !h.is_empty());
    let host_ip = parts
        .next()
        .map(|ip| ip.trim_start_matches('[').trim_end_matches(']').to_string());

    let container_ports = parse_range(container, spec)?;
    let host_ports = match host {
        Some(host) => {
            let ports = parse_range(host, spec)?;
            if ports.len() != container_ports.len() {
                return Err(ContainerError::InvalidService(format!(
                    "ポート範囲の長さが一致しません: {}",
                    spec
                )));
            }
            ports.into_iter().map(Some).collect()
        }
        None => vec![None; container_ports.len()],
    };

    Ok(container_ports
        .into_iter()
        .zip(host_ports)
        .map(|(container_port, host_port)| PortMapping {
            host_ip: host_ip.clone(),
            host_port,
            container_port,
            protocol: protocol.to_string(),
        })
        .collect())
}

fn parse_range(value: &str, spec: &str) -> Result<Vec<u16>> {
    match value.split_once('-') {
        Some((start, end)) => {
            let start = parse_number(start, spec)?;
            let end = parse_number(end, spec)?;
            if end < start {
                return Err(ContainerError::InvalidService(format!(
                    "不正なポート範囲です: {}",
                    spec
                )));
            }
            Ok((start..=end).collect())
        }
        None => Ok(vec![parse_number(value, spec)?]),
    }
}

fn parse_number(value: &str, spec: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| ContainerError::InvalidService(format!("不正なポート指定です: {}", spec)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// ホストパスのバインド
    Bind,
    /// 名前付きボリューム
    Volume,
    /// 名前なしボリューム
    Anonymous,
    Tmpfs,
}

/// 解析済みのマウント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    pub kind: MountKind,
    /// Bind の場合は絶対パス、Volume の場合はボリューム名
    pub source: Option<String>,
    pub target: String,
    pub read_only: bool,
}

/// ボリューム指定を解析
///
/// 相対パスのバインドは `working_dir` 基準で絶対パスに変換されます。
pub fn parse_volume(spec: &VolumeSpec, working_dir: &Path) -> Result<Mount> {
    match spec {
        VolumeSpec::Short(short) => {
            let parts: Vec<&str> = short.split(':').collect();
            match parts.as_slice() {
                [target] => Ok(Mount {
                    kind: MountKind::Anonymous,
                    source: None,
                    target: target.to_string(),
                    read_only: false,
                }),
                [source, target] => Ok(mount_from_source(source, target, false, working_dir)),
                [source, target, mode] => Ok(mount_from_source(
                    source,
                    target,
                    mode.split(',').any(|m| m == "ro"),
                    working_dir,
                )),
                _ => Err(ContainerError::InvalidService(format!(
                    "不正なボリューム指定です: {}",
                    short
                ))),
            }
        }
        VolumeSpec::Long(config) => {
            let kind = match config.kind.as_deref() {
                Some("bind") => MountKind::Bind,
                Some("tmpfs") => MountKind::Tmpfs,
                Some("volume") if config.source.is_none() => MountKind::Anonymous,
                Some("volume") => MountKind::Volume,
                Some(other) => {
                    return Err(ContainerError::InvalidService(format!(
                        "未対応のボリューム種別です: {}",
                        other
                    )));
                }
                None => match &config.source {
                    Some(source) if is_host_path(source) => MountKind::Bind,
                    Some(_) => MountKind::Volume,
                    None => MountKind::Anonymous,
                },
            };
            let source = match (kind, &config.source) {
                (MountKind::Bind, Some(source)) => Some(resolve_host_path(source, working_dir)),
                (_, source) => source.clone(),
            };
            Ok(Mount {
                kind,
                source,
                target: config.target.clone(),
                read_only: config.read_only,
            })
        }
    }
}

fn mount_from_source(source: &str, target: &str, read_only: bool, working_dir: &Path) -> Mount {
    if is_host_path(source) {
        Mount {
            kind: MountKind::Bind,
            source: Some(resolve_host_path(source, working_dir)),
            target: target.to_string(),
            read_only,
        }
    } else {
        Mount {
            kind: MountKind::Volume,
            source: Some(source.to_string()),
            target: target.to_string(),
            read_only,
        }
    }
}

fn is_host_path(source: &str) -> bool {
    source.starts_with('/') || source.starts_with('.') || source.starts_with('~')
}

fn resolve_host_path(source: &str, working_dir: &Path) -> String {
    let path = if let Some(rest) = source.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_default();
        home.join(rest.trim_start_matches('/'))
    } else if source.starts_with('/') {
        PathBuf::from(source)
    } else {
        working_dir.join(source)
    };
    normalize(&path).display().to_string()
}

/// `.` と `..` をファイルシステムに触れずに解決
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{PortConfig, VolumeConfig};

    fn short(spec: &str) -> Vec<PortMapping> {
        parse_port(&PortSpec::Short(spec.to_string())).unwrap()
    }

    #[test]
    fn test_short_port_forms() {
        let ports = short("8080:80");
        assert_eq!(ports[0].host_port, Some(8080));
        assert_eq!(ports[0].container_port, 80);
        assert_eq!(ports[0].container_key(), "80/tcp");

        let ports = short("127.0.0.1:5353:53/udp");
        assert_eq!(ports[0].host_ip.as_deref(), Some("127.0.0.1"));
        assert_eq!(ports[0].protocol, "udp");

        let ports = short("3000");
        assert_eq!(ports[0].host_port, None);

        let ports = short("127.0.0.1::80");
        assert_eq!(ports[0].host_port, None);
        assert_eq!(ports[0].host_ip.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_port_ranges() {
        let ports = short("9000-9002:8000-8002");
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[2].host_port, Some(9002));
        assert_eq!(ports[2].container_port, 8002);

        assert!(parse_port(&PortSpec::Short("9000-9001:80".to_string())).is_err());
        assert!(parse_port(&PortSpec::Short("abc:80".to_string())).is_err());
    }

    #[test]
    fn test_long_port() {
        let spec = PortSpec::Long(PortConfig {
            target: 80,
            published: Some(PortNumber::String("8081".to_string())),
            protocol: None,
            host_ip: None,
        });
        let ports = parse_port(&spec).unwrap();
        assert_eq!(ports[0].host_port, Some(8081));
        assert_eq!(ports[0].protocol, "tcp");
    }

    #[test]
    fn test_volume_forms() {
        let wd = Path::new("/srv/lab");

        let mount = parse_volume(&VolumeSpec::Short("./html:/var/www:ro".to_string()), wd).unwrap();
        assert_eq!(mount.kind, MountKind::Bind);
        assert_eq!(mount.source.as_deref(), Some("/srv/lab/html"));
        assert!(mount.read_only);

        let mount = parse_volume(&VolumeSpec::Short("../shared:/shared".to_string()), wd).unwrap();
        assert_eq!(mount.source.as_deref(), Some("/srv/shared"));

        let mount = parse_volume(&VolumeSpec::Short("db:/var/lib/mysql".to_string()), wd).unwrap();
        assert_eq!(mount.kind, MountKind::Volume);
        assert_eq!(mount.source.as_deref(), Some("db"));

        let mount = parse_volume(&VolumeSpec::Short("/cache".to_string()), wd).unwrap();
        assert_eq!(mount.kind, MountKind::Anonymous);

        let mount = parse_volume(
            &VolumeSpec::Long(VolumeConfig {
                kind: Some("tmpfs".to_string()),
                source: None,
                target: "/tmp".to_string(),
                read_only: false,
            }),
            wd,
        )
        .unwrap();
        assert_eq!(mount.kind, MountKind::Tmpfs);
    }
}
