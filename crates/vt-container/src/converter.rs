//! Compose サービス定義から Docker API パラメータへの変換

use crate::compose::{Healthcheck, Service, StringOrList};
use crate::error::{ContainerError, Result};
use crate::port::{MountKind, parse_port, parse_volume};
use crate::project::Project;
use bollard::container::{Config, CreateContainerOptions, NetworkingConfig};
use bollard::models::{
    EndpointSettings, HealthConfig, HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum,
};
use std::collections::HashMap;
use std::time::Duration;

/// サービスが使うイメージ名
///
/// `image` がなく `build` がある場合は `<project>-<service>` をタグとして使います。
pub fn image_name(project: &Project, service_name: &str, service: &Service) -> Result<String> {
    match (&service.image, &service.build) {
        (Some(image), _) => Ok(image.clone()),
        (None, Some(_)) => Ok(format!("{}-{}", project.name, service_name)),
        (None, None) => Err(ContainerError::InvalidService(format!(
            "サービス '{}' に image も build も指定されていません",
            service_name
        ))),
    }
}

/// Compose のサービスを Docker のコンテナ設定に変換
pub fn service_to_container_config(
    project: &Project,
    service_name: &str,
) -> Result<(Config<String>, CreateContainerOptions<String>)> {
    let service = project.compose.services.get(service_name).ok_or_else(|| {
        ContainerError::InvalidService(format!("サービス '{}' が定義されていません", service_name))
    })?;

    let image = image_name(project, service_name, service)?;

    let env: Vec<String> = service
        .environment
        .to_map()
        .into_iter()
        .map(|(k, v)| match v {
            Some(v) => format!("{}={}", k, v),
            None => k,
        })
        .collect();

    // ポートバインディング
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();
    for spec in &service.ports {
        for port in parse_port(spec)? {
            let key = port.container_key();
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings
                .entry(key)
                .or_insert_with(|| Some(Vec::new()))
                .get_or_insert_with(Vec::new)
                .push(PortBinding {
                    host_ip: port.host_ip.clone(),
                    host_port: Some(port.host_port.map(|p| p.to_string()).unwrap_or_default()),
                });
        }
    }

    // ボリューム
    let mut binds = Vec::new();
    let mut anonymous = HashMap::new();
    let mut tmpfs = HashMap::new();
    for spec in &service.volumes {
        let mount = parse_volume(spec, &project.working_dir)?;
        let mode = if mount.read_only { "ro" } else { "rw" };
        match (mount.kind, mount.source) {
            (MountKind::Bind, Some(source)) => {
                binds.push(format!("{}:{}:{}", source, mount.target, mode));
            }
            (MountKind::Volume, Some(volume)) => {
                binds.push(format!(
                    "{}:{}:{}",
                    project.volume_name(&volume),
                    mount.target,
                    mode
                ));
            }
            (MountKind::Tmpfs, _) => {
                tmpfs.insert(mount.target, String::new());
            }
            _ => {
                anonymous.insert(mount.target, HashMap::new());
            }
        }
    }

    // ネットワーク（最初のネットワークで作成し、残りは作成後に接続する）
    let networks = project.service_networks(service_name);
    let network_mode = match &service.network_mode {
        Some(mode) => Some(mode.clone()),
        None => networks.first().map(|n| project.network_name(n)),
    };
    let networking_config = networks.first().map(|network| {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            project.network_name(network),
            endpoint_settings(service_name, service, network),
        );
        NetworkingConfig {
            endpoints_config: endpoints,
        }
    });

    let host_config = HostConfig {
        port_bindings: Some(port_bindings),
        binds: Some(binds),
        tmpfs: (!tmpfs.is_empty()).then_some(tmpfs),
        network_mode,
        privileged: Some(service.privileged),
        cap_add: (!service.cap_add.is_empty()).then(|| service.cap_add.clone()),
        cap_drop: (!service.cap_drop.is_empty()).then(|| service.cap_drop.clone()),
        restart_policy: service.restart.as_deref().map(restart_policy),
        ..Default::default()
    };

    let labels: HashMap<String, String> = service
        .labels
        .to_map()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect();

    let config = Config {
        image: Some(image),
        env: Some(env),
        cmd: service.command.as_ref().map(StringOrList::to_vec),
        entrypoint: service.entrypoint.as_ref().map(StringOrList::to_vec),
        exposed_ports: Some(exposed_ports),
        volumes: (!anonymous.is_empty()).then_some(anonymous),
        healthcheck: service
            .healthcheck
            .as_ref()
            .map(health_config)
            .transpose()?,
        host_config: Some(host_config),
        labels: Some(labels),
        user: service.user.clone(),
        working_dir: service.working_dir.clone(),
        hostname: service.hostname.clone(),
        tty: Some(service.tty),
        open_stdin: Some(service.stdin_open),
        networking_config,
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: project.container_name(service_name),
        platform: None,
    };

    Ok((config, options))
}

/// ネットワーク接続設定（サービス名をエイリアスにする）
pub fn endpoint_settings(service_name: &str, service: &Service, network: &str) -> EndpointSettings {
    let mut aliases = vec![service_name.to_string()];
    aliases.extend(service.networks.aliases(network));
    EndpointSettings {
        aliases: Some(aliases),
        ..Default::default()
    }
}

fn restart_policy(policy: &str) -> RestartPolicy {
    let (name, retries) = policy.split_once(':').unwrap_or((policy, ""));
    let name = match name {
        "always" => RestartPolicyNameEnum::ALWAYS,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        _ => RestartPolicyNameEnum::NO,
    };
    RestartPolicy {
        name: Some(name),
        maximum_retry_count: retries.parse().ok(),
    }
}

fn health_config(healthcheck: &Healthcheck) -> Result<HealthConfig> {
    if healthcheck.disable {
        return Ok(HealthConfig {
            test: Some(vec!["NONE".to_string()]),
            ..Default::default()
        });
    }

    let test = healthcheck.test.as_ref().map(|test| match test {
        StringOrList::String(command) => vec!["CMD-SHELL".to_string(), command.clone()],
        StringOrList::List(list) => list.clone(),
    });

    let nanos = |value: &Option<String>| -> Result<Option<i64>> {
        value
            .as_deref()
            .map(|v| parse_duration(v).map(|d| d.as_nanos() as i64))
            .transpose()
    };

    Ok(HealthConfig {
        test,
        interval: nanos(&healthcheck.interval)?,
        timeout: nanos(&healthcheck.timeout)?,
        retries: healthcheck.retries,
        start_period: nanos(&healthcheck.start_period)?,
        ..Default::default()
    })
}

/// Compose の期間表記を解析（`30s`, `1m30s`, `500ms`, `1h`）
pub fn parse_duration(value: &str) -> Result<Duration> {
    let invalid = || ContainerError::InvalidService(format!("不正な期間指定です: {}", value));

    let value = value.trim();
    if value.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = value;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: f64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let seconds = match &rest[..unit_len] {
            "ns" => amount / 1_000_000_000.0,
            "us" | "µs" => amount / 1_000_000.0,
            "ms" => amount / 1_000.0,
            "s" | "" => amount,
            "m" => amount * 60.0,
            "h" => amount * 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += Duration::from_secs_f64(seconds);
    }

    Ok(total)
}
