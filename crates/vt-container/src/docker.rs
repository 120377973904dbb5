//! bollard による Docker Engine 実装
//!
//! すべてのデーモン呼び出しは `daemon_timeout` で打ち切られます。

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::build;
use crate::converter::{endpoint_settings, image_name, service_to_container_config};
use crate::error::{ContainerError, Result};
use crate::labels;
use crate::project::{BUILTIN_NETWORKS, Project};
use crate::runtime::{ComposeRuntime, TeardownReport};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::ListContainersOptions;
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerStateStatusEnum, ContainerSummary, CreateImageInfo, HealthStatusEnum,
    NetworkConnectRequest, NetworkCreateRequest, PortTypeEnum, VolumeCreateOptions,
};
use bollard::query_parameters::{
    InspectContainerOptions, RemoveContainerOptions, RemoveVolumeOptions, StartContainerOptions,
    StopContainerOptions,
};
use chrono::DateTime;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use vt_config::ComposeSettings;
use vt_provider::ServiceStatus;

/// Docker Engine 上で Compose プロジェクトを動かすランタイム
pub struct DockerRuntime {
    docker: OnceCell<Docker>,
    daemon_timeout: Duration,
}

impl DockerRuntime {
    /// 接続は最初の呼び出し時に行われる
    pub fn new(daemon_timeout: Duration) -> Self {
        Self {
            docker: OnceCell::new(),
            daemon_timeout,
        }
    }

    /// 接続済みのクライアントを取得（初回は接続と ping を行う）
    async fn docker(&self) -> Result<&Docker> {
        self.docker
            .get_or_try_init(|| async {
                let docker = Docker::connect_with_local_defaults()?;
                let pong = self.timed("ping", docker.ping()).await?;
                if let Err(e) = pong {
                    return Err(ContainerError::DockerConnectionFailed(e.to_string()));
                }
                debug!("Connected to Docker daemon");
                Ok::<Docker, ContainerError>(docker)
            })
            .await
    }

    /// デーモン呼び出しにタイムアウトを適用
    async fn timed<F, T>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(self.daemon_timeout, fut)
            .await
            .map_err(|_| ContainerError::Timeout {
                operation: operation.to_string(),
                secs: self.daemon_timeout.as_secs(),
            })
    }

    async fn create_networks(&self, docker: &Docker, project: &Project) -> Result<()> {
        for network in project.managed_networks() {
            let name = project.network_name(&network);
            let driver = project
                .compose
                .networks
                .get(&network)
                .and_then(|d| d.as_ref())
                .and_then(|d| d.driver.clone())
                .unwrap_or_else(|| "bridge".to_string());

            let mut network_labels: HashMap<String, String> =
                project.project_labels().into_iter().collect();
            network_labels.insert(labels::COMPOSE_NETWORK.to_string(), network.clone());

            let request = NetworkCreateRequest {
                name: name.clone(),
                driver: Some(driver),
                labels: Some(network_labels),
                ..Default::default()
            };

            match self
                .timed("create network", docker.create_network(request))
                .await?
            {
                Ok(_) => info!(network = %name, "Network created"),
                Err(BollardError::DockerResponseServerError {
                    status_code: 409, ..
                }) => debug!(network = %name, "Network already exists"),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn create_volumes(&self, docker: &Docker, project: &Project) -> Result<()> {
        for volume in project.managed_volumes() {
            let name = project.volume_name(&volume);
            let driver = project
                .compose
                .volumes
                .get(&volume)
                .and_then(|d| d.as_ref())
                .and_then(|d| d.driver.clone());

            let mut volume_labels: HashMap<String, String> =
                project.project_labels().into_iter().collect();
            volume_labels.insert(labels::COMPOSE_VOLUME.to_string(), volume.clone());

            let options = VolumeCreateOptions {
                name: Some(name.clone()),
                driver,
                labels: Some(volume_labels),
                ..Default::default()
            };

            self.timed("create volume", docker.create_volume(options))
                .await??;
            debug!(volume = %name, "Volume ready");
        }
        Ok(())
    }

    /// イメージを用意する（ビルド・pull）
    async fn ensure_image(&self, docker: &Docker, project: &Project, service_name: &str) -> Result<()> {
        let Some(service) = project.compose.services.get(service_name) else {
            return Ok(());
        };
        let image = image_name(project, service_name, service)?;
        let policy = service.pull_policy.as_deref();

        if let Some(build_spec) = &service.build {
            if policy == Some("build") || !self.image_exists(docker, &image).await? {
                build::build_image(docker, &project.working_dir, &build_spec.config(), &image)
                    .await?;
            }
            return Ok(());
        }

        let exists = self.image_exists(docker, &image).await?;
        match policy {
            Some("always") => self.pull_image(docker, &image).await,
            Some("never") if !exists => Err(ContainerError::ImageNotFound {
                image,
                reason: "pull_policy: never".to_string(),
            }),
            _ if !exists => self.pull_image(docker, &image).await,
            _ => Ok(()),
        }
    }

    async fn image_exists(&self, docker: &Docker, image: &str) -> Result<bool> {
        match self
            .timed("inspect image", docker.inspect_image(image))
            .await?
        {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// イメージを pull（ダウンロードはタイムアウトの対象外）
    async fn pull_image(&self, docker: &Docker, image: &str) -> Result<()> {
        let (from_image, tag) = parse_image_tag(image);
        info!(image = %image, "Pulling image");

        let options = bollard::image::CreateImageOptions {
            from_image,
            tag,
            ..Default::default()
        };
        let mut stream =
            docker.create_image(Some(options), None, None::<bollard::auth::DockerCredentials>);

        while let Some(info) = stream.next().await {
            match info {
                Ok(CreateImageInfo {
                    status: Some(status),
                    progress,
                    ..
                }) => debug!(image = %image, progress = ?progress, "{}", status),
                Ok(_) => {}
                Err(e) => {
                    return Err(ContainerError::ImageNotFound {
                        image: image.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(image = %image, "Image pulled");
        Ok(())
    }

    async fn start_service(&self, docker: &Docker, project: &Project, service_name: &str) -> Result<()> {
        let (config, options) = service_to_container_config(project, service_name)?;
        let container_name = options.name.clone();

        // 前回の残骸を削除
        match self
            .timed(
                "remove container",
                docker.remove_container(
                    &container_name,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                ),
            )
            .await?
        {
            Ok(_) => debug!(container = %container_name, "Removed stale container"),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(e.into()),
        }

        self.timed(
            "create container",
            docker.create_container(Some(options), config),
        )
        .await??;

        // 2つ目以降のネットワークに接続
        if let Some(service) = project.compose.services.get(service_name) {
            if service.network_mode.is_none() {
                for network in project.service_networks(service_name).iter().skip(1) {
                    let request = NetworkConnectRequest {
                        container: Some(container_name.clone()),
                        endpoint_config: Some(endpoint_settings(service_name, service, network)),
                    };
                    self.timed(
                        "connect network",
                        docker.connect_network(&project.network_name(network), request),
                    )
                    .await??;
                }
            }
        }

        self.timed(
            "start container",
            docker.start_container(&container_name, None::<StartContainerOptions>),
        )
        .await??;

        info!(service = %service_name, container = %container_name, "Service started");
        Ok(())
    }

    /// プロジェクトラベルで全コンテナ（停止中を含む）を列挙
    async fn list_project_containers(
        &self,
        docker: &Docker,
        project_name: &str,
    ) -> Result<Vec<ContainerSummary>> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            vec![labels::project_filter(project_name)],
        );

        let options = ListContainersOptions {
            all: true,
            filters,
            ..Default::default()
        };

        Ok(self
            .timed("list containers", docker.list_containers(Some(options)))
            .await??)
    }

    /// コンテナを停止して削除。削除できたら true
    async fn remove_container(
        &self,
        docker: &Docker,
        name: &str,
        settings: &ComposeSettings,
    ) -> Result<bool> {
        let stop = StopContainerOptions {
            t: Some(settings.stop_timeout_secs as i32),
            ..Default::default()
        };
        // 停止猶予の分だけタイムアウトを延ばす
        let stop_timeout = self.daemon_timeout + Duration::from_secs(settings.stop_timeout_secs);
        match tokio::time::timeout(stop_timeout, docker.stop_container(name, Some(stop))).await {
            Ok(Ok(_)) => debug!(container = %name, "Container stopped"),
            Ok(Err(BollardError::DockerResponseServerError {
                status_code: 304 | 404,
                ..
            })) => {}
            Ok(Err(e)) => warn!(container = %name, error = %e, "Failed to stop container"),
            Err(_) => warn!(container = %name, "Timed out stopping container"),
        }

        let remove = RemoveContainerOptions {
            force: true,
            v: settings.remove_volumes,
            ..Default::default()
        };
        match self
            .timed("remove container", docker.remove_container(name, Some(remove)))
            .await?
        {
            Ok(_) => Ok(true),
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn inspect_status(
        &self,
        docker: &Docker,
        summary: ContainerSummary,
    ) -> Result<Option<ServiceStatus>> {
        let Some(id) = summary.id.clone() else {
            return Ok(None);
        };

        let inspect = match self
            .timed(
                "inspect container",
                docker.inspect_container(&id, None::<InspectContainerOptions>),
            )
            .await?
        {
            Ok(inspect) => inspect,
            // 列挙後に削除された
            Err(BollardError::DockerResponseServerError {
                status_code: 404, ..
            }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let state = inspect.state.as_ref();
        let lifecycle = state
            .and_then(|s| s.status.as_ref())
            .map(state_name)
            .unwrap_or("unknown");
        let health = state
            .and_then(|s| s.health.as_ref())
            .and_then(|h| h.status.as_ref())
            .and_then(health_name)
            .map(String::from);

        let name = summary
            .names
            .as_ref()
            .and_then(|n| n.first())
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();
        let service = summary
            .labels
            .as_ref()
            .and_then(|l| l.get(labels::COMPOSE_SERVICE))
            .cloned()
            .unwrap_or_default();

        let ports = summary
            .ports
            .as_ref()
            .map(|ports| {
                let mut rendered: Vec<String> = ports
                    .iter()
                    .filter_map(|p| {
                        let public = p.public_port.filter(|port| *port != 0)?;
                        Some(format!(
                            "{}:{}/{}",
                            public,
                            p.private_port,
                            p.typ.as_ref().map(port_type_name).unwrap_or("tcp")
                        ))
                    })
                    .collect();
                // IPv4/IPv6 で同じバインディングが2回返る
                rendered.dedup();
                rendered
            })
            .unwrap_or_default();

        Ok(Some(ServiceStatus {
            id: id.chars().take(12).collect(),
            name,
            service,
            state: lifecycle.to_string(),
            status: summary.status.clone().unwrap_or_default(),
            health,
            ports,
            created: summary
                .created
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }))
    }
}

#[async_trait]
impl ComposeRuntime for DockerRuntime {
    #[instrument(skip_all, fields(project = %project.name))]
    async fn up(&self, project: &Project, _settings: &ComposeSettings) -> Result<()> {
        let order = project.service_order()?;
        let docker = self.docker().await?;

        self.create_networks(docker, project).await?;
        self.create_volumes(docker, project).await?;

        for service_name in &order {
            self.ensure_image(docker, project, service_name).await?;
            self.start_service(docker, project, service_name).await?;
        }

        info!(services = order.len(), "Project is up");
        Ok(())
    }

    #[instrument(skip_all, fields(project = %project.name))]
    async fn down(&self, project: &Project, settings: &ComposeSettings) -> Result<TeardownReport> {
        let docker = self.docker().await?;
        let mut report = TeardownReport::default();

        let declared: Vec<String> = project
            .compose
            .services
            .keys()
            .map(|s| project.container_name(s))
            .collect();

        let containers = if settings.remove_orphans {
            match self.list_project_containers(docker, &project.name).await {
                Ok(found) => {
                    let mut names: Vec<String> = found
                        .iter()
                        .filter_map(|c| c.names.as_ref()?.first().cloned())
                        .map(|n| n.trim_start_matches('/').to_string())
                        .collect();
                    // ラベルのない同名コンテナも対象にする
                    for name in &declared {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                    names
                }
                Err(e) => {
                    warn!(error = %e, "Failed to list project containers, using declared services");
                    declared
                }
            }
        } else {
            declared
        };

        for name in &containers {
            match self.remove_container(docker, name, settings).await {
                Ok(true) => {
                    info!(container = %name, "Container removed");
                    report.removed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(container = %name, error = %e, "Failed to remove container");
                    report.failed += 1;
                }
            }
        }

        for network in project.managed_networks() {
            let name = project.network_name(&network);
            if BUILTIN_NETWORKS.contains(&name.as_str()) {
                continue;
            }
            match self
                .timed("remove network", docker.remove_network(&name))
                .await
            {
                Ok(Ok(_)) => {
                    info!(network = %name, "Network removed");
                    report.removed += 1;
                }
                Ok(Err(BollardError::DockerResponseServerError {
                    status_code: 404, ..
                })) => {}
                Ok(Err(e)) => {
                    warn!(network = %name, error = %e, "Failed to remove network");
                    report.failed += 1;
                }
                Err(e) => {
                    warn!(network = %name, error = %e, "Failed to remove network");
                    report.failed += 1;
                }
            }
        }

        if settings.remove_volumes {
            for volume in project.managed_volumes() {
                let name = project.volume_name(&volume);
                match self
                    .timed(
                        "remove volume",
                        docker.remove_volume(&name, None::<RemoveVolumeOptions>),
                    )
                    .await
                {
                    Ok(Ok(_)) => {
                        info!(volume = %name, "Volume removed");
                        report.removed += 1;
                    }
                    Ok(Err(BollardError::DockerResponseServerError {
                        status_code: 404, ..
                    })) => {}
                    Ok(Err(e)) => {
                        warn!(volume = %name, error = %e, "Failed to remove volume");
                        report.failed += 1;
                    }
                    Err(e) => {
                        warn!(volume = %name, error = %e, "Failed to remove volume");
                        report.failed += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn ps(&self, project_name: &str) -> Result<Vec<ServiceStatus>> {
        let docker = self.docker().await?;
        let containers = self.list_project_containers(docker, project_name).await?;

        let mut statuses = Vec::with_capacity(containers.len());
        for summary in containers {
            if let Some(status) = self.inspect_status(docker, summary).await? {
                statuses.push(status);
            }
        }
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(statuses)
    }
}

/// イメージ名とタグを分離
///
/// 例: `redis:7-alpine` → (`redis`, `7-alpine`)、`localhost:5000/app` → (`localhost:5000/app`, `latest`)
pub fn parse_image_tag(image: &str) -> (&str, &str) {
    if image.contains('@') {
        return (image, "");
    }
    match image.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (image, "latest"),
    }
}

fn state_name(status: &ContainerStateStatusEnum) -> &'static str {
    match status {
        ContainerStateStatusEnum::CREATED => "created",
        ContainerStateStatusEnum::RUNNING => "running",
        ContainerStateStatusEnum::PAUSED => "paused",
        ContainerStateStatusEnum::RESTARTING => "restarting",
        ContainerStateStatusEnum::REMOVING => "removing",
        ContainerStateStatusEnum::EXITED => "exited",
        ContainerStateStatusEnum::DEAD => "dead",
        _ => "unknown",
    }
}

fn health_name(status: &HealthStatusEnum) -> Option<&'static str> {
    match status {
        HealthStatusEnum::HEALTHY => Some("healthy"),
        HealthStatusEnum::UNHEALTHY => Some("unhealthy"),
        HealthStatusEnum::STARTING => Some("starting"),
        _ => None,
    }
}

fn port_type_name(typ: &PortTypeEnum) -> &'static str {
    match typ {
        PortTypeEnum::UDP => "udp",
        PortTypeEnum::SCTP => "sctp",
        _ => "tcp",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::tempdir;
    use vt_core::{Info, Template};

    #[test]
    fn test_parse_image_tag() {
        assert_eq!(parse_image_tag("redis:7-alpine"), ("redis", "7-alpine"));
        assert_eq!(parse_image_tag("nginx"), ("nginx", "latest"));
        assert_eq!(
            parse_image_tag("localhost:5000/app"),
            ("localhost:5000/app", "latest")
        );
        assert_eq!(
            parse_image_tag("ghcr.io/owner/app:1.2"),
            ("ghcr.io/owner/app", "1.2")
        );
    }

    #[test]
    fn test_enum_names() {
        assert_eq!(state_name(&ContainerStateStatusEnum::RUNNING), "running");
        assert_eq!(state_name(&ContainerStateStatusEnum::EXITED), "exited");
        assert_eq!(health_name(&HealthStatusEnum::HEALTHY), Some("healthy"));
        assert_eq!(health_name(&HealthStatusEnum::NONE), None);
        assert_eq!(port_type_name(&PortTypeEnum::UDP), "udp");
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要
    async fn test_up_ps_down() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("vt-runtime-test");
        fs::create_dir_all(&dir).unwrap();
        let compose = dir.join("docker-compose.yaml");
        fs::write(
            &compose,
            "services:\n  web:\n    image: nginx:alpine\n    ports: [\"18080:80\"]\n",
        )
        .unwrap();

        let mut project = project::load_project(&compose, "vt-runtime-test").unwrap();
        let template = Template {
            id: "vt-runtime-test".to_string(),
            info: Info::default(),
            providers: BTreeMap::new(),
        };
        project::apply_template_config(&mut project, &template);
        let runtime = DockerRuntime::new(Duration::from_secs(30));
        let settings = ComposeSettings::default();

        runtime.up(&project, &settings).await.unwrap();
        let statuses = runtime.ps(&project.name).await.unwrap();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].is_running());

        let report = runtime.down(&project, &settings).await.unwrap();
        assert!(report.is_clean());
        assert!(runtime.ps(&project.name).await.unwrap().is_empty());
    }
}
