//! `build:` 指定のあるサービスのイメージビルド

use crate::compose::BuildConfig;
use crate::error::{ContainerError, Result};
use bollard::Docker;
use flate2::Compression;
use flate2::write::GzEncoder;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use tar::Builder;
use tracing::{debug, info, warn};

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;

/// ビルドコンテキストを tar.gz アーカイブとして作成
pub fn create_context(context_path: &Path) -> Result<Vec<u8>> {
    debug!(context = %context_path.display(), "Creating build context");

    let mut archive_data = Vec::new();
    {
        let encoder = GzEncoder::new(&mut archive_data, Compression::default());
        let mut tar = Builder::new(encoder);
        tar.append_dir_all(".", context_path)?;
        tar.into_inner()?.finish()?;
    }

    debug!(bytes = archive_data.len(), "Build context created");
    if archive_data.len() > MAX_CONTEXT_SIZE {
        warn!(
            "ビルドコンテキストが大きすぎます（{}MB）。.dockerignore で不要なファイルを除外してください",
            archive_data.len() / 1024 / 1024
        );
    }

    Ok(archive_data)
}

/// サービスのイメージをビルドして `tag` を付与
///
/// `context` は Compose ファイルのディレクトリからの相対パスとして解決されます。
pub async fn build_image(
    docker: &Docker,
    working_dir: &Path,
    config: &BuildConfig,
    tag: &str,
) -> Result<()> {
    let context_dir = working_dir.join(config.context.as_deref().unwrap_or("."));
    let dockerfile = config.dockerfile.as_deref().unwrap_or("Dockerfile");

    if !context_dir.join(dockerfile).is_file() {
        return Err(ContainerError::BuildFailed {
            image: tag.to_string(),
            reason: format!(
                "{} が見つかりません",
                context_dir.join(dockerfile).display()
            ),
        });
    }

    info!(image = %tag, context = %context_dir.display(), "Building image");
    let context = create_context(&context_dir)?;

    let args: HashMap<String, String> = config
        .args
        .to_map()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();
    let build_args: HashMap<&str, &str> = args
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    #[allow(deprecated)]
    let options = bollard::image::BuildImageOptions {
        dockerfile,
        t: tag,
        buildargs: build_args,
        target: config.target.as_deref().unwrap_or(""),
        rm: true,
        forcerm: true,
        ..Default::default()
    };

    use bytes::Bytes;
    use http_body_util::{Either, Full};
    let body = Full::new(Bytes::from(context));
    let mut stream = docker.build_image(options, None, Some(Either::Left(body)));

    while let Some(msg) = stream.next().await {
        let output = msg.map_err(|e| ContainerError::BuildFailed {
            image: tag.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(line) = output.stream.as_deref().map(str::trim_end) {
            if !line.is_empty() {
                debug!(image = %tag, "{}", line);
            }
        }

        if let Some(error) = output.error {
            return Err(ContainerError::BuildFailed {
                image: tag.to_string(),
                reason: error,
            });
        }
        if let Some(detail) = output.error_detail {
            return Err(ContainerError::BuildFailed {
                image: tag.to_string(),
                reason: detail
                    .message
                    .unwrap_or_else(|| "Unknown build error".to_string()),
            });
        }
    }

    info!(image = %tag, "Image built");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_create_context() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        fs::create_dir(temp_dir.path().join("app")).unwrap();
        fs::write(temp_dir.path().join("app").join("index.php"), "<?php").unwrap();

        let archive = create_context(temp_dir.path()).unwrap();

        let extract_dir = tempdir().unwrap();
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        tar::Archive::new(decoder).unpack(extract_dir.path()).unwrap();

        assert!(extract_dir.path().join("Dockerfile").exists());
        assert!(extract_dir.path().join("app").join("index.php").exists());
    }

    #[tokio::test]
    #[ignore] // Docker接続が必要
    async fn test_build_image() {
        let docker = Docker::connect_with_local_defaults().unwrap();
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("Dockerfile"), "FROM alpine:latest\n").unwrap();

        build_image(
            &docker,
            temp_dir.path(),
            &BuildConfig::default(),
            "vt-build-test:latest",
        )
        .await
        .unwrap();

        docker
            .remove_image(
                "vt-build-test:latest",
                None::<bollard::query_parameters::RemoveImageOptions>,
                None,
            )
            .await
            .ok();
    }
}
