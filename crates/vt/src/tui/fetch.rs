//! モニターから発行される非同期処理
//!
//! どの処理も結果を [`Msg`] として返すだけで、モニターの状態には触れません。

use crate::tui::app::{Action, Msg, TargetRow};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vt_core::{Catalog, Template};
use vt_provider::{Provider, ProviderError, Registry};

/// 表示対象のテンプレートと、それが宣言する登録済みプロバイダーの全組み合わせを問い合わせる
pub async fn fetch_rows(
    catalog: &Catalog,
    registry: &Registry,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Vec<TargetRow> {
    let mut pairs = Vec::new();
    for template in catalog.visible() {
        for name in template.providers.keys() {
            match registry.get(name) {
                Some(provider) => pairs.push((template, provider)),
                None => debug!(template = %template.id, provider = %name, "Provider not registered, skipping"),
            }
        }
    }

    join_all(
        pairs
            .into_iter()
            .map(|(template, provider)| query_row(template, provider, timeout, cancel)),
    )
    .await
}

async fn query_row(
    template: &Template,
    provider: Arc<dyn Provider>,
    timeout: Duration,
    cancel: &CancellationToken,
) -> TargetRow {
    let result = tokio::select! {
        _ = cancel.cancelled() => Err("キャンセルされました".to_string()),
        r = tokio::time::timeout(timeout, provider.status(template)) => match r {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("{}ms 以内に応答がありませんでした", timeout.as_millis())),
        },
    };

    match result {
        Ok(report) => TargetRow::from_report(template, provider.name(), &report),
        Err(error) => {
            warn!(
                template = %template.id,
                provider = %provider.name(),
                error = %error,
                "Status query failed"
            );
            TargetRow::failed(template, provider.name(), error)
        }
    }
}

/// 起動・停止・再起動を実行し、完了メッセージを返す
pub async fn run_action(
    catalog: &Catalog,
    registry: &Registry,
    action: Action,
    template_id: String,
    provider_name: String,
) -> Msg {
    let result = perform(catalog, registry, action, &template_id, &provider_name)
        .await
        .map_err(|e| {
            warn!(template = %template_id, provider = %provider_name, error = %e, "Action failed");
            e.to_string()
        });

    Msg::ActionFinished {
        action,
        template_id,
        result,
    }
}

async fn perform(
    catalog: &Catalog,
    registry: &Registry,
    action: Action,
    template_id: &str,
    provider_name: &str,
) -> anyhow::Result<()> {
    let template = catalog.get(template_id)?;
    let provider = registry.require(provider_name)?;

    match action {
        Action::Start => provider.start(template).await?,
        Action::Stop => provider.stop(template).await?,
        Action::Restart => {
            match provider.stop(template).await {
                Ok(()) | Err(ProviderError::NotRunning { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            provider.start(template).await?;
        }
    }

    Ok(())
}
