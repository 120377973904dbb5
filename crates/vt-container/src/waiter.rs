//! サービスの準備完了待機
//!
//! コンテナが Running で、ヘルスチェックがあれば healthy になるまでポーリングします。

use crate::error::Result;
use crate::project::Project;
use crate::runtime::ComposeRuntime;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::debug;
use vt_provider::ServiceStatus;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// 期待数以上のコンテナがあり、すべて準備完了か
///
/// ヘルスチェックのないコンテナは Running であれば準備完了とみなします。
pub fn is_ready(statuses: &[ServiceStatus], expected: usize) -> bool {
    !statuses.is_empty()
        && statuses.len() >= expected
        && statuses.iter().all(ServiceStatus::is_healthy)
}

/// 準備完了まで待機。期限内に揃わなければ `Ok(false)`
pub async fn wait_until_ready<R>(
    runtime: &R,
    project: &Project,
    timeout: Duration,
    interval: Duration,
) -> Result<bool>
where
    R: ComposeRuntime + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let expected = project.compose.services.len();

    loop {
        let statuses = runtime.ps(&project.name).await?;
        if is_ready(&statuses, expected) {
            return Ok(true);
        }

        let pending: Vec<&str> = statuses
            .iter()
            .filter(|s| !s.is_healthy())
            .map(|s| s.service.as_str())
            .collect();
        debug!(project = %project.name, ?pending, "Waiting for services");

        if Instant::now() + interval > deadline {
            return Ok(false);
        }
        sleep(interval).await;
    }
}
