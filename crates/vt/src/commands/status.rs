use crate::context::AppContext;
use crate::tui;
use std::time::Duration;

pub async fn handle(ctx: AppContext, watch: bool, deadline: Option<u64>) -> anyhow::Result<()> {
    tui::run_monitor(ctx, watch, deadline.map(Duration::from_secs)).await
}
