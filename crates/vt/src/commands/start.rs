use crate::context::AppContext;
use colored::Colorize;
use tracing::warn;
use vt_provider::endpoints;

pub async fn handle(ctx: &AppContext, provider_name: &str, id: &str) -> anyhow::Result<()> {
    let template = ctx.catalog.get(id)?;
    let provider = ctx.registry.require(provider_name)?;

    println!(
        "{}",
        format!("'{}' を {} で起動中...", template.info.name, provider_name).green()
    );

    provider.start(template).await?;

    println!();
    println!(
        "{}",
        format!("✓ '{}' を起動しました", template.id).green().bold()
    );

    match provider.status(template).await {
        Ok(report) => {
            println!("  状態: {}", report.summary());
            let urls = endpoints(&report.ports());
            if !urls.is_empty() {
                println!("  エンドポイント:");
                for url in urls {
                    println!("    {}", url.cyan());
                }
            }
        }
        Err(e) => warn!(template = %template.id, error = %e, "Status after start failed"),
    }

    Ok(())
}
