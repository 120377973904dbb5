use crate::context::AppContext;
use colored::Colorize;

pub async fn handle(ctx: &AppContext, provider_name: &str, id: &str) -> anyhow::Result<()> {
    let template = ctx.catalog.get(id)?;
    let provider = ctx.registry.require(provider_name)?;

    println!(
        "{}",
        format!("'{}' を停止中...", template.info.name).yellow()
    );

    provider.stop(template).await?;

    println!();
    println!(
        "{}",
        format!("✓ '{}' を停止しました", template.id).green().bold()
    );
    Ok(())
}
