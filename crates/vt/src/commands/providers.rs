use crate::context::AppContext;
use colored::Colorize;

pub fn handle(ctx: &AppContext) -> anyhow::Result<()> {
    println!("{}", "登録済みプロバイダー:".bold());
    for name in ctx.registry.names() {
        println!("  - {}", name.cyan());
    }
    Ok(())
}
