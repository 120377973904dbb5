use crate::context::AppContext;
use colored::Colorize;
use tracing::warn;
use vt_provider::RunState;
use vt_state::Deployment;

/// 台帳の行ごとに実際の状態を問い合わせる。失敗時は "unknown"
async fn live_status(ctx: &AppContext, deployment: &Deployment) -> String {
    let Some(provider) = ctx.registry.get(&deployment.provider_name) else {
        warn!(provider = %deployment.provider_name, "Deployment references an unregistered provider");
        return "unknown".to_string();
    };

    let template = match ctx.catalog.get(&deployment.template_id) {
        Ok(template) => template,
        Err(e) => {
            warn!(template = %deployment.template_id, error = %e, "Deployment references a missing template");
            return "unknown".to_string();
        }
    };

    match provider.status(template).await {
        Ok(report) => report.summary(),
        Err(e) => {
            warn!(
                provider = %deployment.provider_name,
                template = %deployment.template_id,
                error = %e,
                "Status query failed"
            );
            "unknown".to_string()
        }
    }
}

pub async fn handle(ctx: &AppContext) -> anyhow::Result<()> {
    let deployments = ctx.ledger.list_deployments().await?;

    if deployments.is_empty() {
        println!("{}", "起動中の環境はありません".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<18} {:<24} {:<28} {}",
            "PROVIDER", "TEMPLATE", "STATUS", "CREATED"
        )
        .bold()
    );
    println!("{}", "─".repeat(95).dimmed());

    for deployment in &deployments {
        let status = live_status(ctx, deployment).await;
        let status_colored = if status.starts_with(&RunState::Running.to_string()) {
            status.green()
        } else if status == "unknown" {
            status.yellow()
        } else {
            status.red()
        };

        println!(
            "{:<18} {:<24} {:<28} {}",
            deployment.provider_name,
            deployment.template_id.cyan(),
            status_colored,
            deployment
                .created_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
