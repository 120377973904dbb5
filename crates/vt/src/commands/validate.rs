use colored::Colorize;
use std::path::Path;

pub fn handle(templates_dir: &Path) -> anyhow::Result<()> {
    println!("{}", "テンプレートを検証中...".blue());
    println!(
        "テンプレートディレクトリ: {}",
        templates_dir.display().to_string().cyan()
    );
    println!();

    let report = vt_core::validate_root(templates_dir)?;

    for id in &report.passed {
        println!("  {} {}", "✓".green(), id);
    }
    for (name, error) in &report.failures {
        println!("  {} {}", "✗".red(), name.red());
        for line in error.to_string().lines() {
            println!("      {}", line);
        }
    }

    println!();
    if report.is_ok() {
        println!(
            "{}",
            format!("✓ {}個のテンプレートはすべて正常です", report.total())
                .green()
                .bold()
        );
        return Ok(());
    }

    eprintln!(
        "{}",
        format!(
            "✗ {}個中{}個のテンプレートにエラーがあります",
            report.total(),
            report.failures.len()
        )
        .red()
        .bold()
    );
    std::process::exit(1);
}
