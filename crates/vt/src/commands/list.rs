use crate::context::AppContext;
use colored::Colorize;

pub fn handle(ctx: &AppContext, filter: Option<&str>) -> anyhow::Result<()> {
    let templates = match filter {
        Some(term) => ctx.catalog.filter(term),
        None => ctx.catalog.visible(),
    };

    if templates.is_empty() {
        match filter {
            Some(term) => println!(
                "{}",
                format!("'{}' に一致するテンプレートはありません", term).dimmed()
            ),
            None => println!("{}", "テンプレートがありません".dimmed()),
        }
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<24} {:<28} {:<16} {:<24} {:<24} {}",
            "ID", "NAME", "AUTHOR", "TECHNOLOGIES", "TAGS", "PROVIDERS"
        )
        .bold()
    );
    println!("{}", "─".repeat(130).dimmed());

    for template in &templates {
        let providers: Vec<&str> = template.providers.keys().map(String::as_str).collect();
        println!(
            "{:<24} {:<28} {:<16} {:<24} {:<24} {}",
            template.id.cyan(),
            template.info.name,
            template.info.author,
            template.info.technologies.join(", "),
            template.info.tags.join(", "),
            providers.join(", ").dimmed()
        );
    }

    println!();
    println!("{}個のテンプレート", templates.len());
    Ok(())
}
