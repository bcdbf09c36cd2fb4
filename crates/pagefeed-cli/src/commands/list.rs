//! List command implementation

use anyhow::Result;
use colored::Colorize;

use crate::cli::OutputFormat;
use crate::utils::context::AppContext;

/// Print stored items grouped by initial.
pub async fn execute(ctx: &AppContext, search: Option<&str>, format: OutputFormat) -> Result<()> {
    let controller = ctx.controller(search)?;
    let sections = controller.sections().await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sections)?),
        OutputFormat::Text if sections.is_empty() => {
            if controller.current_pages().await?.is_empty() {
                println!("No pages stored. Use 'pagefeed next' to load one.");
            } else {
                println!("No items match '{}'.", controller.search_text());
            }
        },
        OutputFormat::Text => {
            for section in &sections {
                println!("{}", section.initial.bold().cyan());
                for item in &section.items {
                    println!("  {:>5}  {}", item.id.to_string().dimmed(), item.name);
                }
            }
        },
    }
    Ok(())
}
