//! Status command implementation

use anyhow::Result;
use colored::Colorize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::utils::context::AppContext;

/// Summarize what is stored locally.
pub async fn execute(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let controller = ctx.controller(None)?;
    let pages = controller.current_pages().await?;
    let stored_items: usize = pages.iter().map(|page| page.items.len()).sum();
    let last = pages.last();
    let total = last.map(|page| page.total_count);
    let has_more = last.is_none_or(|page| page.next_cursor.is_some());
    let data_dir = ctx.data_dir()?;
    let cache_dir = ctx.cache_dir()?;

    match format {
        OutputFormat::Text => {
            println!("{}", ctx.config.api.resource.bold());
            println!("  Pages:      {}", pages.len());
            match total {
                Some(total) => println!("  Items:      {stored_items} of {total}"),
                None => println!("  Items:      {stored_items}"),
            }
            println!("  More pages: {}", if has_more { "yes" } else { "no" });
            println!("  Data:       {}", data_dir.display());
            println!("  Cache:      {}", cache_dir.display());
        },
        OutputFormat::Json => {
            let value = json!({
                "resource": ctx.config.api.resource,
                "pages": pages.len(),
                "storedItems": stored_items,
                "totalItems": total,
                "hasMore": has_more,
                "dataDir": data_dir,
                "cacheDir": cache_dir,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
    }
    Ok(())
}
