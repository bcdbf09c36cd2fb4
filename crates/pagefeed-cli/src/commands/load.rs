//! `next` and `reload` commands

use anyhow::{Result, bail};
use colored::Colorize;
use pagefeed_core::{RequestOutcome, SkipReason};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::utils::context::AppContext;

/// Load the next page, or reload from the first page when `force` is set.
///
/// An empty store always starts with a first-page load.
pub async fn execute(ctx: &AppContext, force: bool, format: OutputFormat) -> Result<()> {
    let controller = ctx.controller(None)?;

    let outcome = if force {
        controller.request_reload().await?
    } else {
        match controller.load_initial().await? {
            Some(outcome) => outcome,
            None => controller.request_next_page().await?,
        }
    };

    let pages = controller.current_pages().await?;
    let total_items: usize = pages.iter().map(|page| page.items.len()).sum();

    match format {
        OutputFormat::Text => {
            let line = outcome.to_string();
            match &outcome {
                RequestOutcome::Applied { .. } => println!("{}", line.green()),
                RequestOutcome::Failed(_) => eprintln!("{}", line.red()),
                _ => println!("{}", line.yellow()),
            }
            println!("{} pages, {} items stored", pages.len(), total_items);
        },
        OutputFormat::Json => {
            let (key, items, message) = match &outcome {
                RequestOutcome::Applied { key, items } => (Some(key.to_string()), Some(*items), None),
                RequestOutcome::Failed(message) => (None, None, Some(message.as_str())),
                _ => (None, None, None),
            };
            let value = json!({
                "outcome": outcome_label(&outcome),
                "key": key,
                "items": items,
                "message": message,
                "pages": pages.len(),
                "totalItems": total_items,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
    }

    if let RequestOutcome::Failed(message) = outcome {
        bail!("Page load failed: {message}");
    }
    Ok(())
}

const fn outcome_label(outcome: &RequestOutcome) -> &'static str {
    match outcome {
        RequestOutcome::Applied { .. } => "applied",
        RequestOutcome::Skipped(SkipReason::Duplicate) => "duplicate",
        RequestOutcome::Skipped(SkipReason::InFlight) => "in_flight",
        RequestOutcome::Skipped(SkipReason::Exhausted) => "exhausted",
        RequestOutcome::Stale => "stale",
        RequestOutcome::Failed(_) => "failed",
    }
}
