//! Image command implementation

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use pagefeed_core::{ImageSlot, ImageState, TokioClock};
use serde_json::json;

use crate::cli::OutputFormat;
use crate::utils::context::AppContext;

/// Resolve `url` through the cache with the configured retry policy.
pub async fn execute(
    ctx: &AppContext,
    url: &str,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let cache = ctx.content_cache()?;
    let local_path = cache.local_path(url)?;
    let was_cached = cache.contains(url).await?;

    let policy = ctx.config.images.retry_policy();
    let mut slot = ImageSlot::with_policy(url, policy, Arc::new(TokioClock));
    let bytes = match slot.load(&cache).await {
        ImageState::Loaded(bytes) => bytes.clone(),
        ImageState::Failed(message) => bail!("{message}"),
        state => bail!("Image ended in unexpected state {state:?}"),
    };

    if let Some(output) = output {
        std::fs::write(output, &bytes)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    match format {
        OutputFormat::Text => {
            let source = if was_cached { "cache" } else { "download" };
            println!("{} ({} bytes, {source})", local_path.display(), bytes.len());
        },
        OutputFormat::Json => {
            let value = json!({
                "url": url,
                "path": local_path,
                "bytes": bytes.len(),
                "cached": was_cached,
                "attempts": slot.attempts(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        },
    }
    Ok(())
}
