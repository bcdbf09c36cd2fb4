//! pagefeed CLI - page through, persist and cache a remote list
//!
//! This is the main entry point for the pagefeed command-line interface.

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod utils;

use cli::{Cli, Commands};
use utils::context::AppContext;
use utils::logging::initialize_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    let ctx = AppContext::load(cli.config.as_deref())?;
    execute_command(&ctx, cli.command).await
}

async fn execute_command(ctx: &AppContext, command: Commands) -> Result<()> {
    match command {
        Commands::Next { format } => commands::load_page(ctx, false, format).await,
        Commands::Reload { format } => commands::load_page(ctx, true, format).await,
        Commands::List { search, format } => {
            commands::list_sections(ctx, search.as_deref(), format).await
        },
        Commands::Image {
            url,
            output,
            format,
        } => commands::resolve_image(ctx, &url, output.as_deref(), format).await,
        Commands::Status { format } => commands::show_status(ctx, format).await,
    }
}
