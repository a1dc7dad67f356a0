//! ArticleForge CLI — keyword-to-article batch generation tool.
//!
//! Expands a seed keyword into sub-keywords, generates one article per
//! keyword through a bounded-concurrency batch, and exports the result.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
