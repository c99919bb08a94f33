//! signoff-cli: publish inspection reports and request PDF conversions.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;

use clap::Parser;
use serde::Serialize;

use args::{Cli, Commands};
use client::{CliError, Ctx, build_ctx_from_cli, read_report};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = build_ctx_from_cli(&cli)?;
    run(&ctx, cli.command).await
}

async fn run(ctx: &Ctx, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Publish { file, force } => {
            let mut report = read_report(&file).await?;
            report.force |= force;
            print_json(&ctx.publish(&report).await?)
        }
        Commands::Pdf { url, provider } => print_json(&ctx.pdf(&url, provider).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Server(format!("failed to format response: {e}")))?;
    println!("{text}");
    Ok(())
}
