// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! flowspec - pipeline manifest toolkit

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flowspec::cli::{Cli, Commands, Context};
use flowspec::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowspec=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    flowspec::utils::configure_colors();

    let cli = Cli::parse();

    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    let cwd = std::env::current_dir()
        .map_err(|e| miette::miette!("Failed to get current directory: {}", e))?;
    let settings = Settings::load(cli.config.as_deref(), &cwd)?;
    let ctx = Context::new(settings, cli.registry.clone(), cli.verbose);

    match cli.command {
        Commands::Validate { patterns } => flowspec::cli::validate::run(patterns, &ctx).await,
        Commands::Graph { manifest, format } => {
            flowspec::cli::graph::run(manifest, format, &ctx).await
        }
        Commands::Fmt {
            manifest,
            json,
            output,
        } => flowspec::cli::fmt::run(manifest, json, output, &ctx).await,
        Commands::Push { manifest } => flowspec::cli::registry::push(manifest, &ctx).await,
        Commands::Pull {
            identifier,
            provider,
            version,
            output,
        } => flowspec::cli::registry::pull(identifier, provider, version, output, &ctx).await,
        Commands::List => flowspec::cli::registry::list(&ctx).await,
    }
}
