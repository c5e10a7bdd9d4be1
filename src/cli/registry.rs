// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Registry commands - push, pull and list against the local service

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::{emit, Context};
use crate::pipeline::{Manifest, Pipeline};
use crate::service::{resolve_operators, LocalService, PipelineService};
use crate::utils::{print_header, print_success};

fn open(ctx: &Context) -> Result<LocalService> {
    let root = ctx.settings.registry_dir();
    if ctx.verbose {
        println!("{} {}", "Registry:".dimmed(), root.display());
    }
    Ok(LocalService::new(root)?)
}

/// Publish a manifest
pub async fn push(manifest_path: PathBuf, ctx: &Context) -> Result<()> {
    let service = open(ctx)?;
    let manifest = Manifest::from_file(&manifest_path)?;
    let catalog = resolve_operators(&manifest, &service).await?;
    let pipeline = Pipeline::from_manifest_with(manifest, &catalog)?;

    let id = pipeline.publish(&service).await?;
    print_success(&format!("Published {} as {}", pipeline.metadata().key(), id.bold()));
    Ok(())
}

/// Fetch a published manifest
pub async fn pull(
    identifier: String,
    provider: Option<String>,
    version: String,
    output: Option<PathBuf>,
    ctx: &Context,
) -> Result<()> {
    let provider = provider
        .or_else(|| ctx.settings.provider.clone())
        .ok_or_else(|| miette::miette!("No provider given and none set in the settings file"))?;

    let service = open(ctx)?;
    let pipeline = Pipeline::load(&service, &service, &identifier, &provider, &version).await?;
    emit(&pipeline.to_yaml()?, output.as_deref())
}

/// List published pipelines
pub async fn list(ctx: &Context) -> Result<()> {
    let service = open(ctx)?;
    let records = service.list_pipelines().await?;

    if records.is_empty() {
        println!("No pipelines published.");
        return Ok(());
    }

    print_header("Published pipelines");
    for record in &records {
        println!("  {}  {}", record.id.dimmed(), record.metadata.key());
    }
    Ok(())
}
