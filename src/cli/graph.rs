// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Graph command - visualize the step graph of a manifest

use miette::Result;
use std::path::PathBuf;

use super::{Context, GraphFormat};
use crate::pipeline::Pipeline;

/// Run the graph command
pub async fn run(manifest_path: PathBuf, format: GraphFormat, _ctx: &Context) -> Result<()> {
    if !manifest_path.exists() {
        return Err(miette::miette!(
            "Manifest not found: {}",
            manifest_path.display()
        ));
    }

    let pipeline = Pipeline::from_file(&manifest_path)?;
    let graph = pipeline.graph()?;

    let output = match format {
        GraphFormat::Text => graph.to_text(|name| {
            pipeline
                .step(name)
                .map(|s| s.operator().to_string())
                .unwrap_or_default()
        })?,
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    print!("{}", output);
    Ok(())
}
