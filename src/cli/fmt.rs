// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Fmt command - re-emit a manifest in canonical form
//!
//! The manifest is loaded into a pipeline first, so structural errors are
//! reported instead of copied through.

use miette::Result;
use std::path::PathBuf;

use super::{emit, Context};
use crate::pipeline::Pipeline;

/// Run the fmt command
pub async fn run(
    manifest_path: PathBuf,
    json: bool,
    output: Option<PathBuf>,
    _ctx: &Context,
) -> Result<()> {
    let pipeline = Pipeline::from_file(&manifest_path)?;

    let mut content = if json {
        pipeline.to_json()?
    } else {
        pipeline.to_yaml()?
    };
    if !content.ends_with('\n') {
        content.push('\n');
    }

    emit(&content, output.as_deref())
}
