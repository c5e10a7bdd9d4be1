// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Validate command - check pipeline manifests

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};

use super::Context;
use crate::errors::{FlowspecResult, RecoverySuggestion};
use crate::pipeline::{Pipeline, ValidationResult};

/// Expand patterns; a pattern matching nothing is kept as a literal path
fn expand(patterns: &[String]) -> FlowspecResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let mut matched: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|entry| entry.ok()).collect();
        if matched.is_empty() {
            files.push(PathBuf::from(pattern));
        } else {
            matched.sort();
            files.append(&mut matched);
        }
    }
    Ok(files)
}

/// Load and validate one manifest; `None` when it fails to load
fn check(path: &Path, verbose: bool) -> Option<(Pipeline, ValidationResult)> {
    let pipeline = match Pipeline::from_file(path) {
        Ok(p) => p,
        Err(e) => {
            println!("  {} {}: {}", "✗".red(), path.display(), e);
            if let Some(suggestion) = RecoverySuggestion::for_error(&e) {
                println!("{}", suggestion);
            }
            return None;
        }
    };

    let validation = pipeline.validate();
    let status = if validation.is_valid() {
        "✓".green()
    } else {
        "✗".red()
    };
    println!(
        "  {} {} ({})",
        status,
        path.display(),
        pipeline.metadata().key().dimmed()
    );

    for error in &validation.errors {
        println!("      {} {}", "error:".red().bold(), error);
        if let Some(suggestion) = RecoverySuggestion::for_error(error) {
            for line in suggestion.to_string().lines() {
                println!("        {}", line);
            }
        }
    }
    for warning in &validation.warnings {
        println!("      {} {}", "warning:".yellow().bold(), warning);
    }

    if verbose {
        for step in pipeline.steps() {
            let deps = step.dependency_names();
            let deps = if deps.is_empty() {
                String::new()
            } else {
                format!(" [depends: {}]", deps.join(", "))
            };
            println!("      - {} ({}){}", step.name(), step.operator(), deps.dimmed());
        }
    }

    Some((pipeline, validation))
}

/// Run the validate command
pub async fn run(patterns: Vec<String>, ctx: &Context) -> Result<()> {
    println!("{}", "Validating manifests...".bold());
    println!();

    let files = expand(&patterns)?;
    let mut failed = 0;
    let mut warned = 0;

    for file in &files {
        match check(file, ctx.verbose) {
            Some((_, validation)) if validation.is_valid() => {
                if validation.has_warnings() {
                    warned += 1;
                }
            }
            _ => failed += 1,
        }
    }

    println!();
    if failed > 0 {
        return Err(miette::miette!(
            "{} of {} manifest(s) failed validation",
            failed,
            files.len()
        ));
    }

    if warned > 0 {
        println!("{}", "Manifests are valid but have warnings.".yellow().bold());
    } else {
        println!("{}", "All manifests are valid!".green().bold());
    }
    Ok(())
}
