// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for flowspec.

pub mod fmt;
pub mod graph;
pub mod registry;
pub mod validate;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Settings;

/// Pipeline manifest toolkit
///
/// Validate, render and publish pipeline manifests.
#[derive(Parser, Debug)]
#[clap(
    name = "flowspec",
    version,
    about = "Build, validate and publish pipeline manifests",
    long_about = None,
    after_help = "Examples:\n\
        flowspec validate 'pipelines/*.yaml'      Validate manifests\n\
        flowspec graph pipeline.yaml -f mermaid   Render the step graph\n\
        flowspec fmt pipeline.yaml --json         Re-emit a canonical manifest\n\
        flowspec push pipeline.yaml               Publish to the local registry\n\n\
        See 'flowspec <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Settings file (default: ./flowspec.toml when present)
    #[clap(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Local registry directory, overriding the settings file
    #[clap(long, global = true, value_name = "DIR", env = "FLOWSPEC_REGISTRY")]
    pub registry: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate pipeline manifests
    Validate {
        /// Manifest files or glob patterns
        #[clap(default_value = "pipeline.yaml")]
        patterns: Vec<String>,
    },

    /// Show the step graph of a manifest
    Graph {
        /// Manifest file
        #[clap(default_value = "pipeline.yaml")]
        manifest: PathBuf,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Re-emit a manifest in canonical form
    Fmt {
        /// Manifest file
        #[clap(default_value = "pipeline.yaml")]
        manifest: PathBuf,

        /// Emit JSON instead of YAML
        #[clap(long)]
        json: bool,

        /// Output file (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// Publish a manifest to the local registry
    Push {
        /// Manifest file
        manifest: PathBuf,
    },

    /// Fetch a published manifest
    Pull {
        /// Pipeline identifier
        identifier: String,

        /// Provider (default: from the settings file)
        #[clap(short, long)]
        provider: Option<String>,

        /// Pipeline version
        #[clap(long, default_value = "v1")]
        version: String,

        /// Output file (default: stdout)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },

    /// List published pipelines
    List,
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Settings and flags shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub settings: Settings,
    pub verbose: bool,
}

impl Context {
    pub fn new(mut settings: Settings, registry: Option<PathBuf>, verbose: bool) -> Self {
        if registry.is_some() {
            settings.registry_dir = registry;
        }
        Self { settings, verbose }
    }
}

/// Write to `output`, or print when none is given
pub(crate) fn emit(content: &str, output: Option<&std::path::Path>) -> miette::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).map_err(|e| crate::FlowspecError::FileWriteError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;
            crate::utils::print_success(&format!("Wrote {}", path.display()));
        }
        None => print!("{}", content),
    }
    Ok(())
}
