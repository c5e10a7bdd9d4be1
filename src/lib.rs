// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! # flowspec - pipeline definition SDK
//!
//! `flowspec` builds pipelines of operator steps in memory, checks them as a
//! DAG, and serializes them to the manifest format a remote workflow
//! service executes.
//!
//! ## Features
//!
//! - **Typed wiring** - bind step inputs to literals, pipeline inputs or
//!   upstream outputs, with type and direction checks
//! - **Cycle safety** - every wiring change is validated against the whole
//!   graph and only committed when it stays acyclic
//! - **Conditions and loops** - `when`, `withItems`, `withSequence` and
//!   `withParam` steps
//! - **Round-trip manifests** - YAML/JSON export and loading back
//!
//! ## Quick Start
//!
//! ```no_run
//! use flowspec::pipeline::{OperatorDefinition, ParameterType, Pipeline, Step, VariableDecl};
//!
//! # fn main() -> flowspec::FlowspecResult<()> {
//! let op = OperatorDefinition::local("echo")
//!     .input(VariableDecl::parameter("msg", ParameterType::String))
//!     .output(VariableDecl::parameter("out", ParameterType::String));
//!
//! let mut pipeline = Pipeline::builder("hello", "v1").provider("acme").build();
//! pipeline.add_step(Step::new("first", &op)?)?;
//! pipeline.add_step(Step::new("second", &op)?)?;
//! let first_out = pipeline.output_of("first", "out")?;
//! pipeline.assign_inputs("second", [("msg", first_out)])?;
//!
//! println!("{}", pipeline.export()?.to_yaml()?);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use errors::{FlowspecError, FlowspecResult};
pub use pipeline::{Manifest, Pipeline, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
