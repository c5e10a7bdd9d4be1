// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Utility modules
//!
//! Terminal helpers for the flowspec CLI.

pub mod colors;

pub use colors::*;
