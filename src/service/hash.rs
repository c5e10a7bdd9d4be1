// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Content-derived identifiers
//!
//! Uses BLAKE3 so the same pipeline key always maps to the same id.

use blake3::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::pipeline::{OperatorRef, PipelineMetadata};

/// Hex digits kept in generated ids
const ID_LEN: usize = 16;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Hasher for registry ids and content digests
pub struct IdHasher {
    hasher: Hasher,
}

impl IdHasher {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    pub fn update(&mut self, part: &str) -> &mut Self {
        self.hasher.update(part.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") differ
        self.hasher.update(&[0]);
        self
    }

    /// Full hex digest
    pub fn finish(&self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }

    fn short(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, &self.finish()[..ID_LEN])
    }

    /// Stable id of a published pipeline key
    pub fn pipeline_id(metadata: &PipelineMetadata) -> String {
        let mut hasher = Self::new();
        hasher
            .update(&metadata.identifier)
            .update(metadata.provider.as_deref().unwrap_or_default())
            .update(&metadata.version);
        hasher.short("p")
    }

    /// Stable file id of an operator reference
    pub fn operator_id(reference: &OperatorRef) -> String {
        let mut hasher = Self::new();
        hasher.update(&reference.key());
        hasher.short("op")
    }

    /// Fresh id for a run; unique within the process
    pub fn run_id(name: &str, pipeline_id: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let counter = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Self::new();
        hasher
            .update(name)
            .update(pipeline_id)
            .update(&nanos.to_string())
            .update(&counter.to_string());
        hasher.short("r")
    }
}

impl Default for IdHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hash a string to a hex digest
pub fn hash_string(s: &str) -> String {
    blake3::hash(s.as_bytes()).to_hex().to_string()
}
