// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Import-based file dependency graph: extraction from a working tree and
//! read-side traversal.
//!
//! Extraction is textual on purpose — regex per language family, no
//! compiler or language server — which keeps it fast and language-agnostic
//! at the cost of missing dynamic imports.

pub mod error;
pub mod extract;
pub mod language;
pub mod query;

pub use error::{GraphError, Result};
pub use extract::DependencyExtractor;
pub use language::detect_language;
pub use query::{DependencyGraph, GraphEdge, GraphNode, GraphQuery, DEFAULT_TRAVERSAL_DEPTH};
