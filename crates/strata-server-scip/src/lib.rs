// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Code-intelligence index ingestion and queries.
//!
//! The index arrives as a length-delimited binary stream produced by an
//! external indexer. It is parsed directly against the wire format — no
//! generated stubs — so unknown fields are skipped explicitly and a
//! truncated stream is a hard error.

pub mod error;
pub mod ingest;
pub mod query;
pub mod wire;

pub use error::{Result, ScipError};
pub use ingest::{IndexIngestor, IngestSummary};
pub use query::{Hover, Reference, ScipQuery};
