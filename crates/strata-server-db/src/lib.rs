// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite persistence layer for the strata server.
//!
//! One repository struct per entity, each fronted by an `async_trait` store
//! trait so engines can be tested against mocks. All rows are scoped by
//! `(user_id, repo_url)`; no query in this crate can cross that boundary.

pub mod churn;
pub mod commit;
pub mod dependency;
pub mod error;
pub mod job;
pub mod pool;
pub mod schema;
pub mod scip;
pub mod testing;
pub mod types;

pub use churn::{ChurnStore, FileChurnStat, FileChurnStatRepository};
pub use commit::{CommitStat, CommitStatRepository, CommitStore, NewCommitStat};
pub use dependency::{DependencyStore, FileDependency, FileDependencyRepository, NewFileDependency};
pub use error::{DbError, Result};
pub use job::{IndexJob, JobKind, JobRepository, JobStatus, JobStore};
pub use pool::create_pool;
pub use schema::ensure_schema;
pub use scip::{
	NewOccurrence, NewScipDocument, NewSymbolInfo, ScipDocument, ScipOccurrence, ScipRepository,
	ScipStore, ScipSymbol, SymbolOccurrence,
};
pub use types::CommitFileDiff;
