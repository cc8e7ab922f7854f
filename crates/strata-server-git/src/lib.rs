// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Git plumbing for the strata server: a content-addressed cache of bare
//! clones, the commit-history miner, and the on-demand blame provider.

pub mod blame;
pub mod cache;
pub mod error;
pub mod mine;

pub use blame::{BlameLine, BlameProvider};
pub use cache::{
	clone_working_tree, fingerprint, AccessTokenProvider, CloneDepth, Credential, NoAccessTokens,
	RepoCache, RepoHandle,
};
pub use error::{GitError, Result};
pub use mine::{HistoryMiner, MinedCommit};
