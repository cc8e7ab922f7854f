// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Content-addressed cache of bare clones, shared by every worker.
//!
//! Entries are named by a fingerprint of the clone URL and accessed under a
//! per-entry lock; the cache is strictly a cache and can be deleted without
//! data loss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{GitError, Result};

/// libgit2's GIT_FETCH_DEPTH_UNSHALLOW sentinel.
const FETCH_DEPTH_UNSHALLOW: i32 = 2147483647;

/// First 16 hex chars of SHA-256 over the clone URL; used as the cache
/// directory name.
pub fn fingerprint(repo_url: &str) -> String {
	let digest = Sha256::digest(repo_url.as_bytes());
	digest
		.iter()
		.map(|b| format!("{b:02x}"))
		.collect::<String>()[..16]
		.to_string()
}

/// Per-operation git credential. Never written to disk.
#[derive(Clone)]
pub struct Credential {
	pub username: String,
	pub token: String,
}

impl Credential {
	/// Token-based auth the way Git hosts expect it: user `oauth2`,
	/// password set to the access token.
	pub fn oauth2(token: impl Into<String>) -> Self {
		Self {
			username: "oauth2".to_string(),
			token: token.into(),
		}
	}
}

impl std::fmt::Debug for Credential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credential")
			.field("username", &self.username)
			.field("token", &"<redacted>")
			.finish()
	}
}

/// External identity collaborator interface: resolves a user's optional
/// Git access token. The server wires in a real implementation; `NoAccessTokens`
/// serves public-repo-only deployments and tests.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
	async fn token_for(&self, user_id: i64) -> Option<String>;
}

pub struct NoAccessTokens;

#[async_trait]
impl AccessTokenProvider for NoAccessTokens {
	async fn token_for(&self, _user_id: i64) -> Option<String> {
		None
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneDepth {
	/// Depth-1 clone, enough for a tree walk of the head revision.
	Shallow,
	/// Full history, required by the miner; upgrades a shallow entry.
	Full,
}

/// Handle over an opened cache entry.
#[derive(Debug, Clone)]
pub struct RepoHandle {
	path: PathBuf,
}

impl RepoHandle {
	pub fn path(&self) -> &Path {
		&self.path
	}
}

pub struct RepoCache {
	base_dir: PathBuf,
	locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl RepoCache {
	pub fn new(base_dir: impl Into<PathBuf>) -> Self {
		Self {
			base_dir: base_dir.into(),
			locks: Mutex::new(HashMap::new()),
		}
	}

	/// Directory an entry would live in, whether or not it exists yet.
	pub fn entry_path(&self, repo_url: &str) -> PathBuf {
		self.base_dir.join(fingerprint(repo_url))
	}

	/// Open the cache entry for a URL, cloning it bare if absent.
	///
	/// An existing entry gets a best-effort fetch; a `Full` request against
	/// a shallow entry fetches with the unshallow sentinel first. Two
	/// concurrent opens of the same URL serialize on a per-entry lock.
	#[instrument(skip(self, credential), fields(repo_url = %repo_url))]
	pub async fn open(
		&self,
		repo_url: &str,
		credential: Option<Credential>,
		depth: CloneDepth,
	) -> Result<RepoHandle> {
		let dir = self.entry_path(repo_url);

		let entry_lock = {
			let mut locks = self.locks.lock().await;
			locks
				.entry(fingerprint(repo_url))
				.or_insert_with(|| Arc::new(Mutex::new(())))
				.clone()
		};
		let _guard = entry_lock.lock().await;

		let url = repo_url.to_string();
		let target = dir.clone();
		tokio::task::spawn_blocking(move || open_or_clone(&target, &url, credential.as_ref(), depth))
			.await
			.map_err(|e| GitError::Join(e.to_string()))??;

		Ok(RepoHandle { path: dir })
	}
}

fn open_or_clone(
	dir: &Path,
	url: &str,
	credential: Option<&Credential>,
	depth: CloneDepth,
) -> Result<()> {
	if dir.join("HEAD").exists() {
		debug!(path = ?dir, "reusing cached clone");
		let repo = git2::Repository::open(dir)?;

		let mut opts = fetch_options(credential, None);
		if depth == CloneDepth::Full && repo.is_shallow() {
			info!(path = ?dir, "unshallowing cached clone");
			opts = fetch_options(credential, Some(FETCH_DEPTH_UNSHALLOW));
		}

		// Fetch is best-effort: a stale cache entry is still usable.
		match repo.find_remote("origin") {
			Ok(mut remote) => {
				if let Err(e) = remote.fetch(&[] as &[&str], Some(&mut opts), None) {
					warn!(path = ?dir, error = %e, "fetch failed, using cached state");
				}
			}
			Err(e) => warn!(path = ?dir, error = %e, "no origin remote on cached clone"),
		}
		return Ok(());
	}

	info!(url = %url, path = ?dir, "cloning bare repository");
	if let Some(parent) = dir.parent() {
		std::fs::create_dir_all(parent)?;
	}

	let requested_depth = match depth {
		CloneDepth::Shallow => Some(1),
		CloneDepth::Full => None,
	};

	// Some transports refuse shallow fetches; retry at full depth before
	// giving up.
	let mut result = clone_bare(dir, url, credential, requested_depth);
	if result.is_err() && requested_depth.is_some() {
		let _ = std::fs::remove_dir_all(dir);
		result = clone_bare(dir, url, credential, None);
	}

	if let Err(e) = result {
		let _ = std::fs::remove_dir_all(dir);
		return Err(GitError::Clone(e.to_string()));
	}

	debug!(path = ?dir, "clone completed");
	Ok(())
}

fn clone_bare(
	dir: &Path,
	url: &str,
	credential: Option<&Credential>,
	depth: Option<i32>,
) -> std::result::Result<(), git2::Error> {
	let mut builder = git2::build::RepoBuilder::new();
	builder.bare(true);
	// Mirror-style refspec so later fetches advance the local heads that
	// HEAD resolves through, not just refs/remotes.
	builder.remote_create(|repo, name, url| repo.remote_with_fetch(name, url, "+refs/*:refs/*"));
	builder.fetch_options(fetch_options(credential, depth));
	builder.clone(url, dir)?;
	Ok(())
}

/// Blocking shallow clone with a working tree, for engines that read file
/// contents rather than history. Falls back to a full clone on transports
/// that refuse depth-limited fetches.
pub fn clone_working_tree(
	url: &str,
	dir: &Path,
	credential: Option<&Credential>,
) -> Result<()> {
	let clone = |depth: Option<i32>| -> std::result::Result<(), git2::Error> {
		let mut builder = git2::build::RepoBuilder::new();
		builder.fetch_options(fetch_options(credential, depth));
		builder.clone(url, dir)?;
		Ok(())
	};

	let mut result = clone(Some(1));
	if result.is_err() {
		let _ = std::fs::remove_dir_all(dir);
		let _ = std::fs::create_dir_all(dir);
		result = clone(None);
	}

	result.map_err(|e| GitError::Clone(e.to_string()))
}

fn fetch_options<'a>(credential: Option<&Credential>, depth: Option<i32>) -> git2::FetchOptions<'a> {
	let mut callbacks = git2::RemoteCallbacks::new();
	if let Some(cred) = credential {
		let username = cred.username.clone();
		let token = cred.token.clone();
		callbacks.credentials(move |_url, _username_from_url, _allowed| {
			git2::Cred::userpass_plaintext(&username, &token)
		});
	}

	let mut opts = git2::FetchOptions::new();
	opts.remote_callbacks(callbacks);
	if let Some(depth) = depth {
		opts.depth(depth);
	}
	opts
}
