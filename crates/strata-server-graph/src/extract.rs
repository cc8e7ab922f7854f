// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Dependency extraction: clone shallow, walk the tree, pull import
//! specifiers out with per-language patterns, resolve them against the
//! repo's own files, and replace the stored edge set.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use strata_server_db::{DependencyStore, NewFileDependency};
use strata_server_git::{clone_working_tree, Credential};

use crate::error::{GraphError, Result};

/// Extensions the extractor recognizes as source files.
pub const SOURCE_EXTENSIONS: &[&str] = &[
	".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs", ".py", ".java", ".kt", ".go", ".rs", ".cs",
	".cpp", ".cc", ".c", ".h", ".hpp",
];

const SKIP_DIRS: &[&str] = &[
	"node_modules",
	".git",
	"dist",
	"build",
	".cache",
	".next",
	"target",
	"__pycache__",
	".gradle",
	"vendor",
];

const INDEX_SUFFIXES: &[&str] = &["/index.ts", "/index.tsx", "/index.js", "/index.jsx"];

/// Files larger than this are skipped without raising.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 500 * 1024;

static JS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r#"(?:import\s+.*?from\s+['"]([^'"]+)['"])|(?:require\s*\(\s*['"]([^'"]+)['"]\s*\))"#,
	)
	.unwrap()
});
static PYTHON_IMPORT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?:from\s+(\S+)\s+import)|(?:import\s+(\S+))").unwrap());
static JAVA_IMPORT: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"import\s+(?:static\s+)?([^;\s]+)\s*;").unwrap());
static GO_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());

pub struct DependencyExtractor {
	deps: Arc<dyn DependencyStore>,
	max_file_bytes: u64,
}

impl DependencyExtractor {
	pub fn new(deps: Arc<dyn DependencyStore>) -> Self {
		Self {
			deps,
			max_file_bytes: DEFAULT_MAX_FILE_BYTES,
		}
	}

	pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
		self.max_file_bytes = max_file_bytes;
		self
	}

	/// Clone the repository shallow into a scratch directory, extract the
	/// import edge set, and atomically replace what is stored for
	/// `(user_id, repo_url)`. Returns the number of edges written.
	#[instrument(skip(self, credential), fields(repo_url = %repo_url))]
	pub async fn extract(
		&self,
		user_id: i64,
		repo_url: &str,
		credential: Option<Credential>,
	) -> Result<usize> {
		let url = repo_url.to_string();
		let max_file_bytes = self.max_file_bytes;
		let edges =
			tokio::task::spawn_blocking(move || scan_repository(&url, credential.as_ref(), max_file_bytes))
				.await
				.map_err(|e| GraphError::Join(e.to_string()))??;

		let count = self.deps.replace_all(user_id, repo_url, &edges).await?;
		info!(edges = count, "dependency extraction complete");
		Ok(count)
	}
}

fn scan_repository(
	url: &str,
	credential: Option<&Credential>,
	max_file_bytes: u64,
) -> Result<Vec<NewFileDependency>> {
	// Scratch working tree, removed on every exit path when the TempDir drops.
	let scratch = tempfile::tempdir()?;
	clone_working_tree(url, scratch.path(), credential)?;

	let files = collect_source_files(scratch.path());
	debug!(files = files.len(), "enumerated source files");

	Ok(extract_edges(scratch.path(), &files, max_file_bytes))
}

/// Relative forward-slash paths of recognized source files, in walk order.
fn collect_source_files(root: &Path) -> Vec<String> {
	let mut files = Vec::new();
	for entry in WalkDir::new(root)
		.into_iter()
		.filter_entry(|e| !is_skipped_dir(e))
		.filter_map(|e| e.ok())
	{
		if !entry.file_type().is_file() {
			continue;
		}
		let name = entry.file_name().to_string_lossy();
		if extension_of(&name).is_none() {
			continue;
		}
		if let Ok(relative) = entry.path().strip_prefix(root) {
			files.push(relative.to_string_lossy().replace('\\', "/"));
		}
	}
	files
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
	entry.file_type().is_dir() && SKIP_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
}

/// Recognized extension (with dot, lowercased) of a file name, if any.
fn extension_of(file_name: &str) -> Option<&'static str> {
	let dot = file_name.rfind('.')?;
	let ext = file_name[dot..].to_lowercase();
	SOURCE_EXTENSIONS.iter().find(|e| **e == ext).copied()
}

fn extract_edges(root: &Path, files: &[String], max_file_bytes: u64) -> Vec<NewFileDependency> {
	let file_set: HashSet<&str> = files.iter().map(|f| f.as_str()).collect();

	let mut edges = Vec::new();
	let mut seen = HashSet::new();
	let mut skipped = 0usize;

	for relative in files {
		let path = root.join(relative);

		match std::fs::metadata(&path) {
			Ok(meta) if meta.len() > max_file_bytes => {
				debug!(file = %relative, bytes = meta.len(), "skipping oversized file");
				skipped += 1;
				continue;
			}
			Err(e) => {
				debug!(file = %relative, error = %e, "skipping unreadable file");
				skipped += 1;
				continue;
			}
			_ => {}
		}

		// Binary files that match by extension fail UTF-8 decode; skip them.
		let content = match std::fs::read_to_string(&path) {
			Ok(content) => content,
			Err(e) => {
				debug!(file = %relative, error = %e, "skipping undecodable file");
				skipped += 1;
				continue;
			}
		};

		for import in extract_imports(relative, &content) {
			let Some(target) = resolve_import(relative, &import, &file_set, files) else {
				continue;
			};
			if target == *relative {
				continue;
			}
			if seen.insert((relative.clone(), target.clone())) {
				edges.push(NewFileDependency::import(relative.clone(), target));
			}
		}
	}

	if skipped > 0 {
		warn!(skipped, "files skipped during extraction");
	}
	edges
}

/// Pull raw import specifiers out of one file, dispatched on its extension.
pub fn extract_imports(file_path: &str, content: &str) -> Vec<String> {
	let Some(ext) = extension_of(file_path) else {
		return Vec::new();
	};

	let mut imports = Vec::new();
	match ext {
		".ts" | ".tsx" | ".js" | ".jsx" | ".mjs" | ".cjs" => {
			for captures in JS_IMPORT.captures_iter(content) {
				let matched = captures.get(1).or_else(|| captures.get(2));
				if let Some(m) = matched {
					// Only relative specifiers resolve inside the repo.
					if m.as_str().starts_with('.') {
						imports.push(m.as_str().to_string());
					}
				}
			}
		}
		".py" => {
			for captures in PYTHON_IMPORT.captures_iter(content) {
				let matched = captures.get(1).or_else(|| captures.get(2));
				if let Some(m) = matched {
					imports.push(m.as_str().replace('.', "/"));
				}
			}
		}
		".java" | ".kt" => {
			for captures in JAVA_IMPORT.captures_iter(content) {
				if let Some(m) = captures.get(1) {
					imports.push(m.as_str().replace('.', "/"));
				}
			}
		}
		".go" => {
			let mut in_import_block = false;
			for line in content.lines() {
				let trimmed = line.trim();
				if trimmed.starts_with("import (") {
					in_import_block = true;
					continue;
				}
				if in_import_block && trimmed == ")" {
					in_import_block = false;
					continue;
				}
				if in_import_block || trimmed.starts_with("import \"") {
					if let Some(captures) = GO_IMPORT.captures(trimmed) {
						imports.push(captures[1].to_string());
					}
				}
			}
		}
		_ => {}
	}

	imports
}

/// Resolve an import specifier to an in-repo path, or `None`.
///
/// Relative specifiers are normalized against the source directory;
/// anything else is tried verbatim, then with each recognized extension,
/// then as a directory index, and finally by matching the last path
/// segment against file basenames (first match in enumeration order).
pub fn resolve_import(
	source_file: &str,
	import_path: &str,
	file_set: &HashSet<&str>,
	ordered_files: &[String],
) -> Option<String> {
	let source_dir = match source_file.rfind('/') {
		Some(idx) => &source_file[..idx],
		None => "",
	};

	let resolved = if import_path.starts_with("./") || import_path.starts_with("../") {
		normalize_path(&format!("{source_dir}/{import_path}"))
	} else {
		import_path.to_string()
	};

	if file_set.contains(resolved.as_str()) {
		return Some(resolved);
	}

	for ext in SOURCE_EXTENSIONS {
		let candidate = format!("{resolved}{ext}");
		if file_set.contains(candidate.as_str()) {
			return Some(candidate);
		}
	}

	for suffix in INDEX_SUFFIXES {
		let candidate = format!("{resolved}{suffix}");
		if file_set.contains(candidate.as_str()) {
			return Some(candidate);
		}
	}

	// Last-segment fallback, mainly for Java/Kotlin/Go package imports.
	// Ambiguity resolves to the first match in enumeration order.
	let last_segment = import_path.rsplit('/').next().unwrap_or(import_path);
	for file in ordered_files {
		let base = file.rsplit('/').next().unwrap_or(file);
		let without_ext = match base.rfind('.') {
			Some(idx) => &base[..idx],
			None => base,
		};
		if without_ext == last_segment {
			return Some(file.clone());
		}
	}

	None
}

/// Collapse `.` and `..` components of a forward-slash path.
fn normalize_path(path: &str) -> String {
	let mut parts: Vec<&str> = Vec::new();
	for part in path.split('/') {
		match part {
			"" | "." => {}
			".." => {
				if parts.pop().is_none() {
					parts.push("..");
				}
			}
			other => parts.push(other),
		}
	}
	parts.join("/")
}
