// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

/// Infer a display language from a file path's extension.
pub fn detect_language(path: &str) -> &'static str {
	let ext = path.rsplit('.').next().unwrap_or("");
	match ext {
		"ts" | "tsx" => "typescript",
		"js" | "jsx" | "mjs" | "cjs" => "javascript",
		"py" => "python",
		"java" => "java",
		"kt" => "kotlin",
		"go" => "go",
		"rs" => "rust",
		"cpp" | "cc" => "cpp",
		"cs" => "csharp",
		_ => "unknown",
	}
}
