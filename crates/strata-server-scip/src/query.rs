// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Hover and reference lookups over the ingested index.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use strata_server_db::ScipStore;

use crate::error::Result;

/// Symbol metadata for the innermost occurrence covering a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hover {
	pub symbol: String,
	pub display_name: Option<String>,
	pub signature_doc: Option<String>,
	pub documentation: Option<String>,
	pub start_line: i64,
	pub start_char: i64,
	pub end_line: i64,
	pub end_char: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
	pub file_path: String,
	pub symbol: String,
	pub start_line: i64,
	pub start_char: i64,
	pub end_line: i64,
	pub end_char: i64,
	pub role_flags: i64,
}

pub struct ScipQuery {
	scip: Arc<dyn ScipStore>,
}

impl ScipQuery {
	pub fn new(scip: Arc<dyn ScipStore>) -> Self {
		Self { scip }
	}

	/// At most one result: the innermost occurrence covering the position,
	/// joined to its symbol metadata.
	#[instrument(skip(self), fields(repo_url = %repo_url, file = %file_path))]
	pub async fn hover(
		&self,
		user_id: i64,
		repo_url: &str,
		file_path: &str,
		line: i64,
		character: i64,
	) -> Result<Option<Hover>> {
		let Some(document) = self.scip.get_document(user_id, repo_url, file_path).await? else {
			debug!("no indexed document for hover");
			return Ok(None);
		};

		let covering = self.scip.occurrences_at(document.id, line, character).await?;
		let Some(occurrence) = covering.into_iter().next() else {
			return Ok(None);
		};

		let info = self
			.scip
			.get_symbol(user_id, repo_url, &occurrence.symbol)
			.await?;

		Ok(Some(Hover {
			symbol: occurrence.symbol,
			display_name: info.as_ref().and_then(|i| i.display_name.clone()),
			signature_doc: info.as_ref().and_then(|i| i.signature_doc.clone()),
			documentation: info.and_then(|i| i.documentation),
			start_line: occurrence.start_line,
			start_char: occurrence.start_char,
			end_line: occurrence.end_line,
			end_char: occurrence.end_char,
		}))
	}

	/// Every occurrence of a symbol across the repo, ordered by
	/// `(file_path, start_line)`.
	#[instrument(skip(self), fields(repo_url = %repo_url, symbol = %symbol))]
	pub async fn references(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Vec<Reference>> {
		let rows = self
			.scip
			.occurrences_by_symbol(user_id, repo_url, symbol)
			.await?;

		Ok(
			rows
				.into_iter()
				.map(|row| Reference {
					file_path: row.relative_path,
					symbol: row.occurrence.symbol,
					start_line: row.occurrence.start_line,
					start_char: row.occurrence.start_char,
					end_line: row.occurrence.end_line,
					end_char: row.occurrence.end_char,
					role_flags: row.occurrence.role_flags,
				})
				.collect(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use strata_server_db::{
		testing::create_test_pool, NewOccurrence, NewScipDocument, NewSymbolInfo, ScipRepository,
	};

	const REPO: &str = "https://example.com/r.git";

	fn occurrence(symbol: &str, range: (i64, i64, i64, i64), roles: i64) -> NewOccurrence {
		NewOccurrence {
			symbol: symbol.to_string(),
			start_line: range.0,
			start_char: range.1,
			end_line: range.2,
			end_char: range.3,
			role_flags: roles,
		}
	}

	async fn query_with_fixture() -> ScipQuery {
		let pool = create_test_pool().await;
		let repo = Arc::new(ScipRepository::new(pool));

		repo
			.replace_document(
				1,
				REPO,
				&NewScipDocument {
					relative_path: "x.ts".to_string(),
					language: Some("typescript".to_string()),
					occurrences: vec![
						occurrence("outer", (1, 0, 10, 0), 0),
						occurrence("inner", (3, 0, 5, 0), 1),
					],
					symbols: vec![NewSymbolInfo {
						symbol: "inner".to_string(),
						display_name: Some("inner".to_string()),
						documentation: Some("the inner thing".to_string()),
					}],
				},
			)
			.await
			.unwrap();

		repo
			.replace_document(
				1,
				REPO,
				&NewScipDocument {
					relative_path: "y.ts".to_string(),
					language: Some("typescript".to_string()),
					occurrences: vec![occurrence("inner", (7, 4, 7, 9), 8)],
					symbols: Vec::new(),
				},
			)
			.await
			.unwrap();

		ScipQuery::new(repo)
	}

	#[tokio::test]
	async fn test_hover_returns_innermost_occurrence() {
		let query = query_with_fixture().await;

		let hover = query.hover(1, REPO, "x.ts", 4, 2).await.unwrap().unwrap();
		assert_eq!(hover.symbol, "inner");
		assert_eq!(
			(hover.start_line, hover.start_char, hover.end_line, hover.end_char),
			(3, 0, 5, 0)
		);
		assert_eq!(hover.display_name.as_deref(), Some("inner"));
		assert_eq!(hover.documentation.as_deref(), Some("the inner thing"));
	}

	#[tokio::test]
	async fn test_hover_outside_any_occurrence_is_none() {
		let query = query_with_fixture().await;
		assert!(query.hover(1, REPO, "x.ts", 42, 0).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_hover_unknown_document_is_none() {
		let query = query_with_fixture().await;
		assert!(query.hover(1, REPO, "zzz.ts", 1, 0).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_hover_without_symbol_metadata_still_returns_range() {
		let query = query_with_fixture().await;

		let hover = query.hover(1, REPO, "x.ts", 1, 0).await.unwrap().unwrap();
		assert_eq!(hover.symbol, "outer");
		assert!(hover.display_name.is_none());
		assert!(hover.documentation.is_none());
	}

	#[tokio::test]
	async fn test_references_span_documents_in_order() {
		let query = query_with_fixture().await;

		let refs = query.references(1, REPO, "inner").await.unwrap();
		let locations: Vec<(&str, i64)> = refs
			.iter()
			.map(|r| (r.file_path.as_str(), r.start_line))
			.collect();
		assert_eq!(locations, vec![("x.ts", 3), ("y.ts", 7)]);
	}

	#[tokio::test]
	async fn test_references_are_user_scoped() {
		let query = query_with_fixture().await;
		assert!(query.references(2, REPO, "inner").await.unwrap().is_empty());
	}
}
