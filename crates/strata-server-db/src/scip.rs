// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage for the code-intelligence index: documents, occurrences, symbols.
//!
//! Documents are replaced wholesale per ingest (occurrences deleted and
//! re-inserted with their parent); symbol metadata is upserted and only
//! overwritten by non-empty values.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScipDocument {
	pub id: i64,
	pub user_id: i64,
	pub repo_url: String,
	pub relative_path: String,
	pub language: Option<String>,
	pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScipOccurrence {
	pub id: i64,
	pub document_id: i64,
	pub symbol: String,
	pub start_line: i64,
	pub start_char: i64,
	pub end_line: i64,
	pub end_char: i64,
	pub role_flags: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScipSymbol {
	pub id: i64,
	pub user_id: i64,
	pub repo_url: String,
	pub symbol: String,
	pub display_name: Option<String>,
	pub signature_doc: Option<String>,
	pub documentation: Option<String>,
}

/// Occurrence parsed out of an uploaded index, pre-persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOccurrence {
	pub symbol: String,
	pub start_line: i64,
	pub start_char: i64,
	pub end_line: i64,
	pub end_char: i64,
	pub role_flags: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSymbolInfo {
	pub symbol: String,
	pub display_name: Option<String>,
	pub documentation: Option<String>,
}

/// A fully parsed document ready to replace whatever is stored for its path.
#[derive(Debug, Clone, Default)]
pub struct NewScipDocument {
	pub relative_path: String,
	pub language: Option<String>,
	pub occurrences: Vec<NewOccurrence>,
	pub symbols: Vec<NewSymbolInfo>,
}

/// Occurrence joined to its document path, for reference listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolOccurrence {
	pub relative_path: String,
	pub occurrence: ScipOccurrence,
}

type OccurrenceRow = (i64, i64, String, i64, i64, i64, i64, i64);

fn occurrence_from_row(row: OccurrenceRow) -> ScipOccurrence {
	let (id, document_id, symbol, start_line, start_char, end_line, end_char, role_flags) = row;
	ScipOccurrence {
		id,
		document_id,
		symbol,
		start_line,
		start_char,
		end_line,
		end_char,
		role_flags,
	}
}

async fn upsert_symbol_with<'e, E>(
	executor: E,
	user_id: i64,
	repo_url: &str,
	info: &NewSymbolInfo,
) -> Result<()>
where
	E: Executor<'e, Database = Sqlite>,
{
	sqlx::query(
		r#"
		INSERT INTO scip_symbols (user_id, repo_url, symbol, display_name, documentation)
		VALUES (?, ?, ?, ?, ?)
		ON CONFLICT (user_id, repo_url, symbol) DO UPDATE SET
			display_name = CASE
				WHEN excluded.display_name IS NOT NULL AND excluded.display_name != ''
				THEN excluded.display_name ELSE scip_symbols.display_name END,
			documentation = CASE
				WHEN excluded.documentation IS NOT NULL AND excluded.documentation != ''
				THEN excluded.documentation ELSE scip_symbols.documentation END
		"#,
	)
	.bind(user_id)
	.bind(repo_url)
	.bind(&info.symbol)
	.bind(&info.display_name)
	.bind(&info.documentation)
	.execute(executor)
	.await?;
	Ok(())
}

#[derive(Clone)]
pub struct ScipRepository {
	pool: SqlitePool,
}

impl ScipRepository {
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Replace everything stored for one document in a single transaction:
	/// upsert the document row, delete and re-insert its occurrences, and
	/// upsert the inline symbol metadata.
	#[tracing::instrument(skip(self, doc), fields(path = %doc.relative_path))]
	pub async fn replace_document(
		&self,
		user_id: i64,
		repo_url: &str,
		doc: &NewScipDocument,
	) -> Result<i64> {
		let mut tx = self.pool.begin().await?;

		let (document_id,): (i64,) = sqlx::query_as(
			r#"
			INSERT INTO scip_documents (user_id, repo_url, relative_path, language, indexed_at)
			VALUES (?, ?, ?, ?, ?)
			ON CONFLICT (user_id, repo_url, relative_path) DO UPDATE SET
				language = excluded.language,
				indexed_at = excluded.indexed_at
			RETURNING id
			"#,
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(&doc.relative_path)
		.bind(&doc.language)
		.bind(Utc::now())
		.fetch_one(&mut *tx)
		.await?;

		sqlx::query("DELETE FROM scip_occurrences WHERE document_id = ?")
			.bind(document_id)
			.execute(&mut *tx)
			.await?;

		for occ in &doc.occurrences {
			sqlx::query(
				"INSERT INTO scip_occurrences \
				 (document_id, symbol, start_line, start_char, end_line, end_char, role_flags) \
				 VALUES (?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(document_id)
			.bind(&occ.symbol)
			.bind(occ.start_line)
			.bind(occ.start_char)
			.bind(occ.end_line)
			.bind(occ.end_char)
			.bind(occ.role_flags)
			.execute(&mut *tx)
			.await?;
		}

		for info in &doc.symbols {
			upsert_symbol_with(&mut *tx, user_id, repo_url, info).await?;
		}

		tx.commit().await?;
		tracing::debug!(
			document_id,
			occurrences = doc.occurrences.len(),
			symbols = doc.symbols.len(),
			"replaced document"
		);
		Ok(document_id)
	}

	#[tracing::instrument(skip(self, info), fields(symbol = %info.symbol))]
	pub async fn upsert_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		info: &NewSymbolInfo,
	) -> Result<()> {
		upsert_symbol_with(&self.pool, user_id, repo_url, info).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_document(
		&self,
		user_id: i64,
		repo_url: &str,
		relative_path: &str,
	) -> Result<Option<ScipDocument>> {
		let row = sqlx::query_as::<_, (i64, i64, String, String, Option<String>, DateTime<Utc>)>(
			"SELECT id, user_id, repo_url, relative_path, language, indexed_at \
			 FROM scip_documents WHERE user_id = ? AND repo_url = ? AND relative_path = ?",
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(relative_path)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(
			|(id, user_id, repo_url, relative_path, language, indexed_at)| ScipDocument {
				id,
				user_id,
				repo_url,
				relative_path,
				language,
				indexed_at,
			},
		))
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_documents(&self, user_id: i64, repo_url: &str) -> Result<Vec<ScipDocument>> {
		let rows = sqlx::query_as::<_, (i64, i64, String, String, Option<String>, DateTime<Utc>)>(
			"SELECT id, user_id, repo_url, relative_path, language, indexed_at \
			 FROM scip_documents WHERE user_id = ? AND repo_url = ? ORDER BY relative_path ASC",
		)
		.bind(user_id)
		.bind(repo_url)
		.fetch_all(&self.pool)
		.await?;

		Ok(
			rows
				.into_iter()
				.map(
					|(id, user_id, repo_url, relative_path, language, indexed_at)| ScipDocument {
						id,
						user_id,
						repo_url,
						relative_path,
						language,
						indexed_at,
					},
				)
				.collect(),
		)
	}

	#[tracing::instrument(skip(self))]
	pub async fn occurrences_for_document(&self, document_id: i64) -> Result<Vec<ScipOccurrence>> {
		let rows = sqlx::query_as::<_, OccurrenceRow>(
			"SELECT id, document_id, symbol, start_line, start_char, end_line, end_char, role_flags \
			 FROM scip_occurrences WHERE document_id = ? ORDER BY start_line ASC, start_char ASC",
		)
		.bind(document_id)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(occurrence_from_row).collect())
	}

	/// Occurrences whose range covers the position, innermost first.
	///
	/// Character bounds only constrain the boundary lines: a position on an
	/// interior line of a multi-line range is always covered.
	#[tracing::instrument(skip(self))]
	pub async fn occurrences_at(
		&self,
		document_id: i64,
		line: i64,
		character: i64,
	) -> Result<Vec<ScipOccurrence>> {
		let rows = sqlx::query_as::<_, OccurrenceRow>(
			r#"
			SELECT id, document_id, symbol, start_line, start_char, end_line, end_char, role_flags
			FROM scip_occurrences
			WHERE document_id = ?
				AND start_line <= ? AND end_line >= ?
				AND (start_line < ? OR start_char <= ?)
				AND (end_line > ? OR end_char >= ?)
			ORDER BY (end_line - start_line) ASC, (end_char - start_char) ASC
			"#,
		)
		.bind(document_id)
		.bind(line)
		.bind(line)
		.bind(line)
		.bind(character)
		.bind(line)
		.bind(character)
		.fetch_all(&self.pool)
		.await?;
		Ok(rows.into_iter().map(occurrence_from_row).collect())
	}

	/// Every occurrence of a symbol across the repository's documents,
	/// ordered by file path then start line.
	#[tracing::instrument(skip(self))]
	pub async fn occurrences_by_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Vec<SymbolOccurrence>> {
		let rows = sqlx::query_as::<_, (String, i64, i64, String, i64, i64, i64, i64, i64)>(
			r#"
			SELECT d.relative_path,
				o.id, o.document_id, o.symbol, o.start_line, o.start_char, o.end_line, o.end_char, o.role_flags
			FROM scip_occurrences o
			JOIN scip_documents d ON d.id = o.document_id
			WHERE d.user_id = ? AND d.repo_url = ? AND o.symbol = ?
			ORDER BY d.relative_path ASC, o.start_line ASC
			"#,
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(symbol)
		.fetch_all(&self.pool)
		.await?;

		Ok(
			rows
				.into_iter()
				.map(
					|(relative_path, id, document_id, symbol, start_line, start_char, end_line, end_char, role_flags)| {
						SymbolOccurrence {
							relative_path,
							occurrence: ScipOccurrence {
								id,
								document_id,
								symbol,
								start_line,
								start_char,
								end_line,
								end_char,
								role_flags,
							},
						}
					},
				)
				.collect(),
		)
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Option<ScipSymbol>> {
		let row = sqlx::query_as::<
			_,
			(i64, i64, String, String, Option<String>, Option<String>, Option<String>),
		>(
			"SELECT id, user_id, repo_url, symbol, display_name, signature_doc, documentation \
			 FROM scip_symbols WHERE user_id = ? AND repo_url = ? AND symbol = ?",
		)
		.bind(user_id)
		.bind(repo_url)
		.bind(symbol)
		.fetch_optional(&self.pool)
		.await?;

		Ok(row.map(
			|(id, user_id, repo_url, symbol, display_name, signature_doc, documentation)| ScipSymbol {
				id,
				user_id,
				repo_url,
				symbol,
				display_name,
				signature_doc,
				documentation,
			},
		))
	}
}

#[async_trait]
pub trait ScipStore: Send + Sync {
	async fn replace_document(
		&self,
		user_id: i64,
		repo_url: &str,
		doc: &NewScipDocument,
	) -> Result<i64>;
	async fn upsert_symbol(&self, user_id: i64, repo_url: &str, info: &NewSymbolInfo) -> Result<()>;
	async fn get_document(
		&self,
		user_id: i64,
		repo_url: &str,
		relative_path: &str,
	) -> Result<Option<ScipDocument>>;
	async fn occurrences_at(
		&self,
		document_id: i64,
		line: i64,
		character: i64,
	) -> Result<Vec<ScipOccurrence>>;
	async fn occurrences_by_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Vec<SymbolOccurrence>>;
	async fn get_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Option<ScipSymbol>>;
}

#[async_trait]
impl ScipStore for ScipRepository {
	async fn replace_document(
		&self,
		user_id: i64,
		repo_url: &str,
		doc: &NewScipDocument,
	) -> Result<i64> {
		self.replace_document(user_id, repo_url, doc).await
	}

	async fn upsert_symbol(&self, user_id: i64, repo_url: &str, info: &NewSymbolInfo) -> Result<()> {
		self.upsert_symbol(user_id, repo_url, info).await
	}

	async fn get_document(
		&self,
		user_id: i64,
		repo_url: &str,
		relative_path: &str,
	) -> Result<Option<ScipDocument>> {
		self.get_document(user_id, repo_url, relative_path).await
	}

	async fn occurrences_at(
		&self,
		document_id: i64,
		line: i64,
		character: i64,
	) -> Result<Vec<ScipOccurrence>> {
		self.occurrences_at(document_id, line, character).await
	}

	async fn occurrences_by_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Vec<SymbolOccurrence>> {
		self.occurrences_by_symbol(user_id, repo_url, symbol).await
	}

	async fn get_symbol(
		&self,
		user_id: i64,
		repo_url: &str,
		symbol: &str,
	) -> Result<Option<ScipSymbol>> {
		self.get_symbol(user_id, repo_url, symbol).await
	}
}
