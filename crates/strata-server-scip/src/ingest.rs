// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Projects a binary index into the document/occurrence/symbol tables.
//!
//! Each document replaces its stored counterpart in one transaction. A
//! document that fails to parse is logged, counted, and skipped; the whole
//! ingest fails only when nothing at all could be ingested.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use strata_server_db::{NewOccurrence, NewScipDocument, NewSymbolInfo, ScipStore};

use crate::error::{Result, ScipError};
use crate::wire::{Reader, WIRE_LEN, WIRE_VARINT};

// Index message fields.
const INDEX_DOCUMENT: u32 = 3;
const INDEX_EXTERNAL_SYMBOL: u32 = 4;
// Document message fields.
const DOC_RELATIVE_PATH: u32 = 1;
const DOC_LANGUAGE: u32 = 4;
const DOC_OCCURRENCE: u32 = 5;
const DOC_SYMBOL: u32 = 6;
// Occurrence message fields.
const OCC_SYMBOL: u32 = 1;
const OCC_RANGE: u32 = 3;
const OCC_ROLES: u32 = 4;
// SymbolInformation message fields.
const SYM_SYMBOL: u32 = 1;
const SYM_DOCUMENTATION: u32 = 3;
const SYM_DISPLAY_NAME: u32 = 7;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
	pub documents: usize,
	pub occurrences: usize,
	pub external_symbols: usize,
	pub skipped_documents: usize,
}

pub struct IndexIngestor {
	scip: Arc<dyn ScipStore>,
}

impl IndexIngestor {
	pub fn new(scip: Arc<dyn ScipStore>) -> Self {
		Self { scip }
	}

	#[instrument(skip(self, bytes), fields(repo_url = %repo_url, bytes = bytes.len()))]
	pub async fn ingest(&self, user_id: i64, repo_url: &str, bytes: &[u8]) -> Result<IngestSummary> {
		let mut reader = Reader::new(bytes);
		let mut summary = IngestSummary::default();

		while let Some((field, wire)) = reader.read_tag()? {
			if wire != WIRE_LEN {
				reader.skip(wire)?;
				continue;
			}
			let payload = reader.read_bytes()?;

			match field {
				INDEX_DOCUMENT => match parse_document(payload) {
					Ok(doc) => {
						summary.occurrences += doc.occurrences.len();
						self.scip.replace_document(user_id, repo_url, &doc).await?;
						summary.documents += 1;
					}
					Err(e) => {
						warn!(error = %e, "skipping malformed document");
						summary.skipped_documents += 1;
					}
				},
				INDEX_EXTERNAL_SYMBOL => match parse_symbol_info(payload) {
					Ok(Some(info)) => {
						self.scip.upsert_symbol(user_id, repo_url, &info).await?;
						summary.external_symbols += 1;
					}
					Ok(None) => {}
					Err(e) => warn!(error = %e, "skipping malformed external symbol"),
				},
				_ => {}
			}
		}

		if summary.documents == 0 && summary.skipped_documents > 0 {
			return Err(ScipError::NoDocuments);
		}

		info!(
			documents = summary.documents,
			occurrences = summary.occurrences,
			external_symbols = summary.external_symbols,
			skipped = summary.skipped_documents,
			"index ingested"
		);
		Ok(summary)
	}
}

fn parse_document(bytes: &[u8]) -> Result<NewScipDocument> {
	let mut reader = Reader::new(bytes);
	let mut doc = NewScipDocument::default();
	let mut has_path = false;

	while let Some((field, wire)) = reader.read_tag()? {
		if wire != WIRE_LEN {
			reader.skip(wire)?;
			continue;
		}
		match field {
			DOC_RELATIVE_PATH => {
				doc.relative_path = reader.read_string()?;
				has_path = !doc.relative_path.is_empty();
			}
			DOC_LANGUAGE => doc.language = Some(reader.read_string()?),
			DOC_OCCURRENCE => {
				if let Some(occurrence) = parse_occurrence(reader.read_bytes()?)? {
					doc.occurrences.push(occurrence);
				}
			}
			DOC_SYMBOL => {
				if let Some(info) = parse_symbol_info(reader.read_bytes()?)? {
					doc.symbols.push(info);
				}
			}
			_ => {
				reader.read_bytes()?;
			}
		}
	}

	if !has_path {
		return Err(ScipError::Malformed("document missing relative_path".to_string()));
	}
	Ok(doc)
}

/// Parse one occurrence; returns `None` when the record is unusable (no
/// symbol, fewer than four range integers, or an inverted range).
fn parse_occurrence(bytes: &[u8]) -> Result<Option<NewOccurrence>> {
	let mut reader = Reader::new(bytes);
	let mut symbol = String::new();
	let mut range: Vec<i64> = Vec::new();
	let mut role_flags: i64 = 0;

	while let Some((field, wire)) = reader.read_tag()? {
		match (field, wire) {
			(OCC_SYMBOL, WIRE_LEN) => symbol = reader.read_string()?,
			(OCC_RANGE, WIRE_LEN) => {
				let mut packed = Reader::new(reader.read_bytes()?);
				while !packed.is_at_end() {
					range.push(packed.read_varint()? as i64);
				}
			}
			(OCC_ROLES, WIRE_VARINT) => role_flags = reader.read_varint()? as i64,
			(_, wire) => reader.skip(wire)?,
		}
	}

	if symbol.is_empty() || range.len() < 4 {
		return Ok(None);
	}
	let (start_line, start_char, end_line, end_char) = (range[0], range[1], range[2], range[3]);
	if (start_line, start_char) > (end_line, end_char) {
		return Ok(None);
	}

	Ok(Some(NewOccurrence {
		symbol,
		start_line,
		start_char,
		end_line,
		end_char,
		role_flags,
	}))
}

/// Parse symbol metadata; repeated documentation strings are joined with a
/// blank line. Returns `None` when the record carries no symbol.
fn parse_symbol_info(bytes: &[u8]) -> Result<Option<NewSymbolInfo>> {
	let mut reader = Reader::new(bytes);
	let mut symbol = String::new();
	let mut display_name = None;
	let mut documentation: Vec<String> = Vec::new();

	while let Some((field, wire)) = reader.read_tag()? {
		if wire != WIRE_LEN {
			reader.skip(wire)?;
			continue;
		}
		match field {
			SYM_SYMBOL => symbol = reader.read_string()?,
			SYM_DOCUMENTATION => documentation.push(reader.read_string()?),
			SYM_DISPLAY_NAME => display_name = Some(reader.read_string()?),
			_ => {
				reader.read_bytes()?;
			}
		}
	}

	if symbol.is_empty() {
		return Ok(None);
	}
	Ok(Some(NewSymbolInfo {
		symbol,
		display_name,
		documentation: if documentation.is_empty() {
			None
		} else {
			Some(documentation.join("\n\n"))
		},
	}))
}
