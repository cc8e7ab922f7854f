// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Churn analytics: folds mined per-file diffs into weekly buckets and
//! serves hotspot / trend queries over them.

pub mod aggregate;
pub mod error;
pub mod query;

pub use aggregate::{monday_of_iso_week, ChurnAggregator, FileSizeHint};
pub use error::{AnalyticsError, Result};
pub use query::{
	AnalyticsQuery, Hotspot, WeekPoint, WeeklyChurn, DEFAULT_CHURN_THRESHOLD, DEFAULT_WINDOW_WEEKS,
};
