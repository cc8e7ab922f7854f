// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Worker pool over the persistent job queue.
//!
//! A small fixed set of workers tick independently; each tick claims at
//! most one pending job and runs it to completion, which bounds work in
//! flight without a separate semaphore. Failed jobs are not retried;
//! clients re-enqueue.

pub mod error;
pub mod handler;
pub mod worker;

pub use error::{JobError, Result};
pub use handler::{JobHandler, JobOutcome};
pub use worker::{WorkerConfig, WorkerHandlers, WorkerPool};
