// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! One handler per job kind, wired into the worker pool by `build_worker_pool`.

pub mod git_mine;
pub mod graph_build;
pub mod scip_index;

pub use git_mine::GitMineHandler;
pub use graph_build::GraphBuildHandler;
pub use scip_index::ScipIndexHandler;
