// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Read side of the dependency graph: full edge set or a depth-limited
//! traversal from a root file, with cycle-closing edges marked.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use strata_server_db::DependencyStore;

use crate::error::Result;
use crate::language::detect_language;

pub const DEFAULT_TRAVERSAL_DEPTH: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
	pub id: String,
	pub label: String,
	pub path: String,
	pub language: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
	pub id: String,
	pub from: String,
	pub to: String,
	pub kind: String,
	pub is_cycle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyGraph {
	pub nodes: Vec<GraphNode>,
	pub edges: Vec<GraphEdge>,
}

/// Stable node id: every non-alphanumeric character becomes an underscore.
pub fn node_id(path: &str) -> String {
	path
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
		.collect()
}

fn basename(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RawEdge {
	source: String,
	target: String,
	kind: String,
}

pub struct GraphQuery {
	deps: Arc<dyn DependencyStore>,
}

impl GraphQuery {
	pub fn new(deps: Arc<dyn DependencyStore>) -> Self {
		Self { deps }
	}

	/// The repo's dependency graph in a language-neutral shape.
	///
	/// Without a root the full edge set is returned as-is. With a root,
	/// outgoing edges are followed breadth-first up to `depth` hops and any
	/// edge that closes a cycle inside that subgraph is flagged.
	#[instrument(skip(self), fields(repo_url = %repo_url))]
	pub async fn graph(
		&self,
		user_id: i64,
		repo_url: &str,
		root_file: Option<&str>,
		depth: usize,
	) -> Result<DependencyGraph> {
		let all = self.deps.list(user_id, repo_url).await?;
		let all: Vec<RawEdge> = all
			.into_iter()
			.map(|e| RawEdge {
				source: e.source_file,
				target: e.target_file,
				kind: e.kind,
			})
			.collect();

		let (edges, cycles) = match root_file {
			Some(root) if !root.is_empty() => {
				let subgraph = bfs_subgraph(&all, root, depth);
				let cycles = find_cycle_edges(&subgraph, root);
				(subgraph, cycles)
			}
			_ => (all, HashSet::new()),
		};

		let mut paths: Vec<&str> = Vec::new();
		let mut seen_paths = HashSet::new();
		for edge in &edges {
			for path in [edge.source.as_str(), edge.target.as_str()] {
				if seen_paths.insert(path) {
					paths.push(path);
				}
			}
		}

		let nodes = paths
			.iter()
			.map(|path| GraphNode {
				id: node_id(path),
				label: basename(path).to_string(),
				path: path.to_string(),
				language: detect_language(path).to_string(),
			})
			.collect();

		let edges = edges
			.iter()
			.enumerate()
			.map(|(i, edge)| GraphEdge {
				id: format!("e{i}"),
				from: node_id(&edge.source),
				to: node_id(&edge.target),
				kind: edge.kind.clone(),
				is_cycle: cycles.contains(&(edge.source.clone(), edge.target.clone())),
			})
			.collect::<Vec<_>>();

		info!(edges = edges.len(), "graph assembled");
		Ok(DependencyGraph { nodes, edges })
	}
}

/// Edges reachable from `root` within `depth` hops, breadth-first.
fn bfs_subgraph(all: &[RawEdge], root: &str, depth: usize) -> Vec<RawEdge> {
	let mut adjacency: HashMap<&str, Vec<&RawEdge>> = HashMap::new();
	for edge in all {
		adjacency.entry(edge.source.as_str()).or_default().push(edge);
	}

	let mut collected = Vec::new();
	let mut collected_set = HashSet::new();
	let mut visited = HashSet::new();
	let mut queue = VecDeque::new();

	visited.insert(root.to_string());
	queue.push_back((root.to_string(), 0usize));

	while let Some((node, dist)) = queue.pop_front() {
		if dist >= depth {
			continue;
		}
		let Some(outgoing) = adjacency.get(node.as_str()) else {
			continue;
		};
		for edge in outgoing {
			if collected_set.insert((*edge).clone()) {
				collected.push((*edge).clone());
			}
			if visited.insert(edge.target.clone()) {
				queue.push_back((edge.target.clone(), dist + 1));
			}
		}
	}

	collected
}

/// Back edges of a depth-first traversal over the subgraph; each one closes
/// a cycle through the node it points at.
fn find_cycle_edges(edges: &[RawEdge], root: &str) -> HashSet<(String, String)> {
	let mut adjacency: HashMap<&str, Vec<&RawEdge>> = HashMap::new();
	for edge in edges {
		adjacency.entry(edge.source.as_str()).or_default().push(edge);
	}

	#[derive(PartialEq)]
	enum State {
		OnStack,
		Done,
	}

	let mut states: HashMap<String, State> = HashMap::new();
	let mut cycles = HashSet::new();

	// Iterative DFS; (node, next child index) frames.
	let mut stack: Vec<(String, usize)> = vec![(root.to_string(), 0)];
	states.insert(root.to_string(), State::OnStack);

	while let Some((node, child_idx)) = stack.pop() {
		let children = adjacency.get(node.as_str()).cloned().unwrap_or_default();
		if child_idx >= children.len() {
			states.insert(node, State::Done);
			continue;
		}
		stack.push((node.clone(), child_idx + 1));

		let edge = children[child_idx];
		match states.get(edge.target.as_str()) {
			Some(State::OnStack) => {
				cycles.insert((edge.source.clone(), edge.target.clone()));
			}
			Some(State::Done) => {}
			None => {
				states.insert(edge.target.clone(), State::OnStack);
				stack.push((edge.target.clone(), 0));
			}
		}
	}

	cycles
}
