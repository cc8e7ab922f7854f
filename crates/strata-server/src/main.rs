// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Strata worker daemon: claims repository-intelligence jobs from the
//! persistent queue and runs them until interrupted.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_server::config::ServerConfig;
use strata_server::build_worker_pool;

/// Strata server - repository intelligence worker daemon.
#[derive(Parser, Debug)]
#[command(name = "strata-server", about = "Repository intelligence worker daemon", version)]
struct Args {
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("strata-server {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	// Load .env file if present
	dotenvy::dotenv().ok();

	let config = ServerConfig::from_env()?;

	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with(tracing_subscriber::fmt::layer())
		.init();

	tracing::info!(
		database_url = %config.database_url,
		repo_base_dir = %config.repo_base_dir.display(),
		workers = config.worker_count,
		"starting strata server"
	);

	let pool = strata_server_db::create_pool(&config.database_url).await?;
	strata_server_db::ensure_schema(&pool).await?;

	let workers = build_worker_pool(pool, &config, None);
	workers.start().await?;

	tokio::signal::ctrl_c().await?;
	tracing::info!("interrupt received, shutting down");
	workers.shutdown().await;

	Ok(())
}
