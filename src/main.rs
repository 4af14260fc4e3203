mod args;
mod error;
mod pathutil;
mod protocol;
mod registry;
mod server;
mod stream;
mod tools;
mod validate;

use anyhow::{anyhow, Result};
use registry::Registry;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	let mut verbose = false;
	let mut show_version = false;
	let mut list_dirs = false;
	let mut dirs: Vec<String> = Vec::new();
	let mut cli = std::env::args().skip(1);
	while let Some(arg) = cli.next() {
		match arg.as_str() {
			"--verbose" => {
				verbose = true;
			}
			"--version" => {
				show_version = true;
			}
			"--list" => {
				list_dirs = true;
			}
			other if other.starts_with('-') => {
				return Err(anyhow!("unknown argument: {}", other));
			}
			other => {
				dirs.push(other.to_string());
			}
		}
	}

	if show_version {
		println!("{}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	let level = if verbose {
		tracing::Level::DEBUG
	}
	else {
		tracing::Level::INFO
	};
	// stdout carries the protocol stream; all logging goes to stderr.
	tracing_subscriber::fmt()
		.with_max_level(level)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();

	let registry = Arc::new(Registry::new(&dirs));
	if registry.is_empty() {
		info!("no directories specified, filesystem access will be restricted");
	}

	if list_dirs {
		for dir in registry.snapshot().normalized {
			println!("{}", dir.display());
		}
		return Ok(());
	}

	server::run(registry).await
}
