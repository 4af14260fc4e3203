use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::stream;
use crate::validate;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const READ_MANY_WORKERS: usize = 10;

pub async fn read_text_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let head = args.int_arg("head").unwrap_or(0);
	let tail = args.int_arg("tail").unwrap_or(0);
	let line_numbers = args.bool_arg("line_numbers");
	let start_line = args.int_arg("start_line").unwrap_or(0);
	let end_line = args.int_arg("end_line").unwrap_or(0);

	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if info.is_dir() {
		return Err(FsError::IsADirectory(resolved));
	}

	if start_line > 0 || end_line > 0 {
		return stream::read_lines_numbered(&resolved, start_line, end_line).await;
	}
	if line_numbers {
		if head > 0 {
			return stream::read_lines_numbered(&resolved, 1, head).await;
		}
		if tail > 0 {
			return stream::tail_lines_numbered(&resolved, tail as usize).await;
		}
		return stream::read_lines_numbered(&resolved, 0, 0).await;
	}
	if head > 0 {
		return stream::head_file(&resolved, head as usize).await;
	}
	if tail > 0 {
		return stream::tail_file(&resolved, tail as usize).await;
	}
	Ok(tokio::fs::read_to_string(&resolved).await?)
}

pub async fn read_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if info.is_dir() {
		return Err(FsError::IsADirectory(resolved));
	}
	Ok(tokio::fs::read_to_string(&resolved).await?)
}

pub async fn read_multiple_files(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let paths = args.str_list("paths");
	if paths.is_empty() {
		return Err(FsError::invalid("no paths provided"));
	}
	let format = args.str_arg("format").unwrap_or_default();
	let roots = Arc::new(registry.snapshot());
	let semaphore = Arc::new(Semaphore::new(READ_MANY_WORKERS));
	let mut workers: JoinSet<(usize, Result<String, FsError>)> = JoinSet::new();
	for (index, path) in paths.iter().enumerate() {
		let path = path.clone();
		let roots = Arc::clone(&roots);
		let semaphore = Arc::clone(&semaphore);
		workers.spawn(
			async move {
				let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
				(index, read_one(&path, &roots).await)
			});
	}
	let mut results: Vec<Option<Result<String, FsError>>> = (0..paths.len()).map(|_| None).collect();
	while let Some(joined) = workers.join_next().await {
		let (index, outcome) = joined.map_err(|err| FsError::invalid(format!("read worker failed: {}", err)))?;
		results[index] = Some(outcome);
	}

	if format == "json" {
		let entries: Vec<_> = paths.iter()
			.zip(results.into_iter())
			.map(
				|(path, outcome)| {
					match outcome.expect("worker result") {
						Ok(content) => json!({
							"path": path,
							"content": content
						}),
						Err(err) => json!({
							"path": path,
							"error": err.to_string()
						}),
					}
				})
			.collect();
		return Ok(serde_json::to_string_pretty(&entries).map_err(|err| FsError::invalid(err.to_string()))?);
	}

	let mut output = String::new();
	for (path, outcome) in paths.iter().zip(results.into_iter()) {
		output.push_str(&format!("=== {} ===\n", path));
		match outcome.expect("worker result") {
			Ok(content) => output.push_str(&content),
			Err(err) => output.push_str(&format!("Error: {}\n", err)),
		}
		output.push_str("\n\n");
	}
	Ok(output)
}

async fn read_one(path: &str, roots: &crate::registry::RootsSnapshot) -> Result<String, FsError> {
	let resolved = validate::read_path(path, roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if info.is_dir() {
		return Err(FsError::IsADirectory(resolved));
	}
	Ok(tokio::fs::read_to_string(&resolved).await?)
}
