use crate::args::ArgBag;
use crate::error::FsError;
use crate::pathutil;
use crate::protocol::{Request, Response};
use crate::registry::Registry;
use crate::tools;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

pub async fn run(registry: Arc<Registry>) -> Result<()> {
	let stdin = io::stdin();
	let stdout = io::stdout();
	let mut reader = BufReader::new(stdin).lines();
	let mut writer = io::BufWriter::new(stdout);
	while let Some(line) = reader.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}
		let req: Request = match serde_json::from_str(&line) {
			Ok(req) => req,
			Err(err) => {
				let resp = Response::err(Value::Null, -32700, err.to_string());
				write_response(&mut writer, resp).await?;
				continue;
			}
		};
		if req.is_notification() {
			handle_notification(&registry, &req);
			continue;
		}
		let resp = handle_request(&registry, req).await;
		write_response(&mut writer, resp).await?;
	}
	Ok(())
}

async fn write_response(writer: &mut io::BufWriter<io::Stdout>, resp: Response) -> Result<()> {
	let payload = serde_json::to_string(&resp)?;
	writer.write_all(payload.as_bytes()).await?;
	writer.write_all(b"\n").await?;
	writer.flush().await?;
	Ok(())
}

fn handle_notification(registry: &Registry, req: &Request) {
	match req.method.as_str() {
		"notifications/roots" => update_roots(registry, &req.params),
		other => debug!(method = other, "ignoring notification"),
	}
}

/// Applies a "roots advertised" message: entries may be plain paths or
/// `{"uri": "file://..."}` objects. A file entry falls back to its parent
/// directory; inaccessible entries are dropped by the registry with a warning.
fn update_roots(registry: &Registry, params: &Value) {
	let Some(items) = params.get("roots").and_then(Value::as_array) else {
		warn!("roots notification without a roots array");
		return;
	};
	let mut dirs: Vec<String> = Vec::new();
	for item in items {
		let raw = match item {
			Value::String(text) => text.clone(),
			Value::Object(map) => {
				match map.get("uri").and_then(Value::as_str) {
					Some(uri) => uri.to_string(),
					None => continue,
				}
			}
			_ => continue,
		};
		let path = raw.strip_prefix("file://").unwrap_or(&raw).to_string();
		let Ok(normalized) = pathutil::normalize_path(&path) else {
			warn!(path = %path, "failed to normalize advertised root");
			continue;
		};
		match std::fs::metadata(&normalized) {
			Ok(info) if !info.is_dir() => {
				if let Some(parent) = normalized.parent() {
					dirs.push(parent.to_string_lossy().to_string());
				}
			}
			_ => dirs.push(normalized.to_string_lossy().to_string()),
		}
	}
	if !dirs.is_empty() {
		registry.replace(&dirs);
	}
}

async fn handle_request(registry: &Registry, req: Request) -> Response {
	match route(registry, &req).await {
		Ok(result) => Response::ok(req.id, result),
		Err(err) => Response::err(req.id, err.code, err.message),
	}
}

struct ProtocolError {
	code: i64,
	message: String,
}

impl ProtocolError {
	fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into()
		}
	}
}

async fn route(registry: &Registry, req: &Request) -> Result<Value, ProtocolError> {
	match req.method.as_str() {
		"initialize" => Ok(json!({
			"serverInfo": {
				"name": "fs-warden",
				"version": env!("CARGO_PKG_VERSION")
			},
			"capabilities": {
				"tools": {
					"list": true,
					"call": true
				}
			}
		})),
		"tools/list" => Ok(json!({
			"tools": tool_definitions()
		})),
		"tools/call" => {
			let name = req.params
				.get("name")
				.and_then(Value::as_str)
				.ok_or_else(|| ProtocolError::new(-32602, "name is required"))?;
			let arguments = req.params
				.get("arguments")
				.cloned()
				.unwrap_or_else(|| json!({}));
			Ok(execute_tool(registry, name, &arguments).await)
		}
		_ => Err(ProtocolError::new(-32601, "method not found")),
	}
}

/// Routes one tool call and wraps the outcome in the result envelope. Handler
/// errors become error envelopes; they never surface as protocol errors.
async fn execute_tool(registry: &Registry, name: &str, arguments: &Value) -> Value {
	let args = ArgBag::new(arguments);
	let outcome: Result<String, FsError> = match name {
		"read_text_file" => tools::read::read_text_file(registry, &args).await,
		"read_file" => tools::read::read_file(registry, &args).await,
		"read_multiple_files" => tools::read::read_multiple_files(registry, &args).await,
		"read_media_file" => tools::media::read_media_file(registry, &args).await,
		"write_file" => tools::write::write_file(registry, &args).await,
		"edit_file" => tools::edit::edit_file(registry, &args).await,
		"copy_file" => tools::copy::copy_file(registry, &args).await,
		"move_file" => tools::move_file::move_file(registry, &args).await,
		"delete_file" => tools::delete::delete_file(registry, &args).await,
		"delete_directory" => tools::delete::delete_directory(registry, &args).await,
		"create_directory" => tools::directory::create_directory(registry, &args).await,
		"list_directory" => tools::directory::list_directory(registry, &args).await,
		"list_directory_with_sizes" => tools::directory::list_directory_with_sizes(registry, &args).await,
		"directory_tree" => tools::directory::directory_tree(registry, &args).await,
		"search_files" => tools::search::search_files(registry, &args).await,
		"get_file_info" => tools::info::get_file_info(registry, &args).await,
		"list_allowed_directories" => tools::info::list_allowed_directories(registry, &args).await,
		other => Err(FsError::invalid(format!("unknown tool: {}", other))),
	};
	match outcome {
		Ok(text) => tool_result(text, false),
		Err(err) => {
			debug!(tool = name, error = %err, "tool call failed");
			tool_result(err.to_string(), true)
		}
	}
}

fn tool_result(text: String, is_error: bool) -> Value {
	json!({
		"content": [
			{
				"type": "text",
				"text": text
			}
		],
		"isError": is_error
	})
}

fn tool_definitions() -> Vec<Value> {
	vec![
		tool(
			"read_text_file",
			"Read the contents of a text file. Supports head/tail and numbered line ranges.",
			json!({
				"path": { "type": "string", "description": "Path to the file to read" },
				"head": { "type": "number", "description": "Number of lines to read from the beginning" },
				"tail": { "type": "number", "description": "Number of lines to read from the end" },
				"line_numbers": { "type": "boolean", "description": "Prefix each line with its line number" },
				"start_line": { "type": "number", "description": "First line of a numbered range (1-based)" },
				"end_line": { "type": "number", "description": "Last line of a numbered range (inclusive, 0 for end of file)" }
			}),
			&["path"]
		),
		tool(
			"read_file",
			"Read the contents of a file. Deprecated: use read_text_file instead.",
			json!({
				"path": { "type": "string", "description": "Path to the file to read" }
			}),
			&["path"]
		),
		tool(
			"read_multiple_files",
			"Read multiple files concurrently. Returns content with paths as references.",
			json!({
				"paths": { "type": "array", "items": { "type": "string" }, "description": "Array of file paths to read" },
				"format": { "type": "string", "description": "Output format: 'text' or 'json'" }
			}),
			&["paths"]
		),
		tool(
			"read_media_file",
			"Read a media file (image or audio) and return it as base64-encoded data.",
			json!({
				"path": { "type": "string", "description": "Path to the media file to read" }
			}),
			&["path"]
		),
		tool(
			"write_file",
			"Write content to a file. Creates parent directories if needed. Uses atomic write.",
			json!({
				"path": { "type": "string", "description": "Path to the file to write" },
				"content": { "type": "string", "description": "Content to write to the file" }
			}),
			&["path", "content"]
		),
		tool(
			"edit_file",
			"Apply find/replace edits to a file. Supports exact matching and whitespace-normalized line matching. Returns a unified diff.",
			json!({
				"path": { "type": "string", "description": "Path to the file to edit" },
				"edits": {
					"type": "array",
					"items": { "type": "object" },
					"description": "Array of edit operations with oldText and newText"
				},
				"dryRun": { "type": "boolean", "description": "If true, preview changes without writing" }
			}),
			&["path", "edits"]
		),
		tool(
			"copy_file",
			"Copy a file to a new location. Uses streaming for memory-efficient copying of large files.",
			json!({
				"source": { "type": "string", "description": "Path to the source file" },
				"destination": { "type": "string", "description": "Path to the destination file" },
				"overwrite": { "type": "boolean", "description": "If true, overwrite an existing destination file" }
			}),
			&["source", "destination"]
		),
		tool(
			"move_file",
			"Move or rename a file or directory. Fails if destination exists.",
			json!({
				"source": { "type": "string", "description": "Path to the source file or directory" },
				"destination": { "type": "string", "description": "Path to the destination" }
			}),
			&["source", "destination"]
		),
		tool(
			"delete_file",
			"Delete a file. Cannot delete directories (use delete_directory instead).",
			json!({
				"path": { "type": "string", "description": "Path to the file to delete" }
			}),
			&["path"]
		),
		tool(
			"delete_directory",
			"Delete a directory. Requires recursive=true for non-empty directories.",
			json!({
				"path": { "type": "string", "description": "Path to the directory to delete" },
				"recursive": { "type": "boolean", "description": "If true, delete the directory and all contents" }
			}),
			&["path"]
		),
		tool(
			"create_directory",
			"Create a directory, including any necessary parent directories.",
			json!({
				"path": { "type": "string", "description": "Path to the directory to create" }
			}),
			&["path"]
		),
		tool(
			"list_directory",
			"List contents of a directory with [FILE] and [DIR] prefixes.",
			json!({
				"path": { "type": "string", "description": "Path to the directory to list" },
				"format": { "type": "string", "description": "Output format: 'text' or 'json'" }
			}),
			&["path"]
		),
		tool(
			"list_directory_with_sizes",
			"List directory contents with file sizes in human-readable format.",
			json!({
				"path": { "type": "string", "description": "Path to the directory to list" },
				"sortBy": { "type": "string", "description": "Sort by 'name', 'size', or 'modified'" },
				"order": { "type": "string", "description": "Sort order: 'asc' or 'desc'" },
				"format": { "type": "string", "description": "Output format: 'text' or 'json'" }
			}),
			&["path"]
		),
		tool(
			"directory_tree",
			"Get a recursive tree view of files and directories as JSON.",
			json!({
				"path": { "type": "string", "description": "Path to the root directory" },
				"excludePatterns": { "type": "array", "items": { "type": "string" }, "description": "Glob patterns to exclude" }
			}),
			&["path"]
		),
		tool(
			"search_files",
			"Recursively search for files matching a glob pattern.",
			json!({
				"path": { "type": "string", "description": "Starting directory for the search" },
				"pattern": { "type": "string", "description": "Glob pattern to match file names" },
				"excludePatterns": { "type": "array", "items": { "type": "string" }, "description": "Glob patterns to exclude" },
				"format": { "type": "string", "description": "Output format: 'text' or 'json'" }
			}),
			&["path", "pattern"]
		),
		tool(
			"get_file_info",
			"Get detailed metadata about a file or directory.",
			json!({
				"path": { "type": "string", "description": "Path to the file or directory" }
			}),
			&["path"]
		),
		tool(
			"list_allowed_directories",
			"List all directories that are allowed to be accessed.",
			json!({}),
			&[]
		),
	]
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
	json!({
		"name": name,
		"description": description,
		"inputSchema": {
			"type": "object",
			"properties": properties,
			"required": required
		}
	})
}
