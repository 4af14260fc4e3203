use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::stream;
use crate::validate;
use chrono::{DateTime, SecondsFormat, Utc};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

pub async fn create_directory(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let roots = registry.snapshot();
	// The chain walk is the validation here: a planted symlink must surface
	// as SymlinkOperationDenied, not as a containment failure after resolving
	// through it.
	let created = validate::create_dir_no_symlinks(&path, &roots)?;
	Ok(format!("Successfully created directory {}", created.display()))
}

pub async fn list_directory(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let format = args.str_arg("format").unwrap_or_default();
	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if !info.is_dir() {
		return Err(FsError::NotADirectory(resolved));
	}

	let entries = read_sorted_entries(&resolved).await?;

	if format == "json" {
		let listed: Vec<_> = entries.iter()
			.map(|entry| json!({
				"name": entry.name,
				"type": entry.kind()
			}))
			.collect();
		return Ok(serde_json::to_string_pretty(&listed).map_err(|err| FsError::invalid(err.to_string()))?);
	}

	let mut output = String::new();
	for entry in &entries {
		let prefix = if entry.is_dir {
			"[DIR]"
		}
		else {
			"[FILE]"
		};
		output.push_str(&format!("{} {}\n", prefix, entry.name));
	}
	Ok(output)
}

pub async fn list_directory_with_sizes(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let sort_by = args.str_arg("sortBy").unwrap_or_default();
	let order = args.str_arg("order").unwrap_or_default();
	let format = args.str_arg("format").unwrap_or_default();
	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if !info.is_dir() {
		return Err(FsError::NotADirectory(resolved));
	}

	let mut entries = read_sorted_entries(&resolved).await?;
	let ascending = order != "desc";
	entries.sort_by(
		|a, b| {
			let ordering = match sort_by.as_str() {
				"size" => a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name)),
				"modified" => a.modified_nanos.cmp(&b.modified_nanos).then_with(|| a.name.cmp(&b.name)),
				_ => a.name.cmp(&b.name),
			};
			if ascending {
				ordering
			}
			else {
				ordering.reverse()
			}
		});

	let file_count = entries.iter().filter(|entry| !entry.is_dir).count();
	let dir_count = entries.len() - file_count;
	let total_size: u64 = entries.iter()
		.filter(|entry| !entry.is_dir)
		.map(|entry| entry.size)
		.sum();

	if format == "json" {
		let listed: Vec<_> = entries.iter()
			.map(|entry| json!({
				"name": entry.name,
				"type": entry.kind(),
				"size": entry.size,
				"modified": entry.modified_rfc3339()
			}))
			.collect();
		let payload = json!({
			"entries": listed,
			"summary": {
				"files": file_count,
				"directories": dir_count,
				"totalSize": total_size,
				"totalSizeText": stream::format_size(total_size)
			}
		});
		return Ok(serde_json::to_string_pretty(&payload).map_err(|err| FsError::invalid(err.to_string()))?);
	}

	let mut output = String::new();
	for entry in &entries {
		if entry.is_dir {
			output.push_str(&format!("[DIR]  {}\n", entry.name));
		}
		else {
			output.push_str(&format!("[FILE] {} ({})\n", entry.name, stream::format_size(entry.size)));
		}
	}
	output.push_str(
		&format!(
			"\nSummary: {} files, {} directories, Total: {}\n",
			file_count, dir_count, stream::format_size(total_size)
		)
	);
	Ok(output)
}

struct DirEntryInfo {
	name: String,
	is_dir: bool,
	size: u64,
	modified_nanos: i128,
	modified: Option<std::time::SystemTime>,
}

impl DirEntryInfo {
	fn kind(&self) -> &'static str {
		if self.is_dir {
			"directory"
		}
		else {
			"file"
		}
	}
	fn modified_rfc3339(&self) -> String {
		self.modified
			.map(|time| DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true))
			.unwrap_or_default()
	}
}

async fn read_sorted_entries(dir: &Path) -> Result<Vec<DirEntryInfo>, FsError> {
	let mut reader = tokio::fs::read_dir(dir).await?;
	let mut entries = Vec::new();
	while let Some(entry) = reader.next_entry().await? {
		let name = entry.file_name().to_string_lossy().to_string();
		let file_type = entry.file_type().await?;
		let mut info = DirEntryInfo {
			name,
			is_dir: file_type.is_dir(),
			size: 0,
			modified_nanos: 0,
			modified: None,
		};
		if let Ok(meta) = entry.metadata().await {
			if !info.is_dir {
				info.size = meta.len();
			}
			if let Ok(modified) = meta.modified() {
				info.modified = Some(modified);
				info.modified_nanos = modified.duration_since(std::time::UNIX_EPOCH)
					.map(|duration| duration.as_nanos() as i128)
					.unwrap_or(0);
			}
		}
		entries.push(info);
	}
	entries.sort_by(|a, b| a.name.cmp(&b.name));
	Ok(entries)
}

#[derive(Serialize)]
pub struct TreeEntry {
	pub name: String,
	#[serde(rename = "type")]
	pub kind: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub children: Option<Vec<TreeEntry>>,
}

pub async fn directory_tree(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let exclude_patterns = args.str_list("excludePatterns");
	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if !info.is_dir() {
		return Err(FsError::NotADirectory(resolved));
	}

	let excludes = build_glob_set(&exclude_patterns)?;
	let tree = build_tree(&resolved, &resolved, excludes.as_ref())?
		.ok_or_else(|| FsError::invalid("root directory is excluded"))?;
	Ok(serde_json::to_string_pretty(&tree).map_err(|err| FsError::invalid(err.to_string()))?)
}

// The walk lstats every entry and never descends into symlinks, so the tree
// is acyclic by construction.
fn build_tree(root: &Path, path: &Path, excludes: Option<&GlobSet>) -> Result<Option<TreeEntry>, FsError> {
	let name = path.file_name()
		.map(|value| value.to_string_lossy().to_string())
		.unwrap_or_else(|| path.to_string_lossy().to_string());
	if let Some(set) = excludes {
		let rel = relative_slash(root, path);
		if set.is_match(&name) || (!rel.is_empty() && set.is_match(&rel)) {
			return Ok(None);
		}
	}
	let info = std::fs::symlink_metadata(path)?;
	if info.file_type().is_symlink() {
		return Ok(None);
	}
	if !info.is_dir() {
		return Ok(Some(TreeEntry {
			name,
			kind: "file",
			children: None
		}));
	}
	let mut names: Vec<String> = Vec::new();
	for entry in std::fs::read_dir(path)? {
		let entry = entry?;
		names.push(entry.file_name().to_string_lossy().to_string());
	}
	names.sort();
	let mut children = Vec::new();
	for child_name in names {
		if let Some(child) = build_tree(root, &path.join(&child_name), excludes)? {
			children.push(child);
		}
	}
	Ok(Some(TreeEntry {
		name,
		kind: "directory",
		children: Some(children)
	}))
}

pub(crate) fn relative_slash(root: &Path, path: &Path) -> String {
	path.strip_prefix(root)
		.map(|rel| rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/"))
		.unwrap_or_default()
}

pub(crate) fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>, FsError> {
	if patterns.is_empty() {
		return Ok(None);
	}
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = GlobBuilder::new(pattern)
			.literal_separator(false)
			.build()
			.map_err(|err| FsError::invalid(format!("invalid glob {}: {}", pattern, err)))?;
		builder.add(glob);
	}
	let set = builder.build().map_err(|err| FsError::invalid(format!("invalid glob set: {}", err)))?;
	Ok(Some(set))
}
