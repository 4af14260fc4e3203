use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::validate;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub async fn get_file_info(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;

	let modified = info.modified().map(format_time).unwrap_or_default();
	let mut payload = json!({
		"size": info.len(),
		"modified": modified,
		"isDirectory": info.is_dir(),
		"isFile": info.is_file(),
		"permissions": format!("0o{:03o}", super::permissions_mode(&info))
	});
	let map = payload.as_object_mut().expect("payload object");
	if let Ok(created) = info.created() {
		map.insert("created".to_string(), Value::String(format_time(created)));
	}
	if let Ok(accessed) = info.accessed() {
		map.insert("accessed".to_string(), Value::String(format_time(accessed)));
	}
	Ok(serde_json::to_string_pretty(&payload).map_err(|err| FsError::invalid(err.to_string()))?)
}

fn format_time(time: std::time::SystemTime) -> String {
	DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub async fn list_allowed_directories(registry: &Registry, _args: &ArgBag<'_>) -> Result<String, FsError> {
	let roots = registry.snapshot();
	if roots.normalized.is_empty() {
		return Ok("No allowed directories configured".to_string());
	}
	let mut output = String::from("Allowed directories:\n");
	for dir in &roots.normalized {
		output.push_str(&format!("  {}\n", dir.display()));
	}
	Ok(output)
}
