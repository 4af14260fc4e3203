use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::stream;
use crate::validate;
use once_cell::sync::Lazy;
use serde_json::json;
use std::collections::HashMap;

static MIME_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(
	|| {
		HashMap::from([
			(".png", "image/png"),
			(".jpg", "image/jpeg"),
			(".jpeg", "image/jpeg"),
			(".gif", "image/gif"),
			(".webp", "image/webp"),
			(".bmp", "image/bmp"),
			(".svg", "image/svg+xml"),
			(".mp3", "audio/mpeg"),
			(".wav", "audio/wav"),
			(".ogg", "audio/ogg"),
			(".flac", "audio/flac"),
		])
	});

pub async fn read_media_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;

	let extension = resolved.extension()
		.map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
		.unwrap_or_default();
	let Some(mime_type) = MIME_TYPES.get(extension.as_str()) else {
		return Err(FsError::UnsupportedMediaType(extension));
	};

	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if info.is_dir() {
		return Err(FsError::IsADirectory(resolved));
	}
	let data = stream::file_to_base64(&resolved).await?;

	let content_type = if mime_type.starts_with("image/") {
		"image"
	}
	else if mime_type.starts_with("audio/") {
		"audio"
	}
	else {
		"blob"
	};
	let payload = json!({
		"type": content_type,
		"mimeType": mime_type,
		"data": data
	});
	Ok(serde_json::to_string(&payload).map_err(|err| FsError::invalid(err.to_string()))?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mime_table_is_fixed() {
		assert_eq!(MIME_TYPES.get(".png"), Some(&"image/png"));
		assert_eq!(MIME_TYPES.get(".jpeg"), Some(&"image/jpeg"));
		assert_eq!(MIME_TYPES.get(".flac"), Some(&"audio/flac"));
		assert_eq!(MIME_TYPES.get(".txt"), None);
		assert_eq!(MIME_TYPES.len(), 11);
	}
}
