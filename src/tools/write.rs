use crate::args::ArgBag;
use crate::error::FsError;
use crate::pathutil;
use crate::registry::Registry;
use crate::stream;
use crate::validate;

pub async fn write_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let content = args.required_str("content")?;

	let roots = registry.snapshot();
	let resolved = validate::create_path(&path, &roots)?;
	// The chain must walk the unresolved parent: handing it the resolved form
	// would follow a planted symlink before the lstat walk ever sees it.
	let normalized = pathutil::normalize_path(&path)?;
	if let Some(parent) = normalized.parent() {
		validate::create_dir_no_symlinks(&parent.to_string_lossy(), &roots)?;
	}
	stream::atomic_write_file(&resolved, content.as_bytes(), 0o644, &roots).await?;
	Ok(format!("Successfully wrote to {}", resolved.display()))
}
