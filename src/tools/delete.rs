use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::validate;

pub async fn delete_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let roots = registry.snapshot();
	let resolved = validate::final_read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if info.is_dir() {
		return Err(FsError::IsADirectory(resolved));
	}
	tokio::fs::remove_file(&resolved).await?;
	Ok(format!("Successfully deleted {}", resolved.display()))
}

pub async fn delete_directory(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let recursive = args.bool_arg("recursive");
	let roots = registry.snapshot();
	let resolved = validate::final_read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if !info.is_dir() {
		return Err(FsError::NotADirectory(resolved));
	}

	// An allowed root is never deletable.
	for root in roots.normalized.iter().chain(roots.resolved.iter()) {
		let root_resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.clone());
		if root_resolved == resolved {
			return Err(FsError::invalid(format!(
				"cannot delete allowed root directory {}", resolved.display()
			)));
		}
	}

	if recursive {
		validate::reject_symlink_entries(&resolved)?;
		validate::ensure_no_root_inside(&resolved, &roots)?;
		tokio::fs::remove_dir_all(&resolved).await?;
	}
	else {
		// Only empty directories go without recursive=true.
		tokio::fs::remove_dir(&resolved).await.map_err(
			|err| {
				FsError::invalid(format!(
					"failed to delete directory {} (may not be empty, use recursive=true): {}",
					resolved.display(), err
				))
			})?;
	}
	Ok(format!("Successfully deleted {}", resolved.display()))
}
