use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::stream;
use crate::validate;

pub async fn copy_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let source = args.required_str("source")?;
	let destination = args.required_str("destination")?;
	let overwrite = args.bool_arg("overwrite");

	let roots = registry.snapshot();
	let resolved_src = validate::read_path(&source, &roots)?;
	let src_info = tokio::fs::metadata(&resolved_src).await.map_err(|err| stat_error(err, &resolved_src))?;
	if src_info.is_dir() {
		return Err(FsError::IsADirectory(resolved_src));
	}

	let resolved_dst = validate::final_create_path(&destination, &roots)?;
	if tokio::fs::symlink_metadata(&resolved_dst).await.is_ok() && !overwrite {
		return Err(FsError::invalid(format!(
			"destination {} already exists, set overwrite=true to replace",
			resolved_dst.display()
		)));
	}

	stream::copy_file_streaming(&resolved_src, &resolved_dst).await?;
	Ok(format!("Successfully copied {} to {}", resolved_src.display(), resolved_dst.display()))
}
