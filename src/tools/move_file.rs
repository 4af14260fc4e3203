use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::stream;
use crate::validate;
use filetime::{set_file_times, FileTime};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub async fn move_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let source = args.required_str("source")?;
	let destination = args.required_str("destination")?;

	let roots = registry.snapshot();
	let resolved_src = validate::read_path(&source, &roots)?;
	tokio::fs::metadata(&resolved_src).await.map_err(|err| stat_error(err, &resolved_src))?;

	let resolved_dst = validate::final_create_path(&destination, &roots)?;
	if tokio::fs::symlink_metadata(&resolved_dst).await.is_ok() {
		return Err(FsError::invalid(format!("destination {} already exists", resolved_dst.display())));
	}

	match tokio::fs::rename(&resolved_src, &resolved_dst).await {
		Ok(()) => {}
		Err(err) if is_cross_device(&err) => {
			move_across_devices(&resolved_src, &resolved_dst).await?;
		}
		Err(err) => return Err(err.into()),
	}
	Ok(format!("Successfully moved {} to {}", resolved_src.display(), resolved_dst.display()))
}

fn is_cross_device(err: &std::io::Error) -> bool {
	err.raw_os_error() == Some(libc::EXDEV)
}

async fn move_across_devices(src: &Path, dst: &Path) -> Result<(), FsError> {
	let info = tokio::fs::metadata(src).await?;
	if info.is_dir() {
		copy_dir_recursive(src.to_path_buf(), dst.to_path_buf()).await?;
		tokio::fs::remove_dir_all(src).await?;
	}
	else {
		stream::copy_file_streaming(src, dst).await?;
		copy_times(src, dst).await?;
		tokio::fs::remove_file(src).await?;
	}
	Ok(())
}

// Symlinks abort the copy: materializing a link's target on the far device
// would silently change what the tree points at.
fn copy_dir_recursive(from: PathBuf, to: PathBuf) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send>> {
	Box::pin(
		async move {
			tokio::fs::create_dir_all(&to).await?;
			let mut entries = tokio::fs::read_dir(&from).await?;
			while let Some(entry) = entries.next_entry().await? {
				let src = entry.path();
				let dst = to.join(entry.file_name());
				let file_type = entry.file_type().await?;
				if file_type.is_symlink() {
					return Err(FsError::SymlinkOperationDenied(src));
				}
				if file_type.is_dir() {
					copy_dir_recursive(src, dst).await?;
				}
				else {
					stream::copy_file_streaming(&src, &dst).await?;
					copy_times(&src, &dst).await?;
				}
			}
			let info = tokio::fs::metadata(&from).await?;
			tokio::fs::set_permissions(&to, info.permissions()).await?;
			copy_times(&from, &to).await?;
			Ok(())
		}
	)
}

async fn copy_times(src: &Path, dst: &Path) -> Result<(), FsError> {
	let info = tokio::fs::metadata(src).await?;
	let atime = FileTime::from_last_access_time(&info);
	let mtime = FileTime::from_last_modification_time(&info);
	set_file_times(dst, atime, mtime)?;
	Ok(())
}
