use crate::pathutil;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{debug, info, warn};

/// The set of directories the process may touch. Each entry is kept in two
/// forms: the normalized path and the symlink-resolved path, computed once at
/// construction or replacement.
pub struct Registry {
	inner: RwLock<RootSet>,
}

#[derive(Default)]
struct RootSet {
	normalized: Vec<PathBuf>,
	resolved: Vec<PathBuf>,
}

/// A stable copy of both root lists. Validators operate on snapshots so a
/// concurrent replacement never splits the pair.
#[derive(Clone, Debug)]
pub struct RootsSnapshot {
	pub normalized: Vec<PathBuf>,
	pub resolved: Vec<PathBuf>,
}

impl Registry {
	pub fn new(dirs: &[String]) -> Self {
		Self {
			inner: RwLock::new(build_root_set(dirs))
		}
	}

	/// Replaces the allowed roots. Both lists swap together.
	pub fn replace(&self, dirs: &[String]) {
		let next = build_root_set(dirs);
		let count = next.normalized.len();
		let mut guard = self.inner.write().expect("registry lock");
		*guard = next;
		drop(guard);
		info!(count, "updated allowed directories");
	}

	pub fn snapshot(&self) -> RootsSnapshot {
		let guard = self.inner.read().expect("registry lock");
		RootsSnapshot {
			normalized: guard.normalized.clone(),
			resolved: guard.resolved.clone()
		}
	}

	pub fn is_empty(&self) -> bool {
		let guard = self.inner.read().expect("registry lock");
		guard.normalized.is_empty()
	}
}

fn build_root_set(dirs: &[String]) -> RootSet {
	let mut set = RootSet::default();
	for dir in dirs {
		let normalized = match pathutil::normalize_path(dir) {
			Ok(path) => path,
			Err(err) => {
				warn!(dir = %dir, error = %err, "failed to normalize allowed directory");
				continue;
			}
		};
		let info = match std::fs::metadata(&normalized) {
			Ok(info) => info,
			Err(err) => {
				warn!(dir = %normalized.display(), error = %err, "allowed directory not accessible");
				continue;
			}
		};
		if !info.is_dir() {
			warn!(path = %normalized.display(), "allowed path is not a directory");
			continue;
		}
		let resolved = std::fs::canonicalize(&normalized).unwrap_or_else(|_| normalized.clone());
		debug!(dir = %normalized.display(), "added allowed directory");
		set.normalized.push(normalized);
		set.resolved.push(resolved);
	}
	set
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn invalid_entries_are_dropped() {
		let tmp = tempfile::tempdir().expect("tempdir");
		let file = tmp.path().join("plain.txt");
		std::fs::write(&file, "data").expect("write");
		let registry = Registry::new(&[
			tmp.path().to_string_lossy().to_string(),
			file.to_string_lossy().to_string(),
			tmp.path().join("missing").to_string_lossy().to_string(),
			String::new(),
		]);
		let snapshot = registry.snapshot();
		assert_eq!(snapshot.normalized.len(), 1);
		assert_eq!(snapshot.resolved.len(), 1);
	}

	#[test]
	fn snapshot_lists_stay_paired() {
		let a = tempfile::tempdir().expect("tempdir");
		let b = tempfile::tempdir().expect("tempdir");
		let registry = Registry::new(&[
			a.path().to_string_lossy().to_string(),
			b.path().to_string_lossy().to_string(),
		]);
		let snapshot = registry.snapshot();
		assert_eq!(snapshot.normalized.len(), snapshot.resolved.len());
		registry.replace(&[a.path().to_string_lossy().to_string()]);
		let replaced = registry.snapshot();
		assert_eq!(replaced.normalized.len(), 1);
		assert_eq!(replaced.resolved.len(), 1);
		assert!(!registry.is_empty());
	}

	#[cfg(unix)]
	#[test]
	fn symlinked_root_is_pre_resolved() {
		let tmp = tempfile::tempdir().expect("tempdir");
		let target = tmp.path().join("target");
		std::fs::create_dir(&target).expect("mkdir");
		let link = tmp.path().join("link");
		std::os::unix::fs::symlink(&target, &link).expect("symlink");
		let registry = Registry::new(&[link.to_string_lossy().to_string()]);
		let snapshot = registry.snapshot();
		assert_eq!(snapshot.normalized, vec![link.clone()]);
		assert_eq!(snapshot.resolved, vec![std::fs::canonicalize(&target).expect("canon")]);
	}
}
