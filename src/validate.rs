use crate::error::FsError;
use crate::pathutil;
use crate::registry::RootsSnapshot;
use std::path::{Path, PathBuf};

// The four validators are the trust boundary for every operation. They differ
// on two axes: whether the subject must already exist, and whether a final
// symlink component is rejected. They are deliberately kept as four separate
// functions; read and final-create semantics are too far apart to share a
// dispatching body safely.

/// V-Read: canonicalizes a path for read-class operations. Symlinks are
/// followed; confinement is enforced on the fully resolved path.
pub fn read_path(raw: &str, roots: &RootsSnapshot) -> Result<PathBuf, FsError> {
	let normalized = check_and_normalize(raw)?;
	let resolved = resolve_lenient(&normalized)?;
	ensure_within(resolved, &roots.resolved)
}

/// V-Create: canonicalizes a destination that may not exist yet. The final
/// component may be a symlink; callers that create must tolerate or reject
/// pre-existing targets per their own contract.
pub fn create_path(raw: &str, roots: &RootsSnapshot) -> Result<PathBuf, FsError> {
	let normalized = check_and_normalize(raw)?;
	let resolved = resolve_lenient(&normalized)?;
	ensure_within(resolved, &roots.resolved)
}

/// V-Final-Read: canonicalizes an existing path and refuses symlinks. Used by
/// delete and edit, where following a link would mutate outside the caller's
/// intent.
pub fn final_read_path(raw: &str, roots: &RootsSnapshot) -> Result<PathBuf, FsError> {
	let normalized = check_and_normalize(raw)?;
	let info = match std::fs::symlink_metadata(&normalized) {
		Ok(info) => info,
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			return Err(FsError::NotFound(normalized));
		}
		Err(err) => return Err(err.into()),
	};
	if info.file_type().is_symlink() {
		return Err(FsError::SymlinkOperationDenied(normalized));
	}
	let resolved = canonicalize_existing(&normalized)?;
	ensure_within(resolved, &roots.resolved)
}

/// V-Final-Create: canonicalizes a write destination, refusing symlinks. A
/// missing destination is anchored at its nearest existing ancestor; if no
/// ancestor below the filesystem root exists the path is rejected.
pub fn final_create_path(raw: &str, roots: &RootsSnapshot) -> Result<PathBuf, FsError> {
	let normalized = check_and_normalize(raw)?;
	match std::fs::symlink_metadata(&normalized) {
		Ok(info) => {
			if info.file_type().is_symlink() {
				return Err(FsError::SymlinkOperationDenied(normalized));
			}
			let resolved = canonicalize_existing(&normalized)?;
			ensure_within(resolved, &roots.resolved)
		}
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			let mut found: Option<&Path> = None;
			for ancestor in normalized.ancestors().skip(1) {
				if ancestor.parent().is_none() {
					break;
				}
				if std::fs::metadata(ancestor).is_ok() {
					found = Some(ancestor);
					break;
				}
			}
			let Some(ancestor) = found else {
				return Err(FsError::NoValidAncestor(normalized));
			};
			let resolved_ancestor = canonicalize_existing(ancestor)?;
			let suffix = normalized.strip_prefix(ancestor).map_err(|err| FsError::Normalization(err.to_string()))?;
			let resolved = resolved_ancestor.join(suffix);
			ensure_within(resolved, &roots.resolved)
		}
		Err(err) => Err(err.into()),
	}
}

fn check_and_normalize(raw: &str) -> Result<PathBuf, FsError> {
	if raw.is_empty() {
		return Err(FsError::EmptyPath);
	}
	if raw.contains('\0') {
		return Err(FsError::NullByte);
	}
	pathutil::normalize_path(raw)
}

// Resolves an existing path fully; a missing path is re-anchored at its
// nearest existing ancestor with the missing suffix reattached.
fn resolve_lenient(normalized: &Path) -> Result<PathBuf, FsError> {
	match std::fs::symlink_metadata(normalized) {
		Ok(_) => canonicalize_existing(normalized),
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
			for ancestor in normalized.ancestors().skip(1) {
				if std::fs::metadata(ancestor).is_ok() {
					let resolved_ancestor = canonicalize_existing(ancestor)?;
					let suffix = normalized.strip_prefix(ancestor).map_err(|err| FsError::Normalization(err.to_string()))?;
					return Ok(resolved_ancestor.join(suffix));
				}
			}
			Ok(normalized.to_path_buf())
		}
		Err(err) => Err(err.into()),
	}
}

fn canonicalize_existing(path: &Path) -> Result<PathBuf, FsError> {
	match std::fs::canonicalize(path) {
		Ok(resolved) => Ok(resolved),
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(FsError::NotFound(path.to_path_buf())),
		Err(err) => Err(err.into()),
	}
}

fn ensure_within(path: PathBuf, roots: &[PathBuf]) -> Result<PathBuf, FsError> {
	if is_within(&path, roots) {
		Ok(path)
	}
	else {
		Err(FsError::PathOutsideAllowed(path))
	}
}

/// Containment predicate: `path` equals a root or sits strictly below one.
/// Comparison is component-wise, so `/srv/allow` never claims `/srv/allowed`.
pub fn is_within(path: &Path, roots: &[PathBuf]) -> bool {
	roots.iter().any(|root| path.starts_with(root))
}

/// Creates a directory chain one component at a time, refusing to pass
/// through symlinks. A recursive mkdir would follow a planted link; this walk
/// lstats every component before creating the next.
pub fn create_dir_no_symlinks(raw: &str, roots: &RootsSnapshot) -> Result<PathBuf, FsError> {
	if raw.is_empty() {
		return Err(FsError::EmptyPath);
	}
	if raw.contains('\0') {
		return Err(FsError::NullByte);
	}
	let normalized = pathutil::normalize_path(raw)?;
	let Some(root) = longest_lexical_root(&normalized, roots) else {
		return Err(FsError::PathOutsideAllowed(normalized));
	};
	let suffix = normalized.strip_prefix(&root).map_err(|err| FsError::Normalization(err.to_string()))?.to_path_buf();
	let mut current = root;
	for component in suffix.components() {
		current.push(component);
		match std::fs::symlink_metadata(&current) {
			Ok(info) => {
				if info.file_type().is_symlink() {
					return Err(FsError::SymlinkOperationDenied(current));
				}
				if !info.is_dir() {
					return Err(FsError::NotADirectory(current));
				}
			}
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				create_path(&current.to_string_lossy(), roots)?;
				std::fs::create_dir(&current)?;
			}
			Err(err) => return Err(err.into()),
		}
	}
	Ok(normalized)
}

fn longest_lexical_root(path: &Path, roots: &RootsSnapshot) -> Option<PathBuf> {
	roots.normalized.iter()
		.chain(roots.resolved.iter())
		.filter(|root| path.starts_with(root))
		.max_by_key(|root| root.as_os_str().len())
		.cloned()
}

/// Pre-check for recursive delete: the whole tree must be symlink-free.
pub fn reject_symlink_entries(root: &Path) -> Result<(), FsError> {
	let info = std::fs::symlink_metadata(root)?;
	if info.file_type().is_symlink() {
		return Err(FsError::SymlinkOperationDenied(root.to_path_buf()));
	}
	if !info.is_dir() {
		return Ok(());
	}
	for entry in std::fs::read_dir(root)? {
		let entry = entry?;
		reject_symlink_entries(&entry.path())?;
	}
	Ok(())
}

/// Pre-check for recursive delete: the target must not contain any allowed
/// root, and must not itself be one.
pub fn ensure_no_root_inside(target: &Path, roots: &RootsSnapshot) -> Result<(), FsError> {
	for root in roots.normalized.iter().chain(roots.resolved.iter()) {
		let resolved = std::fs::canonicalize(root).unwrap_or_else(|_| root.clone());
		if resolved.starts_with(target) {
			return Err(FsError::invalid(format!(
				"cannot recursively delete {}: it contains the allowed root {}",
				target.display(), resolved.display()
			)));
		}
	}
	Ok(())
}
