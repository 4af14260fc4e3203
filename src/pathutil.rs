use crate::error::FsError;
use std::path::{Component, Path, PathBuf};

/// Lexically normalizes a caller-supplied path: expands `~`, makes it
/// absolute against the working directory, and cleans `.`/`..` without
/// touching the filesystem.
pub fn normalize_path(raw: &str) -> Result<PathBuf, FsError> {
	let expanded = expand_home(raw);
	#[cfg(windows)]
	let expanded = normalize_windows_path(&expanded);
	if expanded.is_empty() {
		return Err(FsError::EmptyPath);
	}
	let path = Path::new(&expanded);
	let absolute = if path.is_absolute() {
		path.to_path_buf()
	}
	else {
		let cwd = std::env::current_dir().map_err(|err| FsError::Normalization(err.to_string()))?;
		cwd.join(path)
	};
	Ok(clean_path(&absolute))
}

pub fn expand_home(path: &str) -> String {
	if !path.starts_with('~') {
		return path.to_string();
	}
	let Some(home) = home_dir() else {
		return path.to_string();
	};
	if path == "~" {
		return home;
	}
	if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
		return Path::new(&home).join(rest).to_string_lossy().to_string();
	}
	path.to_string()
}

fn home_dir() -> Option<String> {
	if cfg!(windows) {
		std::env::var("USERPROFILE").ok()
	}
	else {
		std::env::var("HOME").ok()
	}
}

#[cfg(windows)]
fn normalize_windows_path(path: &str) -> String {
	// WSL-style /mnt/<letter>/... becomes <LETTER>:\...
	if let Some(rest) = path.strip_prefix("/mnt/") {
		let mut chars = rest.chars();
		if let Some(letter) = chars.next() {
			if letter.is_ascii_alphabetic() {
				let tail: String = chars.collect();
				return format!("{}:{}", letter.to_ascii_uppercase(), tail.replace('/', "\\"));
			}
		}
	}
	// UNC prefixes pass through untouched
	if path.starts_with("//") || path.starts_with("\\\\") {
		return path.to_string();
	}
	path.replace('/', "\\")
}

/// Collapses `.` and `..` components and duplicate separators without
/// consulting the filesystem. `..` never escapes an absolute root.
pub fn clean_path(path: &Path) -> PathBuf {
	let mut parts: Vec<std::ffi::OsString> = Vec::new();
	let mut prefix: Option<std::ffi::OsString> = None;
	let mut rooted = false;
	for component in path.components() {
		match component {
			Component::Prefix(value) => {
				prefix = Some(value.as_os_str().to_os_string());
			}
			Component::RootDir => {
				rooted = true;
				parts.clear();
			}
			Component::CurDir => {}
			Component::ParentDir => {
				if !parts.is_empty() {
					parts.pop();
				}
				else if !rooted {
					parts.push(std::ffi::OsString::from(".."));
				}
			}
			Component::Normal(value) => parts.push(value.to_os_string()),
		}
	}
	let mut out = PathBuf::new();
	if let Some(prefix) = prefix {
		out.push(prefix);
	}
	if rooted {
		out.push(std::path::MAIN_SEPARATOR.to_string());
	}
	for part in parts {
		out.push(part);
	}
	out
}
