use super::directory::{build_glob_set, relative_slash};
use super::stat_error;
use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::validate;
use globset::{GlobBuilder, GlobMatcher};
use ignore::WalkBuilder;

pub async fn search_files(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let pattern = args.required_str("pattern")?;
	let format = args.str_arg("format").unwrap_or_default();
	let exclude_patterns = args.str_list("excludePatterns");

	let roots = registry.snapshot();
	let resolved = validate::read_path(&path, &roots)?;
	let info = tokio::fs::metadata(&resolved).await.map_err(|err| stat_error(err, &resolved))?;
	if !info.is_dir() {
		return Err(FsError::NotADirectory(resolved));
	}

	let matcher = compile_pattern(&pattern)?;
	let excludes = build_glob_set(&exclude_patterns)?;

	let filter_root = resolved.clone();
	let filter_excludes = excludes.clone();
	let walker = WalkBuilder::new(&resolved)
		.standard_filters(false)
		.follow_links(false)
		.filter_entry(
			move |entry| {
				// Exclusions first; an excluded directory prunes its subtree.
				if entry.path_is_symlink() {
					return false;
				}
				if let Some(set) = &filter_excludes {
					let rel = relative_slash(&filter_root, entry.path());
					if !rel.is_empty() && set.is_match(&rel) {
						return false;
					}
				}
				true
			})
		.build();

	let mut matches: Vec<String> = Vec::new();
	for result in walker {
		// Permission errors mid-walk are skipped, not fatal.
		let Ok(entry) = result else {
			continue;
		};
		if entry.depth() == 0 {
			continue;
		}
		let rel = relative_slash(&resolved, entry.path());
		if matcher.matches(&rel, entry.file_name().to_string_lossy().as_ref()) {
			matches.push(entry.path().to_string_lossy().to_string());
		}
	}

	if format == "json" {
		return Ok(serde_json::to_string_pretty(&matches).map_err(|err| FsError::invalid(err.to_string()))?);
	}
	if matches.is_empty() {
		return Ok("No matches found".to_string());
	}
	let mut output = String::new();
	for entry in &matches {
		output.push_str(entry);
		output.push('\n');
	}
	Ok(output)
}

struct PatternMatcher {
	glob: GlobMatcher,
	bare_name: bool,
}

impl PatternMatcher {
	fn matches(&self, rel: &str, name: &str) -> bool {
		if self.glob.is_match(rel) {
			return true;
		}
		self.bare_name && self.glob.is_match(name)
	}
}

fn compile_pattern(pattern: &str) -> Result<PatternMatcher, FsError> {
	let glob = GlobBuilder::new(pattern)
		.literal_separator(false)
		.build()
		.map_err(|err| FsError::invalid(format!("invalid pattern {}: {}", pattern, err)))?;
	Ok(PatternMatcher {
		glob: glob.compile_matcher(),
		bare_name: !pattern.contains('/')
	})
}
