use crate::args::ArgBag;
use crate::error::FsError;
use crate::registry::Registry;
use crate::stream;
use crate::validate;
use serde_json::Value;
use similar::TextDiff;

#[derive(Clone, Debug)]
pub struct EditOperation {
	pub old_text: String,
	pub new_text: String,
	pub require_unique: Option<bool>,
	pub occurrence: Option<usize>,
}

pub async fn edit_file(registry: &Registry, args: &ArgBag<'_>) -> Result<String, FsError> {
	let path = args.required_str("path")?;
	let dry_run = args.bool_arg("dryRun");
	let edits = parse_edits(args)?;
	if edits.is_empty() {
		return Err(FsError::invalid("edits must contain at least one operation"));
	}

	let roots = registry.snapshot();
	let resolved = validate::final_read_path(&path, &roots)?;
	let original = tokio::fs::read_to_string(&resolved).await?;
	let updated = apply_edits(&original, &edits)?;
	let diff = make_diff(&original, &updated, &resolved.display().to_string());

	if dry_run {
		return Ok(format!("Dry run - changes not applied:\n\n{}", diff));
	}

	let info = tokio::fs::metadata(&resolved).await?;
	let mode = super::permissions_mode(&info);
	stream::atomic_write_file(&resolved, updated.as_bytes(), mode, &roots).await?;
	Ok(format!("Successfully edited {}\n\n{}", resolved.display(), diff))
}

fn parse_edits(args: &ArgBag<'_>) -> Result<Vec<EditOperation>, FsError> {
	let Some(items) = args.list_arg("edits") else {
		return Err(FsError::invalid("edits parameter is required"));
	};
	let mut edits = Vec::with_capacity(items.len());
	for item in items {
		let Some(map) = item.as_object() else {
			return Err(FsError::invalid("edits entries must be objects"));
		};
		let old_text = map.get("oldText")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string();
		let new_text = map.get("newText")
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string();
		let require_unique = map.get("requireUnique").and_then(Value::as_bool);
		let occurrence = match map.get("occurrence") {
			Some(value) => {
				let number = value.as_u64()
					.ok_or_else(|| FsError::invalid("occurrence must be a positive integer"))?;
				if number < 1 {
					return Err(FsError::invalid("occurrence must be >= 1"));
				}
				Some(number as usize)
			}
			None => None,
		};
		edits.push(EditOperation {
			old_text,
			new_text,
			require_unique,
			occurrence,
		});
	}
	Ok(edits)
}

/// Applies edits sequentially; later edits see earlier edits' results. Each
/// edit scans for exact byte matches and whitespace-normalized matches, then
/// resolves which to apply.
pub fn apply_edits(content: &str, edits: &[EditOperation]) -> Result<String, FsError> {
	let mut current = content.to_string();
	for edit in edits {
		if edit.old_text.is_empty() {
			return Err(FsError::invalid("oldText cannot be empty"));
		}
		let exact: Vec<usize> = current.match_indices(&edit.old_text).map(|(index, _)| index).collect();
		let normalized_content = normalize_whitespace(&current);
		let normalized_old = normalize_whitespace(&edit.old_text);
		let normalized: Vec<usize> = normalized_content.match_indices(&normalized_old).map(|(index, _)| index).collect();

		if exact.is_empty() && normalized.is_empty() {
			return Err(FsError::NoMatch);
		}
		let require_unique = edit.require_unique.unwrap_or(true);
		if require_unique {
			let count = if exact.is_empty() {
				normalized.len()
			}
			else {
				exact.len()
			};
			if count > 1 {
				return Err(FsError::AmbiguousMatch);
			}
		}
		// occurrence is only consulted when uniqueness is not required; with a
		// unique match the guard above already pinned it down.
		let occurrence = if require_unique {
			1
		}
		else {
			edit.occurrence.unwrap_or(1)
		};
		if !exact.is_empty() {
			if occurrence > exact.len() {
				return Err(FsError::invalid(format!("occurrence {} out of range", occurrence)));
			}
			let index = exact[occurrence - 1];
			let mut next = String::with_capacity(current.len() + edit.new_text.len());
			next.push_str(&current[..index]);
			next.push_str(&edit.new_text);
			next.push_str(&current[index + edit.old_text.len()..]);
			current = next;
		}
		else {
			current = replace_with_indent(&current, &edit.old_text, &edit.new_text, occurrence)?;
		}
	}
	Ok(current)
}

fn normalize_whitespace(text: &str) -> String {
	text.split('\n')
		.map(str::trim)
		.collect::<Vec<_>>()
		.join("\n")
}

// Normalized fallback: finds the occurrence-th run of lines whose trimmed
// forms equal the trimmed oldText lines, then rebuilds the replacement with
// the matched block's base indent plus each replacement line's own indent.
fn replace_with_indent(content: &str, old_text: &str, new_text: &str, occurrence: usize) -> Result<String, FsError> {
	let lines: Vec<&str> = content.split('\n').collect();
	let old_lines: Vec<&str> = old_text.split('\n').collect();
	let new_lines: Vec<&str> = new_text.split('\n').collect();
	if old_lines.len() > lines.len() {
		return Err(FsError::NoMatch);
	}
	let mut seen = 0usize;
	for start in 0..=lines.len() - old_lines.len() {
		let matched = old_lines.iter()
			.enumerate()
			.all(|(offset, old_line)| lines[start + offset].trim() == old_line.trim());
		if !matched {
			continue;
		}
		seen += 1;
		if seen != occurrence {
			continue;
		}
		let base_indent = leading_whitespace(lines[start]);
		let mut result: Vec<String> = lines[..start].iter().map(|line| line.to_string()).collect();
		for new_line in &new_lines {
			let own_indent = leading_whitespace(new_line);
			result.push(format!("{}{}{}", base_indent, own_indent, new_line.trim()));
		}
		result.extend(lines[start + old_lines.len()..].iter().map(|line| line.to_string()));
		return Ok(result.join("\n"));
	}
	if seen == 0 {
		Err(FsError::NoMatch)
	}
	else {
		Err(FsError::invalid(format!("occurrence {} out of range", occurrence)))
	}
}

fn leading_whitespace(line: &str) -> &str {
	let end = line.len() - line.trim_start_matches([' ', '\t']).len();
	&line[..end]
}

pub fn make_diff(original: &str, updated: &str, path: &str) -> String {
	if original == updated {
		return "No changes".to_string();
	}
	let diff = TextDiff::from_lines(original, updated);
	diff.unified_diff()
		.context_radius(3)
		.header(&format!("a/{}", path), &format!("b/{}", path))
		.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn edit(old: &str, new: &str) -> EditOperation {
		EditOperation {
			old_text: old.to_string(),
			new_text: new.to_string(),
			require_unique: None,
			occurrence: None
		}
	}

	#[test]
	fn exact_unique_replacement() {
		let out = apply_edits("alpha beta gamma", &[edit("beta", "BETA")]).expect("apply");
		assert_eq!(out, "alpha BETA gamma");
	}

	#[test]
	fn missing_old_text_is_no_match() {
		let err = apply_edits("alpha", &[edit("omega", "x")]).expect_err("must fail");
		assert!(matches!(err, FsError::NoMatch));
	}

	#[test]
	fn duplicate_match_requires_unique_off() {
		let err = apply_edits("repeat repeat", &[edit("repeat", "done")]).expect_err("must fail");
		assert!(matches!(err, FsError::AmbiguousMatch));

		let mut second = edit("repeat", "done");
		second.require_unique = Some(false);
		second.occurrence = Some(2);
		let out = apply_edits("repeat repeat", &[second]).expect("apply");
		assert_eq!(out, "repeat done");
	}

	#[test]
	fn occurrence_ignored_when_unique_required() {
		let mut op = edit("solo", "done");
		op.occurrence = Some(2);
		let out = apply_edits("solo text", &[op]).expect("apply");
		assert_eq!(out, "done text");
	}

	#[test]
	fn occurrence_out_of_range_is_rejected() {
		let mut op = edit("x", "y");
		op.require_unique = Some(false);
		op.occurrence = Some(3);
		let err = apply_edits("x x", &[op]).expect_err("must fail");
		assert!(matches!(err, FsError::InvalidArgument(_)));
	}

	#[test]
	fn edits_apply_sequentially() {
		let out = apply_edits("one two", &[edit("one", "1"), edit("1 two", "1 2")]).expect("apply");
		assert_eq!(out, "1 2");
	}

	#[test]
	fn idempotent_edit_is_noop() {
		let out = apply_edits("stable text", &[edit("stable", "stable")]).expect("apply");
		assert_eq!(out, "stable text");
	}

	#[test]
	fn empty_old_text_is_rejected() {
		let err = apply_edits("anything", &[edit("", "x")]).expect_err("must fail");
		assert!(matches!(err, FsError::InvalidArgument(_)));
	}

	#[test]
	fn normalized_match_preserves_indentation() {
		let content = "fn main() {\n    let a = 1;\n    let b = 2;\n}";
		let out = apply_edits(content, &[edit("let a = 1;\nlet b = 2;", "let c = 3;")]).expect("apply");
		assert_eq!(out, "fn main() {\n    let c = 3;\n}");
	}

	#[test]
	fn normalized_replacement_keeps_relative_indent() {
		let content = "    if ready {\n    go();\n    }";
		let out = apply_edits(
			content,
			&[edit("if ready {\ngo();\n}", "if ready {\n    go();\n    done();\n}")]
		).expect("apply");
		assert_eq!(out, "    if ready {\n        go();\n        done();\n    }");
	}

	#[test]
	fn normalized_ambiguity_detected() {
		let content = "  foo()\n\tfoo()";
		// No exact match (trailing space), two normalized matches.
		let err = apply_edits(content, &[edit("foo() ", "bar()")]).expect_err("must fail");
		assert!(matches!(err, FsError::AmbiguousMatch));
	}

	#[test]
	fn exact_match_wins_over_normalized() {
		let content = "  x = 1\nx = 1";
		// Exact match hits only the unindented line; normalized would be ambiguous.
		let out = apply_edits(content, &[edit("\nx = 1", "\ny = 2")]).expect("apply");
		assert_eq!(out, "  x = 1\ny = 2");
	}

	#[test]
	fn diff_contains_change_markers() {
		let diff = make_diff("a\nb\n", "a\nc\n", "file.txt");
		assert!(diff.contains("a/file.txt"));
		assert!(diff.contains("b/file.txt"));
		assert!(diff.contains("-b"));
		assert!(diff.contains("+c"));
		assert_eq!(make_diff("same", "same", "file.txt"), "No changes");
	}
}
