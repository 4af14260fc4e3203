use crate::error::FsError;
use serde_json::{Map, Value};

/// Permissive view over the untyped tool-argument map. Numeric and boolean
/// inputs stringify, strings parse into numbers, unknown keys are ignored.
pub struct ArgBag<'a> {
	map: Option<&'a Map<String, Value>>,
}

impl<'a> ArgBag<'a> {
	pub fn new(value: &'a Value) -> Self {
		Self {
			map: value.as_object()
		}
	}

	fn get(&self, key: &str) -> Option<&'a Value> {
		self.map.and_then(|map| map.get(key))
	}

	pub fn str_arg(&self, key: &str) -> Option<String> {
		match self.get(key)? {
			Value::String(text) => Some(text.clone()),
			Value::Number(number) => Some(number.to_string()),
			Value::Bool(flag) => Some(flag.to_string()),
			_ => None,
		}
	}

	pub fn required_str(&self, key: &str) -> Result<String, FsError> {
		self.str_arg(key).ok_or_else(|| FsError::invalid(format!("{} parameter is required", key)))
	}

	pub fn int_arg(&self, key: &str) -> Option<i64> {
		match self.get(key)? {
			Value::Number(number) => {
				number.as_i64().or_else(|| number.as_f64().map(|value| value as i64))
			}
			Value::String(text) => text.trim().parse::<i64>().ok(),
			_ => None,
		}
	}

	pub fn bool_arg(&self, key: &str) -> bool {
		match self.get(key) {
			Some(Value::Bool(flag)) => *flag,
			Some(Value::String(text)) => {
				let value = text.to_lowercase();
				value == "true" || value == "1" || value == "yes"
			}
			Some(Value::Number(number)) => number.as_f64().map(|value| value != 0.0).unwrap_or(false),
			_ => false,
		}
	}

	pub fn list_arg(&self, key: &str) -> Option<&'a Vec<Value>> {
		self.get(key).and_then(Value::as_array)
	}

	pub fn str_list(&self, key: &str) -> Vec<String> {
		let Some(items) = self.list_arg(key) else {
			return Vec::new();
		};
		items.iter()
			.filter_map(
				|item| {
					match item {
						Value::String(text) => Some(text.clone()),
						Value::Number(number) => Some(number.to_string()),
						Value::Bool(flag) => Some(flag.to_string()),
						_ => None,
					}
				})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn string_coercion_is_permissive() {
		let value = json!({"path": "a.txt", "count": 7, "flag": true});
		let args = ArgBag::new(&value);
		assert_eq!(args.str_arg("path").as_deref(), Some("a.txt"));
		assert_eq!(args.str_arg("count").as_deref(), Some("7"));
		assert_eq!(args.str_arg("flag").as_deref(), Some("true"));
		assert_eq!(args.str_arg("missing"), None);
	}

	#[test]
	fn required_string_names_the_key() {
		let value = json!({});
		let args = ArgBag::new(&value);
		let err = args.required_str("path").expect_err("must fail");
		assert!(err.to_string().contains("path"));
	}

	#[test]
	fn int_and_bool_coercion() {
		let value = json!({"n": 5, "f": 2.9, "s": "12", "t": "true", "one": 1, "off": "no"});
		let args = ArgBag::new(&value);
		assert_eq!(args.int_arg("n"), Some(5));
		assert_eq!(args.int_arg("f"), Some(2));
		assert_eq!(args.int_arg("s"), Some(12));
		assert!(args.bool_arg("t"));
		assert!(args.bool_arg("one"));
		assert!(!args.bool_arg("off"));
		assert!(!args.bool_arg("missing"));
	}

	#[test]
	fn lists_coerce_per_element() {
		let value = json!({"paths": ["a", 1, true, null]});
		let args = ArgBag::new(&value);
		assert_eq!(args.str_list("paths"), vec!["a", "1", "true"]);
		assert_eq!(args.list_arg("paths").map(|items| items.len()), Some(4));
	}
}
