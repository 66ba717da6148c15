//! Patch algorithms for manifests.
//!
//! Two strategies are provided:
//!
//! - [`merge_patch`]: JSON merge patch (RFC 7386). Objects merge key by key,
//!   `null` deletes, everything else (arrays included) is replaced wholesale.
//! - [`strategic_merge_patch`]: Kubernetes-style strategic merge. Objects merge
//!   recursively, lists with a known merge key merge element-by-key (new
//!   elements are appended), other lists merge by position.
//!
//! Strategic patches understand the `$patch` directive:
//! - `$patch: replace` on an object replaces the target object wholesale
//! - `$patch: delete` on an object removes it (or, inside a keyed list, the
//!   element with the same key)

use serde_json::{Map, Value};
use thiserror::Error;

use crate::MergeKeys;

/// Name of the directive field in strategic merge patches.
pub const PATCH_DIRECTIVE: &str = "$patch";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
	#[error("patch must be an object, got {0}")]
	NotAnObject(&'static str),

	#[error("unknown $patch directive `{directive}` at `{path}`")]
	UnknownDirective { directive: String, path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
	Merge,
	Replace,
	Delete,
}

/// Apply a JSON merge patch to `target` in place.
pub fn merge_patch(target: &mut Value, patch: &Value) {
	let Value::Object(patch) = patch else {
		*target = patch.clone();
		return;
	};
	if !target.is_object() {
		*target = Value::Object(Map::new());
	}
	if let Value::Object(target) = target {
		for (key, value) in patch {
			if value.is_null() {
				target.remove(key);
			} else {
				merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
			}
		}
	}
}

/// Apply a strategic merge patch to `target` in place.
///
/// `patch` must be an object. On error `target` may be partially patched, so
/// callers that need atomicity should patch a copy.
pub fn strategic_merge_patch(
	target: &mut Value,
	patch: &Value,
	keys: &MergeKeys,
) -> Result<(), PatchError> {
	if !patch.is_object() {
		return Err(PatchError::NotAnObject(type_name(patch)));
	}
	let mut path = Vec::new();
	merge_value(target, patch, &mut path, keys)
}

fn merge_value(
	target: &mut Value,
	patch: &Value,
	path: &mut Vec<String>,
	keys: &MergeKeys,
) -> Result<(), PatchError> {
	match (target, patch) {
		(Value::Object(target), Value::Object(patch)) => merge_object(target, patch, path, keys),
		(Value::Array(target), Value::Array(patch)) => merge_array(target, patch, path, keys),
		(target, patch) => {
			*target = strip_directives(patch);
			Ok(())
		}
	}
}

fn merge_object(
	target: &mut Map<String, Value>,
	patch: &Map<String, Value>,
	path: &mut Vec<String>,
	keys: &MergeKeys,
) -> Result<(), PatchError> {
	if directive(patch, path)? == Directive::Replace {
		if let Value::Object(replacement) = strip_directives_in_map(patch) {
			*target = replacement;
		}
		return Ok(());
	}

	for (key, value) in patch {
		if key == PATCH_DIRECTIVE {
			continue;
		}
		if value.is_null() {
			target.remove(key);
			continue;
		}
		path.push(key.clone());
		if let Value::Object(nested) = value {
			if directive(nested, path)? == Directive::Delete {
				target.remove(key);
				path.pop();
				continue;
			}
		}
		match target.get_mut(key) {
			Some(existing) => merge_value(existing, value, path, keys)?,
			None => {
				target.insert(key.clone(), strip_directives(value));
			}
		}
		path.pop();
	}
	Ok(())
}

fn merge_array(
	target: &mut Vec<Value>,
	patch: &[Value],
	path: &mut Vec<String>,
	keys: &MergeKeys,
) -> Result<(), PatchError> {
	let merge_key = keys
		.lookup(path)
		.filter(|key| patch.iter().all(|item| item.get(*key).is_some()));

	let Some(merge_key) = merge_key else {
		for (i, item) in patch.iter().enumerate() {
			match target.get_mut(i) {
				Some(existing) => merge_value(existing, item, path, keys)?,
				None => target.push(strip_directives(item)),
			}
		}
		return Ok(());
	};

	for item in patch {
		let id = &item[merge_key];
		let existing = target
			.iter()
			.position(|candidate| candidate.get(merge_key) == Some(id));
		let delete = match item {
			Value::Object(map) => directive(map, path)? == Directive::Delete,
			_ => false,
		};

		match (existing, delete) {
			(Some(i), true) => {
				target.remove(i);
			}
			(None, true) => {}
			(Some(i), false) => merge_value(&mut target[i], item, path, keys)?,
			(None, false) => target.push(strip_directives(item)),
		}
	}
	Ok(())
}

fn directive(map: &Map<String, Value>, path: &[String]) -> Result<Directive, PatchError> {
	match map.get(PATCH_DIRECTIVE) {
		None => Ok(Directive::Merge),
		Some(Value::String(s)) if s == "merge" => Ok(Directive::Merge),
		Some(Value::String(s)) if s == "replace" => Ok(Directive::Replace),
		Some(Value::String(s)) if s == "delete" => Ok(Directive::Delete),
		Some(other) => Err(PatchError::UnknownDirective {
			directive: match other {
				Value::String(s) => s.clone(),
				other => other.to_string(),
			},
			path: path.join("."),
		}),
	}
}

/// Copy a patch value, dropping `$patch` directives and `null` deletions that
/// have nothing to apply to.
fn strip_directives(value: &Value) -> Value {
	match value {
		Value::Object(map) => strip_directives_in_map(map),
		Value::Array(items) => Value::Array(items.iter().map(strip_directives).collect()),
		other => other.clone(),
	}
}

fn strip_directives_in_map(map: &Map<String, Value>) -> Value {
	Value::Object(
		map.iter()
			.filter(|(key, value)| *key != PATCH_DIRECTIVE && !value.is_null())
			.map(|(key, value)| (key.clone(), strip_directives(value)))
			.collect(),
	)
}

/// Human-readable JSON type of `value`, as used in error messages.
pub fn type_name(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "boolean",
		Value::Number(_) => "number",
		Value::String(_) => "string",
		Value::Array(_) => "array",
		Value::Object(_) => "object",
	}
}
