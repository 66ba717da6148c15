//! Accessors for loosely-typed Kubernetes manifests.
//!
//! Manifests stay as `serde_json::Value` all the way through the pipeline, so
//! that fields we know nothing about survive patching untouched.

use std::fmt;

use serde_json::{Map, Value};

/// A single Kubernetes resource document.
pub type Manifest = Value;

/// Identity of a manifest within one deploy action.
///
/// Namespace is deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
	pub kind: String,
	pub name: String,
}

impl ResourceKey {
	pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			name: name.into(),
		}
	}

	pub fn of(manifest: &Manifest) -> Option<Self> {
		Some(Self::new(kind(manifest)?, name(manifest)?))
	}
}

impl fmt::Display for ResourceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.kind, self.name)
	}
}

pub fn api_version(manifest: &Manifest) -> Option<&str> {
	manifest.get("apiVersion").and_then(Value::as_str)
}

pub fn kind(manifest: &Manifest) -> Option<&str> {
	manifest.get("kind").and_then(Value::as_str)
}

pub fn name(manifest: &Manifest) -> Option<&str> {
	manifest.pointer("/metadata/name").and_then(Value::as_str)
}

/// Namespace of the manifest; an empty string counts as unset.
pub fn namespace(manifest: &Manifest) -> Option<&str> {
	manifest
		.pointer("/metadata/namespace")
		.and_then(Value::as_str)
		.filter(|ns| !ns.is_empty())
}

/// Check the fields every manifest must carry.
///
/// Returns a description of the first problem found.
pub fn validate(manifest: &Manifest) -> Result<(), String> {
	let Value::Object(obj) = manifest else {
		return Err(format!(
			"expected an object, got {}",
			k8s::patch::type_name(manifest)
		));
	};
	if !obj.get("apiVersion").is_some_and(Value::is_string) {
		return Err("missing attribute \"apiVersion\"".to_string());
	}
	if !obj.get("kind").is_some_and(Value::is_string) {
		return Err("missing attribute \"kind\"".to_string());
	}
	if name(manifest).is_none() {
		return Err("missing attribute \"metadata.name\"".to_string());
	}
	Ok(())
}

/// Whether a document is a `List` wrapper whose items are the real manifests.
pub fn is_list(manifest: &Manifest) -> bool {
	kind(manifest).is_some_and(|k| k == "List" || k.ends_with("List"))
		&& manifest.get("items").is_some_and(Value::is_array)
}

/// Fill in `namespace` for namespaced kinds that don't declare one.
pub fn default_namespace(manifest: &mut Manifest, namespace: &str) {
	if namespace.is_empty() || self::namespace(manifest).is_some() {
		return;
	}
	if kind(manifest).is_some_and(k8s::is_cluster_scoped_kind) {
		return;
	}
	if let Some(metadata) = metadata_mut(manifest) {
		metadata.insert(
			"namespace".to_string(),
			Value::String(namespace.to_string()),
		);
	}
}

/// Set `metadata.annotations[key]`, creating the maps as needed.
pub fn set_annotation(manifest: &mut Manifest, key: &str, value: &str) {
	let Some(metadata) = metadata_mut(manifest) else {
		return;
	};
	let annotations = metadata
		.entry("annotations")
		.or_insert_with(|| Value::Object(Map::new()));
	if !annotations.is_object() {
		*annotations = Value::Object(Map::new());
	}
	if let Value::Object(annotations) = annotations {
		annotations.insert(key.to_string(), Value::String(value.to_string()));
	}
}

fn metadata_mut(manifest: &mut Manifest) -> Option<&mut Map<String, Value>> {
	let Value::Object(obj) = manifest else {
		return None;
	};
	let metadata = obj
		.entry("metadata")
		.or_insert_with(|| Value::Object(Map::new()));
	if !metadata.is_object() {
		*metadata = Value::Object(Map::new());
	}
	metadata.as_object_mut()
}

#[cfg(test)]
mod tests {
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	#[rstest]
	#[case::valid(
		json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}}),
		None
	)]
	#[case::not_object(json!("text"), Some("expected an object, got string"))]
	#[case::no_api_version(
		json!({"kind": "ConfigMap", "metadata": {"name": "a"}}),
		Some("missing attribute \"apiVersion\"")
	)]
	#[case::numeric_api_version(
		json!({"apiVersion": 42, "kind": "ConfigMap", "metadata": {"name": "a"}}),
		Some("missing attribute \"apiVersion\"")
	)]
	#[case::no_kind(
		json!({"apiVersion": "v1", "metadata": {"name": "a"}}),
		Some("missing attribute \"kind\"")
	)]
	#[case::no_name(
		json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {}}),
		Some("missing attribute \"metadata.name\"")
	)]
	fn test_validate(#[case] manifest: Value, #[case] expected: Option<&str>) {
		assert_eq!(validate(&manifest).err().as_deref(), expected);
	}

	#[test]
	fn test_default_namespace_fills_missing() {
		let mut m = json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}});
		default_namespace(&mut m, "dev");
		assert_eq!(namespace(&m), Some("dev"));
	}

	#[test]
	fn test_default_namespace_keeps_explicit() {
		let mut m = json!({"kind": "ConfigMap", "metadata": {"name": "a", "namespace": "prod"}});
		default_namespace(&mut m, "dev");
		assert_eq!(namespace(&m), Some("prod"));
	}

	#[test]
	fn test_default_namespace_replaces_empty() {
		let mut m = json!({"kind": "ConfigMap", "metadata": {"name": "a", "namespace": ""}});
		default_namespace(&mut m, "dev");
		assert_eq!(namespace(&m), Some("dev"));
	}

	#[test]
	fn test_default_namespace_skips_cluster_scoped() {
		let mut m = json!({"apiVersion": "v1", "kind": "Namespace", "metadata": {"name": "a"}});
		default_namespace(&mut m, "dev");
		assert_eq!(m.pointer("/metadata/namespace"), None);
	}

	#[test]
	fn test_set_annotation_creates_maps() {
		let mut m = json!({"kind": "ConfigMap"});
		set_annotation(&mut m, "a/b", "c");
		assert_eq!(m["metadata"]["annotations"], json!({"a/b": "c"}));
	}

	#[test]
	fn test_set_annotation_overwrites_null_annotations() {
		let mut m = json!({"kind": "ConfigMap", "metadata": {"name": "x", "annotations": null}});
		set_annotation(&mut m, "a/b", "c");
		assert_eq!(m["metadata"]["annotations"], json!({"a/b": "c"}));
	}

	#[rstest]
	#[case::list(json!({"apiVersion": "v1", "kind": "List", "items": []}), true)]
	#[case::typed_list(json!({"apiVersion": "v1", "kind": "ConfigMapList", "items": []}), true)]
	#[case::no_items(json!({"apiVersion": "v1", "kind": "List"}), false)]
	#[case::config_map(json!({"apiVersion": "v1", "kind": "ConfigMap"}), false)]
	fn test_is_list(#[case] manifest: Value, #[case] expected: bool) {
		assert_eq!(is_list(&manifest), expected);
	}

	#[test]
	fn test_resource_key_display() {
		let m = json!({"kind": "Deployment", "metadata": {"name": "api"}});
		assert_eq!(ResourceKey::of(&m).unwrap().to_string(), "Deployment/api");
	}
}
