//! Pipeline-owned metadata: annotations on every manifest and the tracking
//! resource describing what was produced.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use crate::{
	action::DeployAction,
	error::PipelineError,
	manifest::{self, Manifest},
	sink::LogSink,
};

/// Annotation naming the action that owns a resource.
pub const SERVICE_ANNOTATION: &str = "kdeploy.dev/service";
/// Annotation carrying the mode the action was deployed in.
pub const MODE_ANNOTATION: &str = "kdeploy.dev/mode";

const TRACKING_KIND: &str = "ConfigMap";
const TRACKING_NAME_PREFIX: &str = "kdeploy-meta-deploy-";

/// Name of the tracking resource for `action`.
pub fn tracking_name(action: &DeployAction) -> String {
	format!("{TRACKING_NAME_PREFIX}{}", action.name)
}

fn is_tracking_resource(manifest: &Manifest, tracking_name: &str) -> bool {
	manifest::kind(manifest) == Some(TRACKING_KIND)
		&& manifest::name(manifest) == Some(tracking_name)
}

/// Stamp the pipeline annotations, replacing whatever was there.
pub fn annotate(manifest: &mut Manifest, action: &DeployAction) {
	manifest::set_annotation(manifest, SERVICE_ANNOTATION, &action.name);
	manifest::set_annotation(manifest, MODE_ANNOTATION, &action.mode.to_string());
}

/// What the tracking resource records about one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadataEntry {
	pub api_version: String,
	pub kind: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
}

impl ManifestMetadataEntry {
	pub fn of(manifest: &Manifest) -> Result<Self, String> {
		manifest::validate(manifest)?;
		let field = |value: Option<&str>| value.map(str::to_string).unwrap_or_default();
		Ok(Self {
			api_version: field(manifest::api_version(manifest)),
			kind: field(manifest::kind(manifest)),
			name: field(manifest::name(manifest)),
			namespace: manifest::namespace(manifest).map(str::to_string),
		})
	}
}

/// Metadata of every manifest, keyed by `kind/name`.
///
/// Every manifest must be recordable; one that is not fails the whole map.
pub fn manifest_metadata(
	manifests: &[Manifest],
	action: &str,
) -> Result<BTreeMap<String, ManifestMetadataEntry>, PipelineError> {
	manifests
		.iter()
		.enumerate()
		.map(|(position, m)| match ManifestMetadataEntry::of(m) {
			Ok(entry) => Ok((format!("{}/{}", entry.kind, entry.name), entry)),
			Err(problem) => Err(PipelineError::UntrackableManifest {
				action: action.to_string(),
				position,
				problem,
			}),
		})
		.collect()
}

/// Build the tracking resource for `manifests`.
pub fn tracking_resource(
	manifests: &[Manifest],
	action: &DeployAction,
	namespace: &str,
) -> Result<Manifest, PipelineError> {
	let metadata = manifest_metadata(manifests, &action.long_description())?;
	let metadata = serde_json::to_string(&metadata)?;

	let mut data = serde_json::Map::new();
	data.insert("mode".to_string(), Value::String(action.mode.to_string()));
	if let Some(version) = &action.version {
		data.insert("resolvedVersion".to_string(), Value::String(version.clone()));
	}
	data.insert("manifestMetadata".to_string(), Value::String(metadata));

	let mut resource = json!({
		"apiVersion": "v1",
		"kind": TRACKING_KIND,
		"metadata": {
			"name": tracking_name(action),
			"namespace": namespace,
		},
		"data": data,
	});
	annotate(&mut resource, action);
	Ok(resource)
}

/// Annotate the patched manifests and append the tracking resource.
///
/// A declared manifest that collides with the tracking resource is dropped.
#[instrument(skip_all, fields(action = %action.name))]
pub fn finalize(
	mut manifests: Vec<Manifest>,
	action: &DeployAction,
	namespace: &str,
	log: &dyn LogSink,
) -> Result<Vec<Manifest>, PipelineError> {
	let reserved = tracking_name(action);
	manifests.retain(|m| {
		if is_tracking_resource(m, &reserved) {
			log.warn(&format!(
				"{TRACKING_KIND} {reserved} in {} is reserved for deployment tracking and was \
				 ignored.",
				action.long_description()
			));
			return false;
		}
		true
	});

	for manifest in &mut manifests {
		annotate(manifest, action);
	}

	let tracking = tracking_resource(&manifests, action, namespace)?;
	manifests.push(tracking);
	Ok(manifests)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::{action::ActionMode, sink::RecordingSink};

	fn action() -> DeployAction {
		let mut action = DeployAction::new("api");
		action.mode = ActionMode::Sync;
		action.version = Some("v-1234".to_string());
		action
	}

	fn decoded_metadata(tracking: &Manifest) -> BTreeMap<String, ManifestMetadataEntry> {
		let raw = tracking["data"]["manifestMetadata"].as_str().unwrap();
		serde_json::from_str(raw).unwrap()
	}

	#[test]
	fn test_annotate_overwrites_patched_values() {
		let mut m = json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {
				"name": "a",
				"annotations": {SERVICE_ANNOTATION: "spoofed", "keep": "me"}
			}
		});
		annotate(&mut m, &action());
		assert_eq!(
			m["metadata"]["annotations"],
			json!({SERVICE_ANNOTATION: "api", MODE_ANNOTATION: "sync", "keep": "me"})
		);
	}

	#[test]
	fn test_finalize_appends_tracking_last() {
		let manifests = vec![
			json!({
				"apiVersion": "v1",
				"kind": "ConfigMap",
				"metadata": {"name": "a", "namespace": "dev"}
			}),
			json!({
				"apiVersion": "rbac.authorization.k8s.io/v1",
				"kind": "ClusterRole",
				"metadata": {"name": "reader"}
			}),
		];
		let log = RecordingSink::new();
		let out = finalize(manifests, &action(), "dev", &log).unwrap();

		assert_eq!(out.len(), 3);
		let tracking = &out[2];
		assert_eq!(tracking["metadata"]["name"], json!("kdeploy-meta-deploy-api"));
		assert_eq!(tracking["metadata"]["namespace"], json!("dev"));
		assert_eq!(tracking["data"]["mode"], json!("sync"));
		assert_eq!(tracking["data"]["resolvedVersion"], json!("v-1234"));
		assert_eq!(
			tracking["metadata"]["annotations"][SERVICE_ANNOTATION],
			json!("api")
		);
		assert!(out[..2]
			.iter()
			.all(|m| m["metadata"]["annotations"][MODE_ANNOTATION] == json!("sync")));

		let metadata = decoded_metadata(tracking);
		assert_eq!(
			metadata.keys().collect::<Vec<_>>(),
			vec!["ClusterRole/reader", "ConfigMap/a"]
		);
		assert_eq!(
			metadata["ConfigMap/a"],
			ManifestMetadataEntry {
				api_version: "v1".to_string(),
				kind: "ConfigMap".to_string(),
				name: "a".to_string(),
				namespace: Some("dev".to_string()),
			}
		);
		assert_eq!(metadata["ClusterRole/reader"].namespace, None);
	}

	#[test]
	fn test_finalize_without_manifests() {
		let log = RecordingSink::new();
		let mut action = action();
		action.version = None;
		let out = finalize(Vec::new(), &action, "default", &log).unwrap();

		assert_eq!(out.len(), 1);
		assert_eq!(out[0]["data"].get("resolvedVersion"), None);
		assert!(decoded_metadata(&out[0]).is_empty());
	}

	#[test]
	fn test_finalize_drops_reserved_name() {
		let manifests = vec![json!({
			"apiVersion": "v1",
			"kind": "ConfigMap",
			"metadata": {"name": "kdeploy-meta-deploy-api"},
			"data": {"mode": "forged"}
		})];
		let log = RecordingSink::new();
		let out = finalize(manifests, &action(), "default", &log).unwrap();

		assert_eq!(out.len(), 1);
		assert_eq!(out[0]["data"]["mode"], json!("sync"));
		assert!(decoded_metadata(&out[0]).is_empty());
		assert_eq!(log.messages().len(), 1);
	}

	#[test]
	fn test_unrecordable_manifest_fails_tracking() {
		let manifests = vec![
			json!({"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}}),
			json!({"apiVersion": 42, "kind": "ConfigMap", "metadata": {"name": "b"}}),
		];
		let log = RecordingSink::new();

		assert_matches!(
			finalize(manifests, &action(), "default", &log),
			Err(PipelineError::UntrackableManifest { position: 1, ref problem, .. })
				if problem.contains("apiVersion")
		);
	}
}
