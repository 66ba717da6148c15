//! Merge keys for strategic merge patches.
//!
//! Kubernetes marks some list fields with a `patchMergeKey`: elements of those
//! lists are identified by one of their fields instead of by position. The
//! table here covers the core API types and is addressed by field-path suffix,
//! so `containers.env` applies equally to a Pod, a Deployment's pod template
//! or a CronJob's job template.

use std::collections::BTreeMap;

use phf::phf_map;

/// Built-in merge keys, keyed by field-path suffix (`.`-joined field names,
/// array positions omitted).
static DEFAULT_MERGE_KEYS: phf::Map<&'static str, &'static str> = phf_map! {
	"containers" => "name",
	"initContainers" => "name",
	"ephemeralContainers" => "name",
	"containers.env" => "name",
	"initContainers.env" => "name",
	"ephemeralContainers.env" => "name",
	"containers.ports" => "containerPort",
	"initContainers.ports" => "containerPort",
	"containers.volumeMounts" => "mountPath",
	"initContainers.volumeMounts" => "mountPath",
	"ephemeralContainers.volumeMounts" => "mountPath",
	"containers.volumeDevices" => "devicePath",
	"initContainers.volumeDevices" => "devicePath",
	"volumes" => "name",
	"imagePullSecrets" => "name",
	"hostAliases" => "ip",
	"topologySpreadConstraints" => "topologyKey",
	"readinessGates" => "conditionType",
	"ownerReferences" => "uid",
	"spec.ports" => "port",
};

/// Merge key table used by [`crate::strategic_merge_patch`].
///
/// Starts from the built-in table; extra entries take precedence over built-in
/// ones with the same suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeKeys {
	extra: BTreeMap<String, String>,
}

impl MergeKeys {
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a merge key for lists found at `suffix`.
	pub fn insert(&mut self, suffix: impl Into<String>, key: impl Into<String>) {
		self.extra.insert(suffix.into(), key.into());
	}

	/// Builder-style [`MergeKeys::insert`].
	pub fn with_key(mut self, suffix: impl Into<String>, key: impl Into<String>) -> Self {
		self.insert(suffix, key);
		self
	}

	/// Find the merge key for the list at `path`.
	///
	/// The longest matching suffix wins.
	pub fn lookup(&self, path: &[String]) -> Option<&str> {
		for start in 0..path.len() {
			let candidate = path[start..].join(".");
			if let Some(key) = self.extra.get(&candidate) {
				return Some(key.as_str());
			}
			if let Some(key) = DEFAULT_MERGE_KEYS.get(candidate.as_str()) {
				return Some(key);
			}
		}
		None
	}
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	fn path(s: &str) -> Vec<String> {
		s.split('.').map(str::to_string).collect()
	}

	#[rstest]
	#[case::deployment_containers("spec.template.spec.containers", Some("name"))]
	#[case::deployment_env("spec.template.spec.containers.env", Some("name"))]
	#[case::pod_ports("spec.containers.ports", Some("containerPort"))]
	#[case::service_ports("spec.ports", Some("port"))]
	#[case::cronjob_mounts(
		"spec.jobTemplate.spec.template.spec.containers.volumeMounts",
		Some("mountPath")
	)]
	#[case::unkeyed_args("spec.template.spec.containers.args", None)]
	#[case::bare_env("env", None)]
	#[case::empty("", None)]
	fn test_lookup_builtin(#[case] field_path: &str, #[case] expected: Option<&str>) {
		let keys = MergeKeys::new();
		let p = if field_path.is_empty() {
			vec![]
		} else {
			path(field_path)
		};
		assert_eq!(keys.lookup(&p), expected);
	}

	#[test]
	fn test_extra_keys_extend_table() {
		let keys = MergeKeys::new().with_key("spec.rules", "host");
		assert_eq!(keys.lookup(&path("spec.rules")), Some("host"));
		assert_eq!(keys.lookup(&path("spec.other.rules")), None);
	}

	#[test]
	fn test_extra_keys_override_builtin_at_same_suffix() {
		let keys = MergeKeys::new().with_key("containers.env", "value");
		assert_eq!(
			keys.lookup(&path("spec.template.spec.containers.env")),
			Some("value")
		);
	}

	#[test]
	fn test_longest_suffix_wins() {
		// `spec.ports` (Service) must not shadow `containers.ports`
		let keys = MergeKeys::new();
		assert_eq!(
			keys.lookup(&path("spec.template.spec.containers.ports")),
			Some("containerPort")
		);
	}
}
