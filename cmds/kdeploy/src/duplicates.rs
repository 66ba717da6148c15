//! Rejection of manifests declared more than once.

use std::collections::HashMap;

use tracing::instrument;

use crate::{
	error::{DuplicateGroup, PipelineError},
	manifest::ResourceKey,
	source::TaggedManifest,
};

/// Fail if two candidates share a kind and name.
///
/// Every conflicting group is reported in one error. Groups are ordered by the
/// first time their key was seen; within a group, origins are listed from the
/// most recently discovered to the earliest.
#[instrument(skip_all, fields(count = candidates.len()))]
pub fn check_duplicates(candidates: &[TaggedManifest], action: &str) -> Result<(), PipelineError> {
	let mut groups: Vec<DuplicateGroup> = Vec::new();
	let mut by_key: HashMap<ResourceKey, usize> = HashMap::new();

	for candidate in candidates {
		let Some(key) = ResourceKey::of(&candidate.manifest) else {
			continue;
		};
		let slot = *by_key.entry(key.clone()).or_insert_with(|| {
			groups.push(DuplicateGroup {
				key,
				origins: Vec::new(),
			});
			groups.len() - 1
		});
		groups[slot].origins.push(candidate.origin.clone());
	}

	let mut conflicts: Vec<_> = groups
		.into_iter()
		.filter(|group| group.origins.len() > 1)
		.collect();
	if conflicts.is_empty() {
		return Ok(());
	}
	for group in &mut conflicts {
		group.origins.reverse();
	}
	Err(PipelineError::DuplicateManifest {
		action: action.to_string(),
		groups: conflicts,
	})
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;

	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::source::Origin;

	fn candidate(kind: &str, name: &str, origin: Origin) -> TaggedManifest {
		TaggedManifest {
			manifest: json!({"apiVersion": "v1", "kind": kind, "metadata": {"name": name}}),
			origin,
		}
	}

	fn file(index: usize) -> Origin {
		Origin::File {
			path: PathBuf::from("manifests.yaml"),
			index,
		}
	}

	fn inline(index: usize) -> Origin {
		Origin::Inline {
			config_path: PathBuf::from("api.action.yaml"),
			index,
		}
	}

	#[test]
	fn test_unique_candidates_pass() {
		let candidates = vec![
			candidate("ConfigMap", "a", inline(0)),
			candidate("Secret", "a", inline(1)),
			candidate("ConfigMap", "b", file(0)),
		];
		assert!(check_duplicates(&candidates, "api").is_ok());
	}

	#[test]
	fn test_namespace_is_not_part_of_identity() {
		let mut first = candidate("ConfigMap", "a", inline(0));
		first.manifest["metadata"]["namespace"] = json!("one");
		let mut second = candidate("ConfigMap", "a", file(0));
		second.manifest["metadata"]["namespace"] = json!("two");

		assert_matches!(
			check_duplicates(&[first, second], "api"),
			Err(PipelineError::DuplicateManifest { .. })
		);
	}

	#[test]
	fn test_duplicates_listed_later_first() {
		let candidates = vec![
			candidate("Deployment", "api", inline(0)),
			candidate("ConfigMap", "a", inline(1)),
			candidate("Deployment", "api", file(2)),
			candidate("ConfigMap", "a", file(3)),
			candidate("Deployment", "api", file(4)),
		];

		let err = check_duplicates(&candidates, "api").unwrap_err();
		let PipelineError::DuplicateManifest { groups, .. } = err else {
			panic!("expected DuplicateManifest");
		};
		assert_eq!(
			groups,
			vec![
				DuplicateGroup {
					key: ResourceKey::new("Deployment", "api"),
					origins: vec![file(4), file(2), inline(0)],
				},
				DuplicateGroup {
					key: ResourceKey::new("ConfigMap", "a"),
					origins: vec![file(3), inline(1)],
				},
			]
		);
	}
}
