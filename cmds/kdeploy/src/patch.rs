//! Application of user-declared patches to resolved manifests.

use k8s::{patch::type_name, MergeKeys, PatchError};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
	action::{PatchSpec, PatchStrategy},
	error::PipelineError,
	manifest::{self, Manifest, ResourceKey},
	sink::LogSink,
};

impl PatchStrategy {
	/// Merge `patch` into `target` in place.
	pub fn apply(
		self,
		target: &mut Value,
		patch: &Value,
		keys: &MergeKeys,
	) -> Result<(), PatchError> {
		match self {
			PatchStrategy::Merge => {
				if !patch.is_object() {
					return Err(PatchError::NotAnObject(type_name(patch)));
				}
				k8s::merge_patch(target, patch);
				Ok(())
			}
			PatchStrategy::Strategic => k8s::strategic_merge_patch(target, patch, keys),
		}
	}
}

/// Whether `patch` targets `manifest`.
///
/// Kind and name must match; the namespace only when the patch names one.
pub fn matches(patch: &PatchSpec, manifest: &Manifest) -> bool {
	manifest::kind(manifest) == Some(patch.kind.as_str())
		&& manifest::name(manifest) == Some(patch.name.as_str())
		&& patch
			.namespace
			.as_deref()
			.map_or(true, |ns| manifest::namespace(manifest) == Some(ns))
}

/// Apply `patches` in order.
///
/// A patch without a target is skipped with a warning. Several patches for the
/// same manifest stack, each one seeing the result of the previous one.
#[instrument(skip_all, fields(patches = patches.len()))]
pub fn apply_patches(
	manifests: &mut [Manifest],
	patches: &[PatchSpec],
	keys: &MergeKeys,
	action: &str,
	log: &dyn LogSink,
) -> Result<(), PipelineError> {
	for patch in patches {
		let Some(target) = manifests.iter_mut().find(|m| matches(patch, m)) else {
			let namespace = patch
				.namespace
				.as_deref()
				.map(|ns| format!(" in namespace {ns}"))
				.unwrap_or_default();
			log.warn(&format!(
				"A patch is defined for a Kubernetes {} with name {}{namespace}, but no Kubernetes \
				 resource with a matching kind and name was found in {action}. The patch was not \
				 applied.",
				patch.kind, patch.name
			));
			continue;
		};

		let resource = ResourceKey::new(&patch.kind, &patch.name);
		let mut patched = target.clone();
		patch
			.strategy
			.apply(&mut patched, &patch.patch, keys)
			.map_err(|source| PipelineError::PatchRejected {
				action: action.to_string(),
				resource: resource.clone(),
				source,
			})?;
		if ResourceKey::of(&patched).as_ref() != Some(&resource) {
			return Err(PipelineError::PatchChangesIdentity {
				action: action.to_string(),
				resource,
			});
		}
		if let Err(problem) = manifest::validate(&patched) {
			return Err(PipelineError::PatchInvalidatesManifest {
				action: action.to_string(),
				resource,
				problem,
			});
		}
		debug!(%resource, strategy = %patch.strategy, "applied patch");
		*target = patched;
	}
	Ok(())
}
