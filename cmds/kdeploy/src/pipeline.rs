//! End-to-end resolution of a deploy action into its final manifest list.

use k8s::MergeKeys;
use tracing::{debug, info, instrument};

use crate::{
	action::DeployAction,
	duplicates::check_duplicates,
	error::PipelineError,
	manifest::{self, Manifest},
	patch::apply_patches,
	postprocess,
	sink::{LogSink, TracingSink},
	source::{self, SourceContext},
};

pub const DEFAULT_GENERATOR_BINARY: &str = "kustomize";

/// Tunables that come from tool configuration rather than the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
	/// Executable run for the generator source.
	pub generator_binary: String,
	/// Merge keys for strategic patches.
	pub merge_keys: MergeKeys,
}

impl Default for PipelineOptions {
	fn default() -> Self {
		Self {
			generator_binary: DEFAULT_GENERATOR_BINARY.to_string(),
			merge_keys: MergeKeys::new(),
		}
	}
}

/// Resolves one deploy action.
///
/// Stages run in a fixed order: read sources, default namespaces, reject
/// duplicates, apply patches, annotate and append the tracking resource. Any
/// error aborts the run without output.
pub struct ManifestPipeline<'a> {
	action: &'a DeployAction,
	default_namespace: &'a str,
	options: &'a PipelineOptions,
	log: &'a dyn LogSink,
}

impl<'a> ManifestPipeline<'a> {
	pub fn new(
		action: &'a DeployAction,
		default_namespace: &'a str,
		options: &'a PipelineOptions,
		log: &'a dyn LogSink,
	) -> Self {
		Self {
			action,
			default_namespace,
			options,
			log,
		}
	}

	#[instrument(skip_all, fields(action = %self.action.name, namespace = %self.default_namespace))]
	pub fn resolve(&self) -> Result<Vec<Manifest>, PipelineError> {
		let description = self.action.long_description();
		let ctx = SourceContext {
			action: self.action,
			generator_binary: &self.options.generator_binary,
		};

		let mut candidates = source::read_all(&ctx)?;
		for candidate in &mut candidates {
			manifest::default_namespace(&mut candidate.manifest, self.default_namespace);
		}
		check_duplicates(&candidates, &description)?;

		let mut manifests: Vec<Manifest> = candidates.into_iter().map(|c| c.manifest).collect();
		debug!(count = manifests.len(), "resolved manifests");

		apply_patches(
			&mut manifests,
			&self.action.spec.patch_resources,
			&self.options.merge_keys,
			&description,
			self.log,
		)?;

		let manifests =
			postprocess::finalize(manifests, self.action, self.default_namespace, self.log)?;
		info!(count = manifests.len(), "manifests ready");
		Ok(manifests)
	}
}

/// Resolve `action` with default options, logging warnings through `tracing`.
pub fn resolve_manifests(
	action: &DeployAction,
	default_namespace: &str,
) -> Result<Vec<Manifest>, PipelineError> {
	let options = PipelineOptions::default();
	ManifestPipeline::new(action, default_namespace, &options, &TracingSink).resolve()
}
