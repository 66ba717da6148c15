//! Manifest sources.
//!
//! A deploy action can declare manifests in three ways, each handled by its own
//! reader:
//! - [`generator`]: output of `kustomize build`
//! - [`inline`]: documents embedded in the action config
//! - [`files`]: files on disk, by literal path or glob
//!
//! Every candidate is tagged with an [`Origin`] so that later stages can point
//! at where a manifest came from. Origins never end up in the output.

use std::{fmt, path::PathBuf};

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
	action::{DeployAction, KustomizeSpec},
	error::PipelineError,
	manifest,
};

pub mod files;
pub mod generator;
pub mod inline;

/// Where a candidate manifest was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
	/// Inline in the action config.
	Inline { config_path: PathBuf, index: usize },
	/// In a file listed under `files`; `path` is relative to the base directory.
	File { path: PathBuf, index: usize },
	/// Emitted by the generator tool run against `path`.
	Generated {
		tool: String,
		path: PathBuf,
		index: usize,
	},
}

impl fmt::Display for Origin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Origin::Inline { config_path, index } => write!(
				f,
				"declared inline in the configuration (filename: {}, index: {index})",
				config_path.display()
			),
			Origin::File { path, index } => {
				write!(f, "declared in the file {} (index: {index})", path.display())
			}
			Origin::Generated { tool, path, index } => write!(
				f,
				"generated by {tool} at path {} (index: {index})",
				path.display()
			),
		}
	}
}

/// A candidate manifest together with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedManifest {
	pub manifest: Value,
	pub origin: Origin,
}

/// Settings shared by all readers.
#[derive(Debug, Clone, Copy)]
pub struct SourceContext<'a> {
	pub action: &'a DeployAction,
	/// Executable used for the generator source.
	pub generator_binary: &'a str,
}

/// One of the ways an action declares manifests.
#[derive(Debug, Clone, Copy)]
pub enum ManifestSource<'a> {
	Generator(&'a KustomizeSpec),
	Inline(&'a [Value]),
	Files(&'a [String]),
}

impl<'a> ManifestSource<'a> {
	/// Sources declared by `action`, in the order their output is concatenated.
	pub fn for_action(action: &'a DeployAction) -> Vec<Self> {
		let mut sources = Vec::with_capacity(3);
		if let Some(kustomize) = &action.spec.kustomize {
			sources.push(ManifestSource::Generator(kustomize));
		}
		if !action.spec.manifests.is_empty() {
			sources.push(ManifestSource::Inline(&action.spec.manifests));
		}
		if !action.spec.files.is_empty() {
			sources.push(ManifestSource::Files(&action.spec.files));
		}
		sources
	}

	pub fn read(&self, ctx: &SourceContext<'_>) -> Result<Vec<TaggedManifest>, PipelineError> {
		match self {
			ManifestSource::Generator(spec) => generator::read(spec, ctx),
			ManifestSource::Inline(manifests) => inline::read(manifests, ctx),
			ManifestSource::Files(entries) => files::read(entries, ctx),
		}
	}

	fn label(&self) -> &'static str {
		match self {
			ManifestSource::Generator(_) => "generator",
			ManifestSource::Inline(_) => "inline",
			ManifestSource::Files(_) => "files",
		}
	}
}

/// Read every source of the action.
///
/// Sources are read in parallel; the result is always ordered generator,
/// inline, files. When several sources fail, the first one in that order wins.
#[instrument(skip_all, fields(action = %ctx.action.name))]
pub fn read_all(ctx: &SourceContext<'_>) -> Result<Vec<TaggedManifest>, PipelineError> {
	let sources = ManifestSource::for_action(ctx.action);
	let results: Vec<_> = sources
		.par_iter()
		.map(|source| {
			let read = source.read(ctx);
			if let Ok(manifests) = &read {
				debug!(
					source = source.label(),
					count = manifests.len(),
					"read manifests"
				);
			}
			read
		})
		.collect();

	let mut all = Vec::new();
	for result in results {
		all.extend(result?);
	}
	Ok(all)
}

/// Turn parsed documents into tagged, validated candidates.
///
/// `documents` holds each document with its position in the stream. Empty
/// documents are skipped and `List` documents are expanded into their items,
/// which share the document's origin.
pub(crate) fn tag_documents(
	documents: impl IntoIterator<Item = (usize, Value)>,
	origin_at: impl Fn(usize) -> Origin,
	ctx: &SourceContext<'_>,
) -> Result<Vec<TaggedManifest>, PipelineError> {
	let mut tagged = Vec::new();
	for (index, document) in documents {
		if document.is_null() {
			continue;
		}
		let items = if manifest::is_list(&document) {
			match document {
				Value::Object(mut obj) => match obj.remove("items") {
					Some(Value::Array(items)) => items,
					_ => Vec::new(),
				},
				_ => Vec::new(),
			}
		} else {
			vec![document]
		};

		for item in items {
			let origin = origin_at(index);
			if let Err(problem) = manifest::validate(&item) {
				return Err(PipelineError::InvalidManifest {
					action: ctx.action.long_description(),
					origin,
					problem,
				});
			}
			tagged.push(TaggedManifest {
				manifest: item,
				origin,
			});
		}
	}
	Ok(tagged)
}
