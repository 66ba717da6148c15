//! Errors produced while resolving manifests.

use std::{fmt::Write as _, path::PathBuf};

use k8s::PatchError;
use thiserror::Error;

use crate::{manifest::ResourceKey, source::Origin};

/// Why a `files` entry could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathProblem {
	/// A literal path that does not point to a file.
	NotFound,
	/// A glob pattern that matched no files.
	NoGlobMatches,
}

impl std::fmt::Display for PathProblem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PathProblem::NotFound => write!(f, "file does not exist"),
			PathProblem::NoGlobMatches => write!(f, "pattern did not match any files"),
		}
	}
}

/// A set of candidates sharing the same kind and name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
	pub key: ResourceKey,
	/// Conflicting origins, most recently discovered first.
	pub origins: Vec<Origin>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
	#[error("invalid manifest path `{entry}` in {action}: {problem}")]
	InvalidManifestPath {
		action: String,
		entry: String,
		problem: PathProblem,
	},

	#[error("invalid glob pattern `{pattern}` in {action}")]
	InvalidGlob {
		action: String,
		pattern: String,
		#[source]
		source: globset::Error,
	},

	#[error("reading {}", .path.display())]
	ReadFile {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("parsing {}: {message}", .path.display())]
	ParseDocuments { path: PathBuf, message: String },

	#[error("invalid manifest {origin} in {action}: {problem}")]
	InvalidManifest {
		action: String,
		origin: Origin,
		problem: String,
	},

	#[error(
		"kustomize.extraArgs of {action} must not contain `{arg}` \
		 (-o, --output, -h and --help are not allowed)"
	)]
	GeneratorArgRejected { action: String, arg: String },

	#[error("kustomize path {} of {action} does not exist", .path.display())]
	GeneratorPathMissing { action: String, path: PathBuf },

	#[error("failed to execute `{tool}` for {action}")]
	GeneratorSpawn {
		action: String,
		tool: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{tool} build` failed for {action}: {reason}")]
	GeneratorExecutionFailed {
		action: String,
		tool: String,
		reason: String,
	},

	#[error("{}", render_duplicates(.action, .groups))]
	DuplicateManifest {
		action: String,
		groups: Vec<DuplicateGroup>,
	},

	#[error("applying patch to {resource} in {action}")]
	PatchRejected {
		action: String,
		resource: ResourceKey,
		#[source]
		source: PatchError,
	},

	#[error("patch for {resource} in {action} must not change the kind or name of the resource")]
	PatchChangesIdentity {
		action: String,
		resource: ResourceKey,
	},

	#[error("patch for {resource} in {action} leaves an invalid manifest: {problem}")]
	PatchInvalidatesManifest {
		action: String,
		resource: ResourceKey,
		problem: String,
	},

	#[error("cannot record manifest {position} of {action} in the tracking resource: {problem}")]
	UntrackableManifest {
		action: String,
		position: usize,
		problem: String,
	},

	#[error("serializing manifest metadata")]
	Serialize(#[from] serde_json::Error),
}

fn render_duplicates(action: &str, groups: &[DuplicateGroup]) -> String {
	let mut out = format!("Duplicate manifest definitions in {action}:");
	for group in groups {
		let _ = write!(
			out,
			"\n{} named {} is declared more than once:",
			group.key.kind, group.key.name
		);
		for origin in &group.origins {
			let _ = write!(out, "\n- {origin}");
		}
	}
	out
}
