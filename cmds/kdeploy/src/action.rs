//! The resolved deploy action handed to the pipeline.
//!
//! An action file looks like this:
//!
//! ```yaml
//! name: api
//! mode: default
//! spec:
//!   files: [manifests/*.yaml]
//!   manifests:
//!     - apiVersion: v1
//!       kind: ConfigMap
//!       metadata: { name: api-config }
//!   kustomize:
//!     path: overlays/dev
//!     extraArgs: [--enable-helm]
//!   patchResources:
//!     - kind: Deployment
//!       name: api
//!       patch: { spec: { replicas: 3 } }
//! ```

use std::{
	fmt, fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

/// How the action is being deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
	#[default]
	Default,
	Sync,
	Local,
}

impl fmt::Display for ActionMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ActionMode::Default => write!(f, "default"),
			ActionMode::Sync => write!(f, "sync"),
			ActionMode::Local => write!(f, "local"),
		}
	}
}

/// How a patch document is merged into its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchStrategy {
	/// JSON merge patch: arrays are replaced wholesale.
	Merge,
	/// Strategic merge patch: keyed lists merge by key.
	#[default]
	Strategic,
}

impl fmt::Display for PatchStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			PatchStrategy::Merge => write!(f, "merge"),
			PatchStrategy::Strategic => write!(f, "strategic"),
		}
	}
}

/// A user-declared patch for one resource.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSpec {
	pub kind: String,
	pub name: String,
	#[serde(default)]
	pub namespace: Option<String>,
	#[serde(default)]
	pub strategy: PatchStrategy,
	pub patch: Value,
}

/// Generator tool configuration (kustomize-compatible).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KustomizeSpec {
	/// Directory to build, relative to the action's base directory.
	#[serde(default = "default_kustomize_path")]
	pub path: String,
	/// Extra arguments appended to `kustomize build <path>`.
	#[serde(default)]
	pub extra_args: Vec<String>,
}

fn default_kustomize_path() -> String {
	".".to_string()
}

impl Default for KustomizeSpec {
	fn default() -> Self {
		Self {
			path: default_kustomize_path(),
			extra_args: Vec::new(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
	/// Literal paths or glob patterns, relative to the base directory.
	#[serde(default)]
	pub files: Vec<String>,
	/// Manifests declared inline.
	#[serde(default)]
	pub manifests: Vec<Value>,
	#[serde(default)]
	pub kustomize: Option<KustomizeSpec>,
	#[serde(default)]
	pub patch_resources: Vec<PatchSpec>,
}

/// A deploy action, already resolved by the caller.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployAction {
	pub name: String,
	/// Long-form description used in diagnostics.
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub mode: ActionMode,
	/// Version string recorded in the tracking resource.
	#[serde(default)]
	pub version: Option<String>,
	#[serde(default)]
	pub spec: DeploySpec,
	/// File the action was declared in.
	#[serde(skip)]
	pub config_path: PathBuf,
	/// Directory `files` and `kustomize.path` are resolved against.
	#[serde(skip)]
	pub base_dir: PathBuf,
}

impl DeployAction {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Load an action from a YAML file.
	///
	/// The base directory is the directory containing the file.
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read action file: {}", path.display()))?;
		let mut action: DeployAction = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse action file: {}", path.display()))?;
		action.config_path = path.to_path_buf();
		action.base_dir = path
			.parent()
			.map(Path::to_path_buf)
			.unwrap_or_else(|| PathBuf::from("."));
		Ok(action)
	}

	/// Description of the action for error messages.
	pub fn long_description(&self) -> String {
		match &self.description {
			Some(description) => description.clone(),
			None => format!("deploy action \"{}\"", self.name),
		}
	}
}
