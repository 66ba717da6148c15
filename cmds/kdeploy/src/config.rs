//! Configuration file support for kdeploy
//!
//! Supports `.kdeploy-config.yaml` files that can be placed anywhere in the
//! directory hierarchy. kdeploy searches from the action directory upward to the
//! filesystem root and uses the first file found.

use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use k8s::MergeKeys;
use serde::Deserialize;

use crate::pipeline::{PipelineOptions, DEFAULT_GENERATOR_BINARY};

/// The name of the config file kdeploy looks for
pub const CONFIG_FILE_NAME: &str = ".kdeploy-config.yaml";

/// Root configuration structure for .kdeploy-config.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdeployConfig {
	#[serde(default)]
	pub generator: GeneratorConfig,

	/// Extra strategic merge keys by field-path suffix, e.g.
	/// `spec.listeners: port` for a custom resource.
	#[serde(default)]
	pub merge_keys: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
	/// Executable used for `kustomize` sources. Defaults to `kustomize` on PATH.
	#[serde(default)]
	pub binary: Option<String>,
}

impl KdeployConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		if let Some(config_path) = find_config_file(start_dir) {
			let config = Self::load_from_file(&config_path)?;
			Ok(Some(config))
		} else {
			Ok(None)
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: KdeployConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}

	pub fn pipeline_options(&self) -> PipelineOptions {
		let mut merge_keys = MergeKeys::new();
		for (suffix, key) in &self.merge_keys {
			merge_keys.insert(suffix, key);
		}
		PipelineOptions {
			generator_binary: self
				.generator
				.binary
				.clone()
				.unwrap_or_else(|| DEFAULT_GENERATOR_BINARY.to_string()),
			merge_keys,
		}
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();

	// Canonicalize if possible to handle relative paths
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}

		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => break,
		}
	}

	None
}
