//! Render command handler.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::{debug, instrument, Level};

use crate::{
	action::DeployAction,
	config::KdeployConfig,
	pipeline::{ManifestPipeline, PipelineOptions},
	sink::TracingSink,
	yaml,
};

/// Format of the rendered manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
	/// YAML stream, documents separated by `---`.
	#[default]
	Yaml,
	/// JSON array.
	Json,
}

#[derive(Args)]
pub struct RenderArgs {
	/// Deploy action file
	pub action_file: PathBuf,

	/// Namespace for resources that don't declare one
	#[arg(long, short = 'n', default_value = "default")]
	pub namespace: String,

	/// Output format
	#[arg(long, short = 'o', value_enum, default_value_t = OutputFormat::Yaml)]
	pub output: OutputFormat,

	/// Log level (possible values: error, warn, info, debug, trace)
	#[arg(long)]
	pub log_level: Option<Level>,
}

/// Run the render command.
#[instrument(skip_all, fields(action_file = %args.action_file.display()))]
pub fn run<W: Write>(args: RenderArgs, mut writer: W) -> Result<()> {
	let action = DeployAction::load_from_file(&args.action_file)?;

	let options = match KdeployConfig::load_from_directory(&action.base_dir)? {
		Some(config) => config.pipeline_options(),
		None => PipelineOptions::default(),
	};
	debug!(generator = %options.generator_binary, "loaded options");

	let manifests = ManifestPipeline::new(&action, &args.namespace, &options, &TracingSink)
		.resolve()
		.with_context(|| format!("resolving manifests of {}", action.long_description()))?;

	let output = match args.output {
		OutputFormat::Yaml => yaml::to_yaml_stream(&manifests).context("rendering YAML")?,
		OutputFormat::Json => {
			let mut json = serde_json::to_string_pretty(&manifests)?;
			json.push('\n');
			json
		}
	};
	write!(writer, "{output}")?;
	writer.flush()?;
	Ok(())
}
