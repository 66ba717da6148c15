//! Manifests generated by a kustomize-compatible tool.

use std::{
	io::{BufReader, Read},
	path::{Path, PathBuf},
	process::{Command, Stdio},
	thread,
};

use tracing::{debug, instrument};

use super::{tag_documents, Origin, SourceContext, TaggedManifest};
use crate::{action::KustomizeSpec, error::PipelineError, yaml};

/// Flags that would break capturing the build output from stdout.
pub const DISALLOWED_ARGS: &[&str] = &["-o", "--output", "-h", "--help"];

/// Reject extra arguments the pipeline cannot run the tool with.
pub fn validate_extra_args(args: &[String], action: &str) -> Result<(), PipelineError> {
	for arg in args {
		if is_disallowed(arg) {
			return Err(PipelineError::GeneratorArgRejected {
				action: action.to_string(),
				arg: arg.clone(),
			});
		}
	}
	Ok(())
}

/// Matches the flags in their bare, `--flag=value` and attached short
/// (`-ofile`) forms.
fn is_disallowed(arg: &str) -> bool {
	let flag = arg.split_once('=').map_or(arg, |(flag, _)| flag);
	if DISALLOWED_ARGS.contains(&flag) {
		return true;
	}
	!arg.starts_with("--")
		&& DISALLOWED_ARGS
			.iter()
			.filter(|disallowed| disallowed.len() == 2)
			.any(|short| arg.starts_with(short))
}

/// Name of the tool as shown in provenance phrases.
fn tool_name(binary: &str) -> String {
	Path::new(binary)
		.file_name()
		.map(|name| name.to_string_lossy().into_owned())
		.unwrap_or_else(|| binary.to_string())
}

/// Run `<binary> build <path> <extraArgs...>` and parse its output.
#[instrument(skip_all, fields(path = %spec.path))]
pub fn read(
	spec: &KustomizeSpec,
	ctx: &SourceContext<'_>,
) -> Result<Vec<TaggedManifest>, PipelineError> {
	let action = ctx.action;
	let description = action.long_description();
	validate_extra_args(&spec.extra_args, &description)?;

	let build_path = action.base_dir.join(&spec.path);
	if !build_path.exists() {
		return Err(PipelineError::GeneratorPathMissing {
			action: description,
			path: build_path,
		});
	}

	let tool = tool_name(ctx.generator_binary);
	let failed = |reason: String| PipelineError::GeneratorExecutionFailed {
		action: description.clone(),
		tool: tool.clone(),
		reason,
	};

	let mut cmd = Command::new(ctx.generator_binary);
	cmd.arg("build");
	cmd.arg(&spec.path);
	cmd.args(&spec.extra_args);
	if !action.base_dir.as_os_str().is_empty() {
		cmd.current_dir(&action.base_dir);
	}
	cmd.stdin(Stdio::null());
	cmd.stdout(Stdio::piped());
	cmd.stderr(Stdio::piped());
	debug!(command = ?cmd, "running generator");

	let mut child = cmd.spawn().map_err(|source| PipelineError::GeneratorSpawn {
		action: description.clone(),
		tool: tool.clone(),
		source,
	})?;

	let stdout = child
		.stdout
		.take()
		.ok_or_else(|| failed("failed to capture stdout".to_string()))?;
	let stderr = child
		.stderr
		.take()
		.ok_or_else(|| failed("failed to capture stderr".to_string()))?;

	// Drain stderr concurrently so a chatty tool cannot block on a full pipe
	let stderr_handle = thread::spawn(move || {
		let mut stderr_buf = Vec::new();
		let mut stderr_reader = BufReader::new(stderr);
		stderr_reader.read_to_end(&mut stderr_buf).ok();
		stderr_buf
	});

	let mut output = String::new();
	let read_result = BufReader::new(stdout).read_to_string(&mut output);

	let status = child
		.wait()
		.map_err(|e| failed(format!("failed to wait for process: {e}")))?;
	let stderr_buf = stderr_handle
		.join()
		.map_err(|_| failed("failed to join stderr thread".to_string()))?;

	if !status.success() {
		let stderr = String::from_utf8_lossy(&stderr_buf);
		return Err(failed(format!("{status}: {}", stderr.trim())));
	}
	read_result.map_err(|e| failed(format!("failed to read output: {e}")))?;

	let documents =
		yaml::parse_documents(&output).map_err(|e| failed(format!("unparseable output: {e}")))?;
	let path = PathBuf::from(&spec.path);
	tag_documents(
		documents.into_iter().enumerate(),
		|index| Origin::Generated {
			tool: tool.clone(),
			path: path.clone(),
			index,
		},
		ctx,
	)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;

	use super::*;
	use crate::action::DeployAction;

	#[rstest]
	#[case::short_output("-o")]
	#[case::long_output("--output")]
	#[case::output_with_value("--output=out.yaml")]
	#[case::short_help("-h")]
	#[case::long_help("--help")]
	#[case::short_output_attached("-oout.yaml")]
	#[case::short_output_with_value("-o=out.yaml")]
	#[case::short_help_attached("-hv")]
	fn test_rejected_args(#[case] arg: &str) {
		let args = vec!["--enable-helm".to_string(), arg.to_string()];
		assert_matches!(
			validate_extra_args(&args, "api"),
			Err(PipelineError::GeneratorArgRejected { arg: ref rejected, .. })
				if rejected == arg
		);
	}

	#[rstest]
	#[case::enable_helm("--enable-helm")]
	#[case::load_restrictor("--load-restrictor=LoadRestrictionsNone")]
	#[case::output_lookalike("--outputs")]
	#[case::other_short_flag("-e")]
	fn test_allowed_args(#[case] arg: &str) {
		assert!(validate_extra_args(&[arg.to_string()], "api").is_ok());
	}

	#[test]
	fn test_rejected_args_do_not_spawn() {
		let mut action = DeployAction::new("api");
		action.base_dir = PathBuf::from("/nonexistent");
		let spec = KustomizeSpec {
			path: ".".to_string(),
			extra_args: vec!["-o".to_string()],
		};
		let ctx = SourceContext {
			action: &action,
			generator_binary: "/nonexistent/kustomize",
		};
		assert_matches!(
			read(&spec, &ctx),
			Err(PipelineError::GeneratorArgRejected { .. })
		);
	}

	#[test]
	fn test_missing_build_path() {
		let temp = tempfile::TempDir::new().unwrap();
		let mut action = DeployAction::new("api");
		action.base_dir = temp.path().to_path_buf();
		let spec = KustomizeSpec {
			path: "overlays/dev".to_string(),
			extra_args: Vec::new(),
		};
		let ctx = SourceContext {
			action: &action,
			generator_binary: "kustomize",
		};
		assert_matches!(
			read(&spec, &ctx),
			Err(PipelineError::GeneratorPathMissing { .. })
		);
	}

	#[test]
	fn test_tool_name() {
		assert_eq!(tool_name("/usr/local/bin/kustomize"), "kustomize");
		assert_eq!(tool_name("kustomize"), "kustomize");
	}

	#[cfg(unix)]
	mod subprocess {
		use std::fs;

		use indoc::indoc;
		use tempfile::TempDir;

		use super::*;

		/// Run the generator as `sh`, so that `sh build <path> <args...>`
		/// interprets a script named `build` in the base directory.
		fn run(
			temp: &TempDir,
			script: &str,
			extra_args: &[&str],
		) -> Result<Vec<TaggedManifest>, PipelineError> {
			fs::write(temp.path().join("build"), script).unwrap();
			let mut action = DeployAction::new("api");
			action.base_dir = temp.path().to_path_buf();
			let spec = KustomizeSpec {
				path: ".".to_string(),
				extra_args: extra_args.iter().map(|s| s.to_string()).collect(),
			};
			let ctx = SourceContext {
				action: &action,
				generator_binary: "/bin/sh",
			};
			read(&spec, &ctx)
		}

		#[test]
		fn test_generator_output_is_tagged() {
			let temp = TempDir::new().unwrap();
			let tagged = run(
				&temp,
				indoc! {r#"
					[ "$1" = . ] || exit 4
					[ "$2" = --enable-helm ] || exit 5
					cat <<EOF
					apiVersion: v1
					kind: ConfigMap
					metadata:
					  name: a
					---
					apiVersion: apps/v1
					kind: Deployment
					metadata:
					  name: api
					EOF
				"#},
				&["--enable-helm"],
			)
			.unwrap();

			assert_eq!(tagged.len(), 2);
			assert_eq!(
				tagged[1].origin,
				Origin::Generated {
					tool: "sh".to_string(),
					path: PathBuf::from("."),
					index: 1
				}
			);
		}

		#[test]
		fn test_generator_non_zero_exit() {
			let temp = TempDir::new().unwrap();
			let err = run(&temp, "echo 'no kustomization found' >&2\nexit 1\n", &[]).unwrap_err();
			assert_matches!(
				err,
				PipelineError::GeneratorExecutionFailed { ref reason, .. }
					if reason.contains("no kustomization found")
			);
		}

		#[test]
		fn test_generator_unparseable_output() {
			let temp = TempDir::new().unwrap();
			let err = run(&temp, "echo 'a: [unclosed'\n", &[]).unwrap_err();
			assert_matches!(
				err,
				PipelineError::GeneratorExecutionFailed { ref reason, .. }
					if reason.starts_with("unparseable output")
			);
		}
	}
}
