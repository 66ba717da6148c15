//! Manifests read from files on disk.
//!
//! Each entry of `spec.files` is first tried as a literal path relative to the
//! action's base directory. Anything else that looks like a glob is expanded
//! by walking the base directory.

use std::{
	collections::HashSet,
	fs,
	path::{Component, Path, PathBuf},
};

use globset::GlobBuilder;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{instrument, trace};
use walkdir::{DirEntry, WalkDir};

use super::{tag_documents, Origin, SourceContext, TaggedManifest};
use crate::{
	error::{PathProblem, PipelineError},
	yaml,
};

/// A file selected by one or more `files` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
	/// Path used to open the file.
	pub path: PathBuf,
	/// Path relative to the base directory, shown in diagnostics.
	pub display_path: PathBuf,
}

#[instrument(skip_all, fields(entries = entries.len()))]
pub fn read(
	entries: &[String],
	ctx: &SourceContext<'_>,
) -> Result<Vec<TaggedManifest>, PipelineError> {
	let action = ctx.action;
	let files = resolve_paths(&action.base_dir, entries, &action.long_description())?;

	let results: Vec<_> = files.par_iter().map(|file| read_file(file, ctx)).collect();
	let mut tagged = Vec::new();
	for result in results {
		tagged.extend(result?);
	}
	Ok(tagged)
}

fn read_file(
	file: &ResolvedFile,
	ctx: &SourceContext<'_>,
) -> Result<Vec<TaggedManifest>, PipelineError> {
	let content = fs::read_to_string(&file.path).map_err(|source| PipelineError::ReadFile {
		path: file.path.clone(),
		source,
	})?;
	let documents =
		yaml::parse_documents(&content).map_err(|message| PipelineError::ParseDocuments {
			path: file.display_path.clone(),
			message,
		})?;
	tag_documents(
		documents.into_iter().enumerate(),
		|index| Origin::File {
			path: file.display_path.clone(),
			index,
		},
		ctx,
	)
}

/// Resolve `files` entries to the files they select, in declaration order.
///
/// A file selected by several entries is returned once, at its first position.
/// Fails on the first literal path that does not exist and on the first glob
/// that matches nothing.
pub fn resolve_paths(
	base_dir: &Path,
	entries: &[String],
	action: &str,
) -> Result<Vec<ResolvedFile>, PipelineError> {
	let base = if base_dir.as_os_str().is_empty() {
		Path::new(".")
	} else {
		base_dir
	};
	let invalid = |entry: &str, problem| PipelineError::InvalidManifestPath {
		action: action.to_string(),
		entry: entry.to_string(),
		problem,
	};

	let mut seen = HashSet::new();
	let mut resolved = Vec::new();
	for entry in entries {
		let literal = base.join(entry);
		let candidates = if literal.is_file() {
			vec![literal]
		} else if is_glob(entry) {
			let matches = expand_glob(base, entry, action)?;
			if matches.is_empty() {
				return Err(invalid(entry, PathProblem::NoGlobMatches));
			}
			matches
		} else {
			return Err(invalid(entry, PathProblem::NotFound));
		};
		trace!(entry = %entry, count = candidates.len(), "resolved files entry");

		for path in candidates {
			let identity = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
			if !seen.insert(identity) {
				continue;
			}
			let display_path = path
				.strip_prefix(base)
				.map(without_cur_dir)
				.unwrap_or_else(|_| path.clone());
			resolved.push(ResolvedFile { path, display_path });
		}
	}
	Ok(resolved)
}

/// Whether an entry contains glob metacharacters.
pub fn is_glob(entry: &str) -> bool {
	entry.contains(['*', '?', '[', '{'])
}

/// Files matching `pattern`, sorted by path.
///
/// Leading components without metacharacters select the directory to walk,
/// so patterns may point above `base` or be absolute. Hidden directories below
/// that point are not descended into.
fn expand_glob(base: &Path, pattern: &str, action: &str) -> Result<Vec<PathBuf>, PipelineError> {
	let mut normalized = pattern;
	while let Some(rest) = normalized.strip_prefix("./") {
		normalized = rest;
	}
	let (prefix, remainder) = split_literal_prefix(normalized);
	let root = if prefix.is_empty() {
		base.to_path_buf()
	} else {
		base.join(prefix)
	};

	let matcher = GlobBuilder::new(remainder)
		.literal_separator(true)
		.build()
		.map_err(|source| PipelineError::InvalidGlob {
			action: action.to_string(),
			pattern: pattern.to_string(),
			source,
		})?
		.compile_matcher();

	if !root.is_dir() {
		return Ok(Vec::new());
	}
	let walker = WalkDir::new(&root)
		.follow_links(true)
		.sort_by_file_name()
		.into_iter()
		.filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e));

	let mut matches = Vec::new();
	for entry in walker {
		let entry = entry.map_err(|err| PipelineError::ReadFile {
			path: err.path().unwrap_or(root.as_path()).to_path_buf(),
			source: err.into(),
		})?;
		if !entry.file_type().is_file() {
			continue;
		}
		let Ok(relative) = entry.path().strip_prefix(&root) else {
			continue;
		};
		if matcher.is_match(relative) {
			matches.push(entry.into_path());
		}
	}
	Ok(matches)
}

/// Split `pattern` before its first component containing metacharacters.
fn split_literal_prefix(pattern: &str) -> (&str, &str) {
	let mut offset = 0;
	for component in pattern.split('/') {
		if is_glob(component) {
			break;
		}
		offset += component.len() + 1;
	}
	let offset = offset.min(pattern.len());
	let (prefix, remainder) = pattern.split_at(offset);
	let prefix = prefix
		.strip_suffix('/')
		.filter(|p| !p.is_empty())
		.unwrap_or(prefix);
	(prefix, remainder)
}

fn is_hidden_dir(entry: &DirEntry) -> bool {
	entry.file_type().is_dir()
		&& entry
			.file_name()
			.to_str()
			.is_some_and(|name| name.starts_with('.'))
}

fn without_cur_dir(path: &Path) -> PathBuf {
	path.components()
		.filter(|c| !matches!(c, Component::CurDir))
		.collect()
}
