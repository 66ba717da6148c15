//! YAML parsing and rendering of manifest streams.

use serde_json::Value;
use tracing::instrument;

/// Parse a (possibly multi-document) YAML stream.
///
/// Every document is returned, empty ones as `Value::Null`, so that callers
/// can report positions within the stream.
#[instrument(skip_all)]
pub fn parse_documents(content: &str) -> Result<Vec<Value>, String> {
	// serde-saphyr handles YAML 1.1 features still common in manifests:
	// - Multiple merge keys (<<) in the same mapping
	// - Octal numbers (0755 -> 493)
	let options = serde_saphyr::Options {
		legacy_octal_numbers: true,
		budget: None, // Manifests come from the user's own repository
		..Default::default()
	};
	serde_saphyr::from_multiple_with_options(content, options).map_err(|e| e.to_string())
}

/// Render manifests as a YAML stream, documents separated by `---`.
#[instrument(skip_all)]
pub fn to_yaml_stream(manifests: &[Value]) -> Result<String, serde_saphyr::ser_error::Error> {
	let mut output = String::new();
	for manifest in manifests {
		output.push_str("---\n");
		let options = serde_saphyr::SerializerOptions {
			indent_step: 2,
			indent_array: Some(0),
			prefer_block_scalars: true,
			empty_map_as_braces: true,
			empty_array_as_brackets: true,
			quote_numeric_strings: true,
			..Default::default()
		};
		serde_saphyr::to_fmt_writer_with_options(&mut output, manifest, options)?;
	}
	Ok(output)
}
