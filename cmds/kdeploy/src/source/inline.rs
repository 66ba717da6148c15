//! Manifests declared inline in the action config.

use serde_json::Value;

use super::{tag_documents, Origin, SourceContext, TaggedManifest};
use crate::error::PipelineError;

pub fn read(
	manifests: &[Value],
	ctx: &SourceContext<'_>,
) -> Result<Vec<TaggedManifest>, PipelineError> {
	let config_path = &ctx.action.config_path;
	tag_documents(
		manifests.iter().cloned().enumerate(),
		|index| Origin::Inline {
			config_path: config_path.clone(),
			index,
		},
		ctx,
	)
}
