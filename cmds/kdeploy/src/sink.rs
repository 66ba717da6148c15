//! Where the pipeline reports non-fatal problems.

use std::sync::Mutex;

/// Receiver for warnings raised while resolving manifests.
pub trait LogSink: Send + Sync {
	fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
	fn warn(&self, message: &str) {
		tracing::warn!("{message}");
	}
}

/// Keeps every warning in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
	messages: Mutex<Vec<String>>,
}

impl RecordingSink {
	pub fn new() -> Self {
		Self::default()
	}

	/// Warnings received so far, oldest first.
	pub fn messages(&self) -> Vec<String> {
		match self.messages.lock() {
			Ok(messages) => messages.clone(),
			Err(poisoned) => poisoned.into_inner().clone(),
		}
	}
}

impl LogSink for RecordingSink {
	fn warn(&self, message: &str) {
		let mut messages = match self.messages.lock() {
			Ok(messages) => messages,
			Err(poisoned) => poisoned.into_inner(),
		};
		messages.push(message.to_string());
	}
}
