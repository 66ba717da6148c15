//! Resolution of the Kubernetes manifests of a deploy action.
//!
//! Manifests are gathered from a kustomize-compatible generator, from the action
//! config itself and from files on disk. They are checked for duplicates,
//! patched, annotated, and completed with a tracking resource listing
//! everything that was produced. See [`pipeline::ManifestPipeline`].

pub mod action;
pub mod commands;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod manifest;
pub mod patch;
pub mod pipeline;
pub mod postprocess;
pub mod sink;
pub mod source;
pub mod telemetry;
pub mod yaml;

pub use action::DeployAction;
pub use error::PipelineError;
pub use pipeline::{resolve_manifests, ManifestPipeline, PipelineOptions};
