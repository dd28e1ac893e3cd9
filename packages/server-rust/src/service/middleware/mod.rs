//! Tower middleware layers for the API pipeline.
//!
//! - [`annotate`]: Attaches OpenAPI schema descriptors to matched requests
//! - [`pipeline`]: Composes annotation and dispatch into a single service stack

pub mod annotate;
pub mod pipeline;

pub use annotate::AnnotateLayer;
pub use pipeline::{build_api_pipeline, ApiComponents, ApiPipeline};
