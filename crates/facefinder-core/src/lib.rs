//! facefinder-core — Known-face encoding store and recognition pipeline.
//!
//! Training walks `training/<identity>/` images and persists one embedding
//! per face photo; recognition matches faces in new images against that
//! store. Detection and embedding run through the [`FaceAnalyzer`] trait,
//! implemented here with SCRFD and ArcFace on ONNX Runtime.

pub mod alignment;
pub mod analyzer;
pub mod config;
pub mod detector;
pub mod embedder;
pub mod encode;
pub mod error;
pub mod images;
pub mod recognize;
pub mod store;
pub mod types;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxFaceAnalyzer};
pub use config::{Config, ConfigError};
pub use encode::{build_store, encode_known_faces, EncodeSummary, SkipReason, SkippedImage};
pub use error::PipelineError;
pub use recognize::{recognize_faces, select_label, Recognition, UNKNOWN_LABEL};
pub use store::{EncodingStore, LabeledEncoding, StoreError};
pub use types::{BoundingBox, DetectorModel, Embedding, MatchPolicy, MultiFacePolicy};
pub use validate::{validate, ImageReport, ValidationReport};
