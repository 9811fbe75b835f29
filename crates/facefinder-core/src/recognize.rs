//! Identify the faces in a single image against a loaded encoding store.

use crate::analyzer::FaceAnalyzer;
use crate::error::PipelineError;
use crate::store::EncodingStore;
use crate::types::{BoundingBox, DetectorModel, Embedding, MatchPolicy};
use serde::Serialize;
use std::path::Path;

/// Label given to a face that matches no stored encoding.
pub const UNKNOWN_LABEL: &str = "unknown";

/// One identified face.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognition {
    pub bounding_box: BoundingBox,
    /// Stored identity, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Analyzer distance to the selected stored encoding; `None` when unknown.
    pub distance: Option<f32>,
}

impl Recognition {
    pub fn is_unknown(&self) -> bool {
        self.distance.is_none()
    }
}

/// Label chosen by `policy` from a per-candidate match list, with its index.
pub fn select_label<'a>(
    matches: &[bool],
    distances: &[f32],
    names: &'a [String],
    policy: MatchPolicy,
) -> Option<(usize, &'a str)> {
    let index = policy.select(matches, distances)?;
    names.get(index).map(|name| (index, name.as_str()))
}

/// Locate and encode every face in `path`, paired position by position.
pub(crate) fn detect_and_encode<A: FaceAnalyzer>(
    analyzer: &mut A,
    path: &Path,
    model: DetectorModel,
) -> Result<Vec<(BoundingBox, Embedding)>, PipelineError> {
    let image = analyzer.load_image(path)?;
    let locations = analyzer.locate_faces(&image, model)?;
    if locations.is_empty() {
        return Ok(Vec::new());
    }

    let encodings = analyzer.encode_faces(&image, &locations)?;
    if encodings.len() != locations.len() {
        return Err(PipelineError::Misaligned {
            path: path.to_path_buf(),
            locations: locations.len(),
            encodings: encodings.len(),
        });
    }
    Ok(locations.into_iter().zip(encodings).collect())
}

/// Match one probe embedding against every stored encoding.
fn identify<A: FaceAnalyzer>(
    analyzer: &A,
    store: &EncodingStore,
    probe: &Embedding,
    policy: MatchPolicy,
) -> (String, Option<f32>) {
    let known = store.encodings();
    let matches: Vec<bool> = known.iter().map(|k| analyzer.is_match(k, probe)).collect();
    let distances: Vec<f32> = known.iter().map(|k| analyzer.distance(k, probe)).collect();

    match select_label(&matches, &distances, store.names(), policy) {
        Some((index, name)) => (name.to_string(), Some(distances[index])),
        None => (UNKNOWN_LABEL.to_string(), None),
    }
}

/// Identify every face in the image at `path`.
///
/// Returns one [`Recognition`] per detected face in detector order; an image
/// without faces yields an empty list.
pub fn recognize_faces<A: FaceAnalyzer>(
    path: &Path,
    analyzer: &mut A,
    model: DetectorModel,
    store: &EncodingStore,
    policy: MatchPolicy,
) -> Result<Vec<Recognition>, PipelineError> {
    let faces = detect_and_encode(analyzer, path, model)?;
    tracing::info!(image = %path.display(), faces = faces.len(), %model, "faces detected");

    let results: Vec<Recognition> = faces
        .into_iter()
        .map(|(bounding_box, probe)| {
            let (label, distance) = identify(&*analyzer, store, &probe, policy);
            tracing::debug!(label = %label, ?distance, ?policy, "face identified");
            Recognition {
                bounding_box,
                label,
                distance,
            }
        })
        .collect();

    Ok(results)
}
