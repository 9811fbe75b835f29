//! Batch recognition over the validation directory.

use crate::analyzer::FaceAnalyzer;
use crate::config::Config;
use crate::error::PipelineError;
use crate::images::{list_images, sorted_entries};
use crate::recognize::{recognize_faces, Recognition};
use crate::store::EncodingStore;
use crate::types::{DetectorModel, MatchPolicy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Faces recognized in one validation image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReport {
    pub path: PathBuf,
    pub faces: Vec<Recognition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// The validation directory had no entries at all.
    pub empty: bool,
    pub images: Vec<ImageReport>,
}

impl ValidationReport {
    pub fn total_faces(&self) -> usize {
        self.images.iter().map(|i| i.faces.len()).sum()
    }

    pub fn unknown_faces(&self) -> usize {
        self.faces().filter(|f| f.is_unknown()).count()
    }

    /// How many faces received each label, `unknown` included.
    pub fn label_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for face in self.faces() {
            *counts.entry(face.label.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn faces(&self) -> impl Iterator<Item = &Recognition> {
        self.images.iter().flat_map(|i| i.faces.iter())
    }
}

/// Run recognition on every image in `config.validation_dir`.
///
/// An empty directory is reported, not an error. The store is only loaded
/// when there is at least one image to check.
pub fn validate<A: FaceAnalyzer>(
    config: &Config,
    analyzer: &mut A,
    model: DetectorModel,
    policy: MatchPolicy,
) -> Result<ValidationReport, PipelineError> {
    let dir = &config.validation_dir;
    if sorted_entries(dir)?.is_empty() {
        tracing::warn!(dir = %dir.display(), "validation directory is empty");
        return Ok(ValidationReport {
            empty: true,
            images: Vec::new(),
        });
    }

    let images = list_images(dir)?;
    if images.is_empty() {
        return Ok(ValidationReport::default());
    }

    let store = EncodingStore::load(&config.encodings_path)?;
    let mut reports = Vec::with_capacity(images.len());
    for path in images {
        let faces = recognize_faces(&path, analyzer, model, &store, policy)?;
        reports.push(ImageReport { path, faces });
    }

    Ok(ValidationReport {
        empty: false,
        images: reports,
    })
}
