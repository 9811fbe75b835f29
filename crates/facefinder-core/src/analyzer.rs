//! The face-analysis capability the pipeline delegates to.
//!
//! [`FaceAnalyzer`] covers image decoding, face localization, embedding and
//! the match predicate. [`OnnxFaceAnalyzer`] implements it with SCRFD and
//! ArcFace; tests substitute a scripted stub.

use crate::config::Config;
use crate::detector::{DetectorError, ScrfdDetector};
use crate::embedder::{ArcFaceEmbedder, EmbedderError};
use crate::types::{BoundingBox, DetectorModel, Embedding};
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("cannot decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Face detection and recognition backend.
pub trait FaceAnalyzer {
    /// Decoded image, opaque to the pipeline.
    type Image;

    fn load_image(&mut self, path: &Path) -> Result<Self::Image, AnalyzerError>;

    /// Locate every face in `image` with the chosen detector.
    fn locate_faces(
        &mut self,
        image: &Self::Image,
        model: DetectorModel,
    ) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// One embedding per face, in the same order as `faces`.
    fn encode_faces(
        &mut self,
        image: &Self::Image,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError>;

    /// Whether `probe` is the same person as `known`, under a threshold fixed
    /// by the implementation.
    fn is_match(&self, known: &Embedding, probe: &Embedding) -> bool;

    /// Dissimilarity between two embeddings; lower is closer.
    fn distance(&self, known: &Embedding, probe: &Embedding) -> f32;
}

/// SCRFD + ArcFace analyzer. Models are loaded on first use, once per variant.
pub struct OnnxFaceAnalyzer {
    light_model: PathBuf,
    heavy_model: PathBuf,
    embedder_model: PathBuf,
    similarity_threshold: f32,
    light: Option<ScrfdDetector>,
    heavy: Option<ScrfdDetector>,
    embedder: Option<ArcFaceEmbedder>,
}

impl OnnxFaceAnalyzer {
    pub fn new(config: &Config) -> Self {
        Self {
            light_model: config.detector_model_path(DetectorModel::Hog),
            heavy_model: config.detector_model_path(DetectorModel::Cnn),
            embedder_model: config.embedder_model_path(),
            similarity_threshold: config.similarity_threshold,
            light: None,
            heavy: None,
            embedder: None,
        }
    }

    fn detector(&mut self, model: DetectorModel) -> Result<&mut ScrfdDetector, DetectorError> {
        let (slot, path) = match model {
            DetectorModel::Hog => (&mut self.light, &self.light_model),
            DetectorModel::Cnn => (&mut self.heavy, &self.heavy_model),
        };
        let detector = match slot.take() {
            Some(d) => d,
            None => ScrfdDetector::load(path)?,
        };
        Ok(slot.insert(detector))
    }

    fn embedder(&mut self) -> Result<&mut ArcFaceEmbedder, EmbedderError> {
        let embedder = match self.embedder.take() {
            Some(e) => e,
            None => ArcFaceEmbedder::load(&self.embedder_model)?,
        };
        Ok(self.embedder.insert(embedder))
    }
}

impl FaceAnalyzer for OnnxFaceAnalyzer {
    type Image = RgbImage;

    fn load_image(&mut self, path: &Path) -> Result<RgbImage, AnalyzerError> {
        let image = image::open(path).map_err(|source| AnalyzerError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(image.to_rgb8())
    }

    fn locate_faces(
        &mut self,
        image: &RgbImage,
        model: DetectorModel,
    ) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector(model)?.detect(image)?)
    }

    fn encode_faces(
        &mut self,
        image: &RgbImage,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError> {
        if faces.is_empty() {
            return Ok(Vec::new());
        }
        let embedder = self.embedder()?;
        faces
            .iter()
            .map(|face| embedder.extract(image, face).map_err(AnalyzerError::from))
            .collect()
    }

    fn is_match(&self, known: &Embedding, probe: &Embedding) -> bool {
        known.similarity(probe) >= self.similarity_threshold
    }

    fn distance(&self, known: &Embedding, probe: &Embedding) -> f32 {
        1.0 - known.similarity(probe)
    }
}
