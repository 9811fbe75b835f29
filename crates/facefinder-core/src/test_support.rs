//! Scripted [`FaceAnalyzer`] for pipeline tests.
//!
//! Images are identified by file name. Each scripted face carries a 1-D
//! embedding; faces match when their values are within 0.5.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::types::{BoundingBox, DetectorModel, Embedding};
use image::error::{DecodingError, ImageFormatHint};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const MATCH_TOLERANCE: f32 = 0.5;

/// Bounding box of the `i`-th scripted face in an image.
pub fn face(i: usize) -> BoundingBox {
    BoundingBox {
        x: i as f32,
        y: 0.0,
        width: 10.0,
        height: 10.0,
        confidence: 0.9,
        landmarks: None,
    }
}

#[derive(Default)]
pub struct StubAnalyzer {
    faces: HashMap<String, Vec<f32>>,
    unreadable: HashSet<String>,
    drop_one_encoding: bool,
    loads: Vec<String>,
    encode_calls: usize,
    last_model: Option<DetectorModel>,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the faces found in `file_name`, one embedding value per face.
    pub fn with_faces(mut self, file_name: &str, values: &[f32]) -> Self {
        self.faces.insert(file_name.to_string(), values.to_vec());
        self
    }

    /// Make `load_image` fail for `file_name`.
    pub fn unreadable(mut self, file_name: &str) -> Self {
        self.unreadable.insert(file_name.to_string());
        self
    }

    /// Return one encoding fewer than requested.
    pub fn dropping_encodings(mut self) -> Self {
        self.drop_one_encoding = true;
        self
    }

    /// File names passed to `load_image`, in call order.
    pub fn loads(&self) -> &[String] {
        &self.loads
    }

    pub fn encode_calls(&self) -> usize {
        self.encode_calls
    }

    pub fn last_model(&self) -> Option<DetectorModel> {
        self.last_model
    }
}

impl FaceAnalyzer for StubAnalyzer {
    type Image = String;

    fn load_image(&mut self, path: &Path) -> Result<String, AnalyzerError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.loads.push(name.clone());

        if self.unreadable.contains(&name) {
            return Err(AnalyzerError::ImageDecode {
                path: path.to_path_buf(),
                source: image::ImageError::Decoding(DecodingError::new(
                    ImageFormatHint::Unknown,
                    "scripted decode failure",
                )),
            });
        }
        Ok(name)
    }

    fn locate_faces(
        &mut self,
        image: &String,
        model: DetectorModel,
    ) -> Result<Vec<BoundingBox>, AnalyzerError> {
        self.last_model = Some(model);
        let count = self.faces.get(image).map_or(0, Vec::len);
        Ok((0..count).map(face).collect())
    }

    fn encode_faces(
        &mut self,
        image: &String,
        faces: &[BoundingBox],
    ) -> Result<Vec<Embedding>, AnalyzerError> {
        self.encode_calls += 1;
        let values = self.faces.get(image).cloned().unwrap_or_default();
        let mut encodings: Vec<Embedding> = faces
            .iter()
            .filter_map(|b| values.get(b.x as usize))
            .map(|&v| Embedding::new(vec![v]))
            .collect();
        if self.drop_one_encoding {
            encodings.pop();
        }
        Ok(encodings)
    }

    fn is_match(&self, known: &Embedding, probe: &Embedding) -> bool {
        self.distance(known, probe) <= MATCH_TOLERANCE
    }

    fn distance(&self, known: &Embedding, probe: &Embedding) -> f32 {
        known.euclidean_distance(probe)
    }
}
