use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// A zero vector on either side yields 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Which face detector the analyzer should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorModel {
    /// Fast, lightweight detector.
    #[default]
    Hog,
    /// Slower, more accurate detector.
    Cnn,
}

impl DetectorModel {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectorModel::Hog => "hog",
            DetectorModel::Cnn => "cnn",
        }
    }
}

impl std::fmt::Display for DetectorModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a probe picks its label among the stored encodings the analyzer
/// reports as matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Earliest stored entry that matches, regardless of distance.
    #[default]
    FirstMatch,
    /// Matching entry with the smallest distance; ties go to the earliest entry.
    Nearest,
}

impl MatchPolicy {
    /// Index of the selected candidate, or `None` when nothing matches.
    ///
    /// `distances` is only consulted by [`MatchPolicy::Nearest`] and must be
    /// index-aligned with `matches` when used.
    pub fn select(self, matches: &[bool], distances: &[f32]) -> Option<usize> {
        match self {
            MatchPolicy::FirstMatch => matches.iter().position(|&m| m),
            MatchPolicy::Nearest => matches
                .iter()
                .enumerate()
                .filter(|&(_, &m)| m)
                .map(|(i, _)| (i, distances.get(i).copied().unwrap_or(f32::INFINITY)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(i, _)| i),
        }
    }
}

/// What to do with a training photo that contains more than one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiFacePolicy {
    /// Keep the first detected face.
    #[default]
    First,
    /// Skip the photo entirely.
    Skip,
}
