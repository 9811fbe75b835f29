//! Training: turn `training/<identity>/<image>` into an encoding store.

use crate::analyzer::FaceAnalyzer;
use crate::config::Config;
use crate::error::PipelineError;
use crate::images::{file_label, list_images, sorted_entries};
use crate::recognize::detect_and_encode;
use crate::store::EncodingStore;
use crate::types::{DetectorModel, MultiFacePolicy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Why a training image contributed nothing to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoFace,
    /// Rejected by [`MultiFacePolicy::Skip`]; carries the face count.
    MultipleFaces(usize),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoFace => f.write_str("no face found"),
            SkipReason::MultipleFaces(n) => write!(f, "{n} faces found, expected one"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedImage {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Outcome of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeSummary {
    /// Total encodings written.
    pub encoded: usize,
    pub per_identity: BTreeMap<String, usize>,
    pub skipped: Vec<SkippedImage>,
    /// Where the store was written.
    pub artifact: PathBuf,
}

/// Walk `training_dir` and collect one encoding per accepted image.
///
/// Identities and images are visited in sorted order. Non-directories at
/// the top level and non-image files are ignored.
pub fn build_store<A: FaceAnalyzer>(
    training_dir: &Path,
    analyzer: &mut A,
    model: DetectorModel,
    multi_face: MultiFacePolicy,
) -> Result<(EncodingStore, Vec<SkippedImage>), PipelineError> {
    let mut store = EncodingStore::new();
    let mut skipped = Vec::new();

    for person_dir in sorted_entries(training_dir)? {
        if !person_dir.is_dir() {
            continue;
        }
        let name = file_label(&person_dir);
        tracing::info!(identity = %name, "processing identity");

        for image_path in list_images(&person_dir)? {
            tracing::info!(identity = %name, image = %file_label(&image_path), "encoding");

            let mut faces = detect_and_encode(analyzer, &image_path, model)?;
            let reason = match (faces.len(), multi_face) {
                (0, _) => Some(SkipReason::NoFace),
                (n, MultiFacePolicy::Skip) if n > 1 => Some(SkipReason::MultipleFaces(n)),
                _ => None,
            };

            if let Some(reason) = reason {
                tracing::warn!(image = %image_path.display(), %reason, "image skipped");
                skipped.push(SkippedImage {
                    path: image_path,
                    reason,
                });
                continue;
            }

            if faces.len() > 1 {
                tracing::debug!(
                    image = %image_path.display(),
                    faces = faces.len(),
                    "keeping first face"
                );
            }
            let (_, encoding) = faces.swap_remove(0);
            store.push(name.as_str(), encoding)?;
        }
    }

    Ok((store, skipped))
}

/// Train on `config.training_dir` and overwrite the store at
/// `config.encodings_path`.
pub fn encode_known_faces<A: FaceAnalyzer>(
    config: &Config,
    analyzer: &mut A,
    model: DetectorModel,
    multi_face: MultiFacePolicy,
) -> Result<EncodeSummary, PipelineError> {
    let (store, skipped) = build_store(&config.training_dir, analyzer, model, multi_face)?;
    store.save(&config.encodings_path)?;

    Ok(EncodeSummary {
        encoded: store.len(),
        per_identity: store.name_counts(),
        skipped,
        artifact: config.encodings_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AnalyzerError;
    use crate::test_support::StubAnalyzer;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn config(root: &Path) -> Config {
        let config = Config::for_root(root);
        config.ensure_layout().unwrap();
        config
    }

    #[test]
    fn test_face_less_image_contributes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        touch(dir.path(), "training/alice/img1.jpg");
        touch(dir.path(), "training/alice/img2.jpg");
        touch(dir.path(), "training/bob/img3.jpg");

        let mut analyzer = StubAnalyzer::new()
            .with_faces("img1.jpg", &[1.0])
            .with_faces("img3.jpg", &[3.0]);

        let summary = encode_known_faces(
            &config,
            &mut analyzer,
            DetectorModel::Hog,
            MultiFacePolicy::First,
        )
        .unwrap();

        assert_eq!(summary.encoded, 2);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].reason, SkipReason::NoFace);
        assert!(summary.skipped[0].path.ends_with("alice/img2.jpg"));

        let store = EncodingStore::load(&config.encodings_path).unwrap();
        assert_eq!(store.names(), ["alice", "bob"]);
        assert_eq!(store.encodings()[1].values, vec![3.0]);
    }

    #[test]
    fn test_empty_training_dir_writes_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let summary = encode_known_faces(
            &config,
            &mut StubAnalyzer::new(),
            DetectorModel::Hog,
            MultiFacePolicy::First,
        )
        .unwrap();

        assert_eq!(summary.encoded, 0);
        assert!(summary.per_identity.is_empty());
        assert!(EncodingStore::load(&config.encodings_path).unwrap().is_empty());
    }

    #[test]
    fn test_multiple_faces_first_policy_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "alice/group.png");

        let mut analyzer = StubAnalyzer::new().with_faces("group.png", &[7.0, 8.0]);
        let (store, skipped) = build_store(
            dir.path(),
            &mut analyzer,
            DetectorModel::Hog,
            MultiFacePolicy::First,
        )
        .unwrap();

        assert!(skipped.is_empty());
        assert_eq!(store.len(), 1);
        assert_eq!(store.encodings()[0].values, vec![7.0]);
    }

    #[test]
    fn test_multiple_faces_skip_policy_rejects() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "alice/group.png");
        touch(dir.path(), "alice/solo.png");

        let mut analyzer = StubAnalyzer::new()
            .with_faces("group.png", &[7.0, 8.0])
            .with_faces("solo.png", &[1.0]);
        let (store, skipped) = build_store(
            dir.path(),
            &mut analyzer,
            DetectorModel::Cnn,
            MultiFacePolicy::Skip,
        )
        .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::MultipleFaces(2));
        assert_eq!(analyzer.last_model(), Some(DetectorModel::Cnn));
    }

    #[test]
    fn test_ignores_loose_files_and_non_images() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "stray.jpg");
        touch(dir.path(), "bob/notes.txt");
        touch(dir.path(), "bob/face.JPEG");

        let mut analyzer = StubAnalyzer::new()
            .with_faces("stray.jpg", &[1.0])
            .with_faces("face.JPEG", &[2.0]);
        let (store, _) = build_store(
            dir.path(),
            &mut analyzer,
            DetectorModel::Hog,
            MultiFacePolicy::First,
        )
        .unwrap();

        assert_eq!(store.names(), ["bob"]);
        assert_eq!(analyzer.loads(), ["face.JPEG"]);
    }

    #[test]
    fn test_duplicate_names_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "carol/a.jpg");
        touch(dir.path(), "carol/b.jpg");

        let mut analyzer = StubAnalyzer::new()
            .with_faces("a.jpg", &[1.0])
            .with_faces("b.jpg", &[1.0]);
        let (store, _) = build_store(
            dir.path(),
            &mut analyzer,
            DetectorModel::Hog,
            MultiFacePolicy::First,
        )
        .unwrap();

        assert_eq!(store.name_counts().get("carol"), Some(&2));
    }

    #[test]
    fn test_unreadable_image_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        touch(dir.path(), "training/alice/broken.jpg");

        let mut analyzer = StubAnalyzer::new().unreadable("broken.jpg");
        let err = encode_known_faces(
            &config,
            &mut analyzer,
            DetectorModel::Hog,
            MultiFacePolicy::First,
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::Analyzer(AnalyzerError::ImageDecode { .. })));
        assert!(!config.encodings_path.exists());
    }
}
