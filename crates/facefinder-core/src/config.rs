use crate::types::DetectorModel;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// Optional per-project config file, looked up in the project root.
pub const CONFIG_FILE_NAME: &str = "facefinder.toml";

const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.40;

const SCRFD_LIGHT_MODEL: &str = "det_500m.onnx";
const SCRFD_HEAVY_MODEL: &str = "det_10g.onnx";
const ARCFACE_MODEL: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Project layout and analyzer settings, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Project root; relative paths resolve against it.
    pub root: PathBuf,
    /// One subdirectory per identity, images inside.
    pub training_dir: PathBuf,
    /// Flat directory of images to run recognition on.
    pub validation_dir: PathBuf,
    /// Persisted encoding store.
    pub encodings_path: PathBuf,
    /// Directory containing the SCRFD and ArcFace ONNX files.
    pub model_dir: PathBuf,
    /// Cosine similarity at or above which two faces match.
    pub similarity_threshold: f32,
}

/// Shape of `facefinder.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    training_dir: Option<PathBuf>,
    validation_dir: Option<PathBuf>,
    encodings_path: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    similarity_threshold: Option<f32>,
}

impl Config {
    /// Built-in layout under `root`: `training/`, `validation/`, `output/encodings.bin`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            training_dir: root.join("training"),
            validation_dir: root.join("validation"),
            encodings_path: root.join("output").join("encodings.bin"),
            model_dir: default_model_dir(&|key: &str| std::env::var(key).ok()),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            root,
        }
    }

    /// Load configuration: defaults, then `<root>/facefinder.toml`, then
    /// `FACEFINDER_*` environment variables.
    ///
    /// `root` falls back to `FACEFINDER_ROOT`, then the current directory.
    pub fn load(root: Option<PathBuf>) -> Result<Self, ConfigError> {
        Self::load_with(root, &|key: &str| std::env::var(key).ok())
    }

    fn load_with(
        root: Option<PathBuf>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let root = root
            .or_else(|| env("FACEFINDER_ROOT").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));

        let mut config = Self::for_root(root);
        config.model_dir = default_model_dir(env);

        let file_path = config.root.join(CONFIG_FILE_NAME);
        if file_path.is_file() {
            let text = std::fs::read_to_string(&file_path).map_err(|source| ConfigError::Io {
                path: file_path.clone(),
                source,
            })?;
            let file: ConfigFile = toml::from_str(&text).map_err(|source| ConfigError::Parse {
                path: file_path.clone(),
                source,
            })?;
            config.apply_file(file);
            tracing::debug!(path = %file_path.display(), "applied config file");
        }

        config.apply_env(env);
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(p) = file.training_dir {
            self.training_dir = self.resolve(p);
        }
        if let Some(p) = file.validation_dir {
            self.validation_dir = self.resolve(p);
        }
        if let Some(p) = file.encodings_path {
            self.encodings_path = self.resolve(p);
        }
        if let Some(p) = file.model_dir {
            self.model_dir = self.resolve(p);
        }
        if let Some(t) = file.similarity_threshold {
            self.similarity_threshold = t;
        }
    }

    fn apply_env(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(p) = env("FACEFINDER_MODEL_DIR") {
            self.model_dir = self.resolve(PathBuf::from(p));
        }
        if let Some(p) = env("FACEFINDER_ENCODINGS_PATH") {
            self.encodings_path = self.resolve(PathBuf::from(p));
        }
        self.similarity_threshold = env_f32(
            env,
            "FACEFINDER_SIMILARITY_THRESHOLD",
            self.similarity_threshold,
        );
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        }
    }

    /// Create the training, validation and output directories if absent.
    pub fn ensure_layout(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.training_dir)?;
        std::fs::create_dir_all(&self.validation_dir)?;
        if let Some(parent) = self.encodings_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Path to the SCRFD model backing `model`.
    pub fn detector_model_path(&self, model: DetectorModel) -> PathBuf {
        let file = match model {
            DetectorModel::Hog => SCRFD_LIGHT_MODEL,
            DetectorModel::Cnn => SCRFD_HEAVY_MODEL,
        };
        self.model_dir.join(file)
    }

    /// Path to the ArcFace recognition model.
    pub fn embedder_model_path(&self) -> PathBuf {
        self.model_dir.join(ARCFACE_MODEL)
    }
}

/// `$XDG_DATA_HOME/facefinder/models`, or `~/.local/share/facefinder/models`.
fn default_model_dir(env: &dyn Fn(&str) -> Option<String>) -> PathBuf {
    env("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let home = env("HOME").unwrap_or_else(|| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facefinder")
        .join("models")
}

fn env_f32(env: &dyn Fn(&str) -> Option<String>, key: &str, default: f32) -> f32 {
    env(key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_layout() {
        let env = env_from(&[("HOME", "/home/op")]);
        let config = Config::load_with(Some(PathBuf::from("/srv/faces")), &env).unwrap();

        assert_eq!(config.training_dir, PathBuf::from("/srv/faces/training"));
        assert_eq!(config.validation_dir, PathBuf::from("/srv/faces/validation"));
        assert_eq!(config.encodings_path, PathBuf::from("/srv/faces/output/encodings.bin"));
        assert_eq!(config.model_dir, PathBuf::from("/home/op/.local/share/facefinder/models"));
        assert!((config.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < 1e-6);
    }

    #[test]
    fn test_root_from_env() {
        let env = env_from(&[("FACEFINDER_ROOT", "/data"), ("XDG_DATA_HOME", "/xdg")]);
        let config = Config::load_with(None, &env).unwrap();
        assert_eq!(config.root, PathBuf::from("/data"));
        assert_eq!(config.model_dir, PathBuf::from("/xdg/facefinder/models"));
    }

    #[test]
    fn test_file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "training_dir = \"people\"\nmodel_dir = \"/opt/models\"\nsimilarity_threshold = 0.55\n",
        )
        .unwrap();

        let env = env_from(&[("FACEFINDER_MODEL_DIR", "/env/models")]);
        let config = Config::load_with(Some(dir.path().to_path_buf()), &env).unwrap();

        assert_eq!(config.training_dir, dir.path().join("people"));
        assert_eq!(config.model_dir, PathBuf::from("/env/models"));
        assert!((config.similarity_threshold - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_relative_env_paths_resolve_under_root() {
        let env = env_from(&[
            ("FACEFINDER_ENCODINGS_PATH", "out.bin"),
            ("FACEFINDER_MODEL_DIR", "models"),
        ]);
        let config = Config::load_with(Some(PathBuf::from("/srv/faces")), &env).unwrap();

        assert_eq!(config.encodings_path, PathBuf::from("/srv/faces/out.bin"));
        assert_eq!(config.model_dir, PathBuf::from("/srv/faces/models"));
    }

    #[test]
    fn test_bad_threshold_env_keeps_default() {
        let env = env_from(&[("FACEFINDER_SIMILARITY_THRESHOLD", "high")]);
        let config = Config::load_with(Some(PathBuf::from("/r")), &env).unwrap();
        assert!((config.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_key_in_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "threshold = 1\n").unwrap();

        let err = Config::load_with(Some(dir.path().to_path_buf()), &env_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_ensure_layout_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_root(dir.path());
        config.ensure_layout().unwrap();

        assert!(config.training_dir.is_dir());
        assert!(config.validation_dir.is_dir());
        assert!(dir.path().join("output").is_dir());
    }

    #[test]
    fn test_model_paths_per_variant() {
        let mut config = Config::for_root("/r");
        config.model_dir = PathBuf::from("/m");
        assert_eq!(
            config.detector_model_path(DetectorModel::Hog),
            PathBuf::from("/m/det_500m.onnx")
        );
        assert_eq!(
            config.detector_model_path(DetectorModel::Cnn),
            PathBuf::from("/m/det_10g.onnx")
        );
        assert_eq!(config.embedder_model_path(), PathBuf::from("/m/w600k_r50.onnx"));
    }
}
