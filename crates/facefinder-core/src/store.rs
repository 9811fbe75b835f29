//! Encoding store: the persisted `(name, embedding)` database built by training.
//!
//! Names and embeddings are kept as two index-aligned sequences. The store is
//! written as a single bincode file, replaced wholesale on every save.

use crate::types::Embedding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("encoding store not found at {0} — run with --train first")]
    NotFound(PathBuf),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding store is corrupt: {0}")]
    Encode(#[from] bincode::Error),
    #[error("encoding store is misaligned: {names} names vs {encodings} encodings")]
    Misaligned { names: usize, encodings: usize },
    #[error("encoding store entry {index} has an empty name")]
    EmptyName { index: usize },
}

/// One stored entry, borrowed from an [`EncodingStore`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabeledEncoding<'a> {
    pub name: &'a str,
    pub encoding: &'a Embedding,
}

/// Known-face database: `names[i]` labels `encodings[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncodingStore {
    names: Vec<String>,
    encodings: Vec<Embedding>,
}

impl EncodingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry. Names need not be unique.
    pub fn push(&mut self, name: impl Into<String>, encoding: Embedding) -> Result<(), StoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(StoreError::EmptyName {
                index: self.names.len(),
            });
        }
        self.names.push(name);
        self.encodings.push(encoding);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn encodings(&self) -> &[Embedding] {
        &self.encodings
    }

    pub fn iter(&self) -> impl Iterator<Item = LabeledEncoding<'_>> {
        self.names
            .iter()
            .zip(self.encodings.iter())
            .map(|(name, encoding)| LabeledEncoding { name, encoding })
    }

    /// Number of encodings stored under each name.
    pub fn name_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for name in &self.names {
            *counts.entry(name.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Write the store to `path`, replacing any previous file.
    ///
    /// The bytes go to a sibling `.tmp` file first and are renamed into
    /// place, so readers never observe a partial store. The `.tmp` file is
    /// removed if any step fails.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let tmp = tmp_path(path);
        let result = self.write_file(&tmp).and_then(|()| {
            std::fs::rename(&tmp, path).map_err(|source| StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        });

        if let Err(err) = result {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                tracing::debug!(path = %tmp.display(), error = %cleanup, "tmp file not removed");
            }
            return Err(err);
        }

        tracing::info!(path = %path.display(), entries = self.len(), "encoding store saved");
        Ok(())
    }

    fn write_file(&self, tmp: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: tmp.to_path_buf(),
            source,
        };

        let file = File::create(tmp).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush().map_err(io_err)?;
        writer.get_ref().sync_all().map_err(io_err)
    }

    /// Read a store previously written by [`EncodingStore::save`].
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let store: EncodingStore = bincode::deserialize_from(BufReader::new(file))?;
        store.check()?;

        tracing::info!(path = %path.display(), entries = store.len(), "encoding store loaded");
        Ok(store)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.names.len() != self.encodings.len() {
            return Err(StoreError::Misaligned {
                names: self.names.len(),
                encodings: self.encodings.len(),
            });
        }
        if let Some(index) = self.names.iter().position(String::is_empty) {
            return Err(StoreError::EmptyName { index });
        }
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
