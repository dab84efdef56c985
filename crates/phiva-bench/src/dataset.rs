//! Benchmark dataset loading.
//!
//! A dataset is a JSON array of `{image_path, input_text}` entries. Order
//! matters: entries are replayed one completed exchange at a time.

use phiva_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One (image, prompt) pair to replay.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BenchEntry {
    /// Image path, relative to the configured image root.
    pub image_path: String,
    /// Prompt text sent with the image.
    pub input_text: String,
}

/// An ordered benchmark dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchDataset {
    entries: Vec<BenchEntry>,
}

impl BenchDataset {
    /// Loads a dataset from a JSON array file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a JSON array
    /// of entries.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<BenchEntry> = serde_json::from_str(&raw)?;
        tracing::info!("loaded {} benchmark entries from {:?}", entries.len(), path);
        Ok(Self { entries })
    }

    /// Builds a dataset from in-memory entries.
    pub fn from_entries(entries: Vec<BenchEntry>) -> Self {
        Self { entries }
    }

    /// The entries, in replay order.
    pub fn entries(&self) -> &[BenchEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the dataset has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"image_path": "cat.jpg", "input_text": "describe this"}},
                {{"image_path": "dog.jpg", "input_text": "what breed is this"}}
            ]"#
        )
        .unwrap();

        let dataset = BenchDataset::load(file.path()).unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.entries()[0].image_path, "cat.jpg");
        assert_eq!(dataset.entries()[1].input_text, "what breed is this");
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = BenchDataset::load(file.path()).unwrap_err();
        assert!(matches!(
            err,
            phiva_core::PhivaError::Serialization { .. }
        ));
    }
}
