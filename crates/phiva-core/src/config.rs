//! Benchmark run configuration.
//!
//! Loaded from a TOML file; every field except the dataset path has a
//! sensible default so minimal configs stay minimal.

use crate::error::Result;
use crate::image::DEFAULT_IMAGE_SIDE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_image_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_output() -> PathBuf {
    PathBuf::from("bench-results.jsonl")
}

fn default_image_size() -> u32 {
    DEFAULT_IMAGE_SIDE
}

/// Configuration for a benchmark replay run.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Path to the JSON dataset of (image, prompt) entries.
    pub dataset: PathBuf,
    /// Directory that dataset image paths are resolved against.
    #[serde(default = "default_image_root")]
    pub image_root: PathBuf,
    /// Output file for per-entry results (JSON lines).
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Side length images are letterboxed and scaled to before prefill.
    #[serde(default = "default_image_size")]
    pub image_size: u32,
    /// Artificial per-token delay for the built-in engine, in milliseconds.
    #[serde(default)]
    pub token_delay_ms: u64,
}

impl BenchConfig {
    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = toml::from_str(&raw)?;
        tracing::debug!("loaded bench config from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: BenchConfig = toml::from_str(r#"dataset = "bench.json""#).unwrap();
        assert_eq!(config.dataset, PathBuf::from("bench.json"));
        assert_eq!(config.image_root, PathBuf::from("."));
        assert_eq!(config.output, PathBuf::from("bench-results.jsonl"));
        assert_eq!(config.image_size, DEFAULT_IMAGE_SIDE);
        assert_eq!(config.token_delay_ms, 0);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
dataset = "data/bench.json"
image_root = "/sdcard/DCIM/images"
image_size = 224
token_delay_ms = 5
"#
        )
        .unwrap();

        let config = BenchConfig::load(file.path()).unwrap();
        assert_eq!(config.image_root, PathBuf::from("/sdcard/DCIM/images"));
        assert_eq!(config.image_size, 224);
        assert_eq!(config.token_delay_ms, 5);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = BenchConfig::load(Path::new("/nonexistent/bench.toml")).unwrap_err();
        assert!(matches!(err, crate::error::PhivaError::Io { .. }));
    }
}
