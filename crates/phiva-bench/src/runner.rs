//! Dataset replay over a chat session.
//!
//! The runner drives the same four session operations the interactive UI
//! uses: attach the decoded image, request a generation, wait for the
//! exchange to complete, then reset. Each entry produces one record with
//! the elapsed wall-clock time and the reply text of the most recent
//! completed exchange.

use crate::dataset::{BenchDataset, BenchEntry};
use crate::sink::ResultSink;
use image::Rgb;
use image::imageops::FilterType;
use phiva_core::{BenchConfig, ImageTensor, MessageRole, PhivaError, Result};
use phiva_session::ChatSession;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// The result of replaying one dataset entry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BenchRecord {
    /// Position of the entry in the dataset.
    pub index: usize,
    /// Image path as given in the dataset.
    pub image_path: String,
    /// Wall-clock time from generation request to completion.
    pub elapsed_ms: u64,
    /// Reply text of the completed exchange; empty when skipped.
    pub response: String,
    /// True when the entry was skipped (image failed to decode).
    #[serde(default)]
    pub skipped: bool,
    /// When the record was taken (RFC 3339).
    pub recorded_at: String,
}

impl BenchRecord {
    pub fn completed(
        index: usize,
        image_path: impl Into<String>,
        elapsed_ms: u64,
        response: impl Into<String>,
    ) -> Self {
        Self {
            index,
            image_path: image_path.into(),
            elapsed_ms,
            response: response.into(),
            skipped: false,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn skipped(index: usize, image_path: impl Into<String>) -> Self {
        Self {
            index,
            image_path: image_path.into(),
            elapsed_ms: 0,
            response: String::new(),
            skipped: true,
            recorded_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BenchSummary {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub total_elapsed_ms: u64,
}

/// Replays a benchmark dataset through a single chat session.
pub struct BenchRunner {
    session: ChatSession,
    config: BenchConfig,
}

impl BenchRunner {
    pub fn new(session: ChatSession, config: BenchConfig) -> Self {
        Self { session, config }
    }

    /// The session being driven.
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Replays every entry in order, appending one record per entry.
    ///
    /// Entries are strictly sequential: each produces exactly one completed
    /// exchange before the next one starts, and the session is reset
    /// between entries.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be written to the sink. Decode
    /// failures do not abort the run; they are recorded as skipped.
    pub async fn run(&self, dataset: &BenchDataset, sink: &mut ResultSink) -> Result<BenchSummary> {
        let mut summary = BenchSummary {
            total: dataset.len(),
            ..BenchSummary::default()
        };

        for (index, entry) in dataset.entries().iter().enumerate() {
            let record = self.run_entry(index, entry).await;
            if record.skipped {
                summary.skipped += 1;
            } else {
                summary.completed += 1;
                summary.total_elapsed_ms += record.elapsed_ms;
            }
            sink.append(&record)?;

            if index % 5 == 0 {
                tracing::info!("entry {}/{} done", index + 1, dataset.len());
            }
        }

        Ok(summary)
    }

    async fn run_entry(&self, index: usize, entry: &BenchEntry) -> BenchRecord {
        let image_path = self.config.image_root.join(&entry.image_path);
        let tensor = match load_image_tensor(&image_path, self.config.image_size) {
            Ok(tensor) => tensor,
            Err(e) => {
                // Decode failure surfaces as absence; the session is untouched.
                tracing::warn!("entry {}: image {:?} skipped: {}", index, image_path, e);
                return BenchRecord::skipped(index, entry.image_path.clone());
            }
        };

        self.session
            .attach_image(tensor, Some(entry.image_path.clone()))
            .await;

        let started = Instant::now();
        if !self.session.request_generate(&entry.input_text).await {
            tracing::warn!("entry {}: generation request rejected", index);
            return BenchRecord::skipped(index, entry.image_path.clone());
        }
        self.session.wait_idle().await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        // The reply of the most recent completed exchange, not a fixed
        // transcript index.
        let response = self
            .session
            .messages()
            .await
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Bot)
            .map(|m| m.text.clone())
            .unwrap_or_default();

        self.session.request_reset_chat().await;

        BenchRecord::completed(index, entry.image_path.clone(), elapsed_ms, response)
    }
}

/// Decodes an image file into the engine's normalized planar layout.
///
/// The source is letterboxed onto a gray square (so aspect ratio is kept)
/// and scaled to `side`x`side` before normalization.
pub fn load_image_tensor(path: &Path, side: u32) -> Result<ImageTensor> {
    let decoded = image::open(path)
        .map_err(|e| PhivaError::image(format!("{}: {}", path.display(), e)))?
        .to_rgb8();

    let (width, height) = decoded.dimensions();
    let max_side = width.max(height);
    let mut square = image::RgbImage::from_pixel(max_side, max_side, Rgb([127, 127, 127]));
    image::imageops::overlay(
        &mut square,
        &decoded,
        i64::from((max_side - width) / 2),
        i64::from((max_side - height) / 2),
    );

    let scaled = image::imageops::resize(&square, side, side, FilterType::Triangle);
    ImageTensor::from_rgb8(scaled.as_raw(), side, side)
}
