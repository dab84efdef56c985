pub mod dataset;
pub mod runner;
pub mod sink;

pub use dataset::{BenchDataset, BenchEntry};
pub use runner::{BenchRecord, BenchRunner, BenchSummary, load_image_tensor};
pub use sink::ResultSink;
