pub mod config;
pub mod error;
pub mod image;
pub mod message;

// Re-export common types
pub use config::BenchConfig;
pub use error::{PhivaError, Result};
pub use image::{DEFAULT_IMAGE_SIDE, ImageTensor};
pub use message::{Message, MessageRole};
