pub mod engine;
pub mod session;

// Re-export the session surface
pub use engine::{ChatEngine, EchoEngine};
pub use session::{ChatSession, SessionStatus};
