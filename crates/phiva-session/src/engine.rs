//! The inference engine seam.
//!
//! `ChatSession` drives the model runtime through the [`ChatEngine`] trait.
//! The surface mirrors the native chat bridge: conversation reset, image and
//! text prefill, step-wise decode, and polling for the full reply so far.
//! A deterministic [`EchoEngine`] is provided so the replay harness and
//! tests can run without a device runtime.

use async_trait::async_trait;
use phiva_core::{ImageTensor, Result};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Operations a model runtime must expose to the session coordinator.
///
/// The generation loop is: optional `prefill_image`, `prefill` with the
/// prompt, then repeated `decode` / `message` until `stopped` reports true.
/// `message` returns the entire reply decoded so far, not a delta; the
/// session overwrites the streaming Bot message with it on every step.
#[async_trait]
pub trait ChatEngine: Send + Sync {
    /// Clears the engine-side conversation state.
    async fn reset_chat(&self) -> Result<()>;

    /// Feeds the pending image ahead of the prompt text.
    async fn prefill_image(&self, image: &ImageTensor) -> Result<()>;

    /// Feeds the prompt text, preparing the reply stream.
    async fn prefill(&self, text: &str) -> Result<()>;

    /// Decodes the next token of the reply.
    async fn decode(&self) -> Result<()>;

    /// Returns the full reply text decoded so far.
    async fn message(&self) -> Result<String>;

    /// Returns true once the current reply is finished.
    async fn stopped(&self) -> Result<bool>;

    /// Human-readable runtime statistics line (prefill/decode speed).
    async fn runtime_stats_text(&self) -> Result<String>;

    /// Releases engine resources.
    async fn unload(&self) -> Result<()>;
}

#[derive(Default)]
struct EchoState {
    tokens: Vec<String>,
    emitted: usize,
    reply: String,
    saw_image: bool,
    prefill_tokens: usize,
    decode_started: Option<Instant>,
    decode_finished: Option<Instant>,
}

/// A deterministic in-process engine.
///
/// Replies word by word with a canned transcript derived from the prompt,
/// with an optional fixed delay per token so timings are non-trivial.
pub struct EchoEngine {
    state: Mutex<EchoState>,
    token_delay: Duration,
}

impl EchoEngine {
    /// Creates an engine with no per-token delay.
    pub fn new() -> Self {
        Self::with_token_delay(Duration::ZERO)
    }

    /// Creates an engine that sleeps for `delay` on every decode step.
    pub fn with_token_delay(delay: Duration) -> Self {
        Self {
            state: Mutex::new(EchoState::default()),
            token_delay: delay,
        }
    }
}

impl Default for EchoEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatEngine for EchoEngine {
    async fn reset_chat(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state = EchoState::default();
        Ok(())
    }

    async fn prefill_image(&self, image: &ImageTensor) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.saw_image = true;
        state.prefill_tokens += (image.width() as usize / 14) * (image.height() as usize / 14);
        Ok(())
    }

    async fn prefill(&self, text: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let mut full = String::new();
        if state.saw_image {
            full.push_str("The attached image shows a scene. ");
        }
        full.push_str("You asked: ");
        full.push_str(text);

        state.tokens = full.split_inclusive(' ').map(str::to_string).collect();
        state.emitted = 0;
        state.reply.clear();
        state.prefill_tokens += text.split_whitespace().count().max(1);
        state.decode_started = Some(Instant::now());
        state.decode_finished = None;
        Ok(())
    }

    async fn decode(&self) -> Result<()> {
        if !self.token_delay.is_zero() {
            tokio::time::sleep(self.token_delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.emitted < state.tokens.len() {
            let next = state.tokens[state.emitted].clone();
            state.reply.push_str(&next);
            state.emitted += 1;
        }
        if state.emitted == state.tokens.len() {
            state.decode_finished = Some(Instant::now());
        }
        Ok(())
    }

    async fn message(&self) -> Result<String> {
        Ok(self.state.lock().unwrap().reply.clone())
    }

    async fn stopped(&self) -> Result<bool> {
        let state = self.state.lock().unwrap();
        Ok(state.emitted >= state.tokens.len())
    }

    async fn runtime_stats_text(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        let decode_secs = match (state.decode_started, state.decode_finished) {
            (Some(start), Some(end)) => (end - start).as_secs_f64(),
            _ => 0.0,
        };
        let decode_speed = if decode_secs > 0.0 {
            state.emitted as f64 / decode_secs
        } else {
            0.0
        };
        Ok(format!(
            "prefill: {} tok, decode: {:.1} tok/s",
            state.prefill_tokens, decode_speed
        ))
    }

    async fn unload(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state = EchoState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(engine: &EchoEngine) -> String {
        while !engine.stopped().await.unwrap() {
            engine.decode().await.unwrap();
        }
        engine.message().await.unwrap()
    }

    #[tokio::test]
    async fn test_echo_reply_grows_monotonically() {
        let engine = EchoEngine::new();
        engine.prefill("tell me a story").await.unwrap();

        let mut previous = String::new();
        while !engine.stopped().await.unwrap() {
            engine.decode().await.unwrap();
            let current = engine.message().await.unwrap();
            assert!(current.starts_with(&previous));
            previous = current;
        }
        assert_eq!(previous, "You asked: tell me a story");
    }

    #[tokio::test]
    async fn test_echo_mentions_image() {
        let engine = EchoEngine::new();
        let image = ImageTensor::from_rgb8(&[0, 0, 0], 1, 1).unwrap();
        engine.prefill_image(&image).await.unwrap();
        engine.prefill("what is this").await.unwrap();

        let reply = drain(&engine).await;
        assert!(reply.starts_with("The attached image shows"));
    }

    #[tokio::test]
    async fn test_reset_clears_reply() {
        let engine = EchoEngine::new();
        engine.prefill("hello").await.unwrap();
        drain(&engine).await;

        engine.reset_chat().await.unwrap();
        assert!(engine.message().await.unwrap().is_empty());
        assert!(engine.stopped().await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_text_mentions_prefill() {
        let engine = EchoEngine::new();
        engine.prefill("hello there").await.unwrap();
        drain(&engine).await;

        let stats = engine.runtime_stats_text().await.unwrap();
        assert!(stats.contains("prefill:"));
        assert!(stats.contains("decode:"));
    }
}
