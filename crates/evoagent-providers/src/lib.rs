//! Provider Adapter layer (spec §4.E).
//!
//! Hides per-vendor wire formats behind [`traits::LlmProvider`] and
//! [`stream::StreamEvent`]. [`turn::stream_turn`] is the single entry
//! point the Agent Turn Engine drives; it forwards thinking/text tokens
//! via callbacks and assembles tool calls from the event stream.

pub mod anthropic;
pub mod mock;
pub mod openai_compat;
pub mod registry;
mod sse;
pub mod traits;
pub mod turn;
mod util;

pub use traits::{ChatRequest, LlmProvider};
pub use turn::{stream_turn, StreamResult};
