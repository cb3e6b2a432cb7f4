//! Agent Turn Engine (spec §4.F) — drives one user turn to completion:
//! prompt -> provider stream -> tool dispatch -> feed results -> repeat
//! until the provider emits terminal text or the iteration cap trips.

pub mod emitter;
pub mod engine;

pub use emitter::{EngineEvent, EventSink, SinkError, VecSink};
pub use engine::{TurnEngine, TurnInput, TurnOutcome};
