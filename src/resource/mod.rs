//! Exposes views into resources owned by the engine.

pub mod buffer;
