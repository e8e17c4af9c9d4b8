//! Core types describing bodies and their shared state.

pub mod body;
pub mod types;

pub use body::BodyState;
pub use types::{BodySnapshot, BodySpec, Vector2};
