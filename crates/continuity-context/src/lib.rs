//! Engine facade over the continuity index and the session context renderer.

pub mod assemble;
pub mod engine;

pub use assemble::{default_query, render_context};
pub use engine::{BuildReport, ContinuityEngine, Startup};
