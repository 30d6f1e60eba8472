//! State module for tracking orchestration progress
//!
//! # Components
//!
//! - `RenderStage`: The stages one render request moves through
//! - `StageTracker`: Validates and logs transitions for a single request

mod render_stage;

// Re-export main types
pub use render_stage::{RenderStage, StageTracker};
