//! Rendering of comparison, history and version results.
//!
//! Console renderers write human-readable summaries into any [`core::fmt::Write`],
//! coloring additions green and removals red when asked to. The JSON writer saves
//! the structured results as they serialize.

mod console;
mod json;

pub use console::{render_cache_info, render_catalog, render_checkpoint, render_comparison, render_history, render_renames};
pub use json::write_file as write_json_file;
