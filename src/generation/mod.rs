//! Agent turn execution: the provider/tool loop, whole or streamed.

pub mod stream;
pub mod text;
mod tooling;

pub use stream::{collect_stream, stream_text_with_tools, TurnEvent};
pub use text::generate_text;

/// Maximum provider round-trips per turn, guarding against tool loops.
pub const MAX_TOOL_ITERATIONS: usize = 20;
