pub mod compositor;
pub mod error;
pub mod frame_store;
pub mod grid;
pub mod literal;
pub mod params;
pub mod playback;

// Re-export key types for easier use by dependent crates
pub use compositor::{compose, CompositionMode, DerivedField, EmptyCellPolicy, FieldCompositor, FieldStats};
pub use error::{FrameError, LiteralError, ParameterError};
pub use frame_store::{decode_grid, FrameStore, Species};
pub use grid::{FieldF64, Grid};
pub use literal::{parse_literal, Literal};
pub use params::{GridShape, ParameterSet};
pub use playback::{Advance, EndBehavior, FrameIndex, FrameSequence, PlaybackController, PlaybackState, PlaybackSummary, RenderSink};
