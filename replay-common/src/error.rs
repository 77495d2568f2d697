//! Error types for parameter loading and frame decoding.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to parse a structured literal such as `[100, 100]`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LiteralError {
    #[error("empty literal")]
    Empty,
    #[error("unexpected character '{found}' at offset {offset}")]
    Unexpected { found: char, offset: usize },
    #[error("unterminated sequence opened at offset {offset}")]
    Unterminated { offset: usize },
    #[error("mismatched closing bracket '{found}' at offset {offset}")]
    Mismatched { found: char, offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    #[error("trailing input at offset {offset}")]
    Trailing { offset: usize },
}

/// Startup errors raised while reading the `parameters` file.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("failed to read parameter file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("missing parameter '{key}'")]
    Missing { key: &'static str },
    #[error("invalid value '{value}' for parameter '{key}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("malformed literal for parameter '{key}': {source}")]
    Literal {
        key: &'static str,
        #[source]
        source: LiteralError,
    },
}

/// Per-frame errors. Playback skips the frame and carries on.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to read frame file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt frame '{}': {len} bytes is not a multiple of {width}", path.display())]
    Corrupt {
        path: PathBuf,
        len: usize,
        width: usize,
    },
    #[error("frame '{}' holds {found} cells, expected {rows}x{cols} = {expected}", path.display())]
    ShapeMismatch {
        path: PathBuf,
        rows: usize,
        cols: usize,
        expected: usize,
        found: usize,
    },
    #[error("frame {frame}: cell ({row}, {col}) has zero total density")]
    EmptyCell { frame: usize, row: usize, col: usize },
    #[error("frame {frame}: total density of cell ({row}, {col}) does not fit a 4-byte count")]
    DensityOverflow { frame: usize, row: usize, col: usize },
    #[error("frame {frame}: expected {expected} species grids, got {found}")]
    SpeciesCount { frame: usize, expected: usize, found: usize },
    #[error("frame {frame}: species {species} grid is {}x{}, expected {}x{}", .found.0, .found.1, .expected.0, .expected.1)]
    GridsDiffer {
        frame: usize,
        species: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },
}

impl FrameError {
    /// Frame file the error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            FrameError::Io { path, .. }
            | FrameError::Corrupt { path, .. }
            | FrameError::ShapeMismatch { path, .. } => Some(path),
            FrameError::EmptyCell { .. }
            | FrameError::DensityOverflow { .. }
            | FrameError::SpeciesCount { .. }
            | FrameError::GridsDiffer { .. } => None,
        }
    }
}
