use crate::error::FrameError;
use crate::grid::Grid;
use crate::params::ParameterSet;
use log::trace;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use zerocopy::byteorder::little_endian::I32;
use zerocopy::FromBytes;

/// Width in bytes of one encoded cell.
pub const CELL_WIDTH: usize = std::mem::size_of::<i32>();

/// Which density file of a frame to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    /// Per-species occupancy, `frame<step>.density.<i>.dat`.
    Index(usize),
    /// All species together, `frame<step>.density.dat`.
    Combined,
}

/// Resolves frame files of one run directory and decodes them into grids.
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
    params: ParameterSet,
    cache: Option<HashMap<(usize, Species), Grid>>,
}

impl FrameStore {
    pub fn new<P: Into<PathBuf>>(dir: P, params: ParameterSet) -> Self {
        FrameStore { dir: dir.into(), params, cache: None }
    }

    /// Same as [`FrameStore::new`], but keeps every decoded grid for the
    /// lifetime of the store. Frame files are written once by the simulator,
    /// so entries are never invalidated.
    pub fn with_cache<P: Into<PathBuf>>(dir: P, params: ParameterSet) -> Self {
        FrameStore { dir: dir.into(), params, cache: Some(HashMap::new()) }
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of cached grids (0 when caching is off).
    pub fn cached_len(&self) -> usize {
        self.cache.as_ref().map_or(0, HashMap::len)
    }

    /// Path of the density file for `frame` and `species`.
    pub fn frame_path(&self, frame: usize, species: Species) -> PathBuf {
        let step = self.params.step_of(frame);
        let name = match species {
            Species::Index(i) => format!("frame{}.density.{}.dat", step, i),
            Species::Combined => format!("frame{}.density.dat", step),
        };
        self.dir.join(name)
    }

    /// Reads and decodes one density file into a grid of the run's shape.
    pub fn read_grid(&mut self, frame: usize, species: Species) -> Result<Grid, FrameError> {
        if let Some(grid) = self.cache.as_ref().and_then(|c| c.get(&(frame, species))) {
            return Ok(grid.clone());
        }

        let path = self.frame_path(frame, species);
        trace!("Reading {}", path.display());
        let bytes = std::fs::read(&path).map_err(|source| FrameError::Io { path: path.clone(), source })?;
        let (rows, cols) = self.params.dims();
        let grid = decode_grid(&bytes, rows, cols).map_err(|e| e.at(path))?;

        if let Some(cache) = self.cache.as_mut() {
            cache.insert((frame, species), grid.clone());
        }
        Ok(grid)
    }
}

/// Decoding failure not yet tied to a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    Corrupt { len: usize },
    ShapeMismatch { rows: usize, cols: usize, found: usize },
}

impl DecodeError {
    /// Attaches the offending file path.
    pub fn at(self, path: PathBuf) -> FrameError {
        match self {
            DecodeError::Corrupt { len } => FrameError::Corrupt { path, len, width: CELL_WIDTH },
            DecodeError::ShapeMismatch { rows, cols, found } => FrameError::ShapeMismatch {
                path,
                rows,
                cols,
                expected: rows * cols,
                found,
            },
        }
    }
}

/// Decodes a raw buffer of little-endian `i32` into a `rows x cols` grid.
pub fn decode_grid(bytes: &[u8], rows: usize, cols: usize) -> Result<Grid, DecodeError> {
    if bytes.len() % CELL_WIDTH != 0 {
        return Err(DecodeError::Corrupt { len: bytes.len() });
    }
    let cells = <[I32]>::ref_from_bytes(bytes).map_err(|_| DecodeError::Corrupt { len: bytes.len() })?;
    let found = cells.len();
    let cells: Vec<i32> = cells.iter().map(|c| c.get()).collect();
    Grid::from_vec(rows, cols, cells).ok_or(DecodeError::ShapeMismatch { rows, cols, found })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GridShape;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn params(rows: usize, cols: usize) -> ParameterSet {
        ParameterSet {
            grid_shape: GridShape::Lattice { rows, cols },
            species_count: 2,
            step_count: 1000,
            sample_interval: 100,
            target_density: None,
            time_step: None,
        }
    }

    #[test]
    fn decode_round_trips_random_grids() {
        let mut rng = StdRng::seed_from_u64(7);
        for &(rows, cols) in &[(1, 1), (3, 5), (16, 16), (7, 2)] {
            let cells: Vec<i32> = (0..rows * cols).map(|_| rng.random_range(-50..5000)).collect();
            let grid = Grid::from_vec(rows, cols, cells).unwrap();
            let decoded = decode_grid(&grid.to_le_bytes(), rows, cols).unwrap();
            assert_eq!(decoded, grid);
        }
    }

    #[test]
    fn odd_lengths_are_corrupt() {
        for len in [1usize, 2, 3, 5, 7, 13] {
            let bytes = vec![0u8; len];
            assert_eq!(decode_grid(&bytes, 1, 1), Err(DecodeError::Corrupt { len }));
        }
    }

    #[test]
    fn wrong_cell_counts_are_shape_mismatches() {
        for cells in [0usize, 1, 5, 7] {
            let bytes = vec![0u8; cells * CELL_WIDTH];
            assert_eq!(
                decode_grid(&bytes, 2, 3),
                Err(DecodeError::ShapeMismatch { rows: 2, cols: 3, found: cells })
            );
        }
    }

    #[test]
    fn paths_follow_step_numbering() {
        let store = FrameStore::new("/runs/a", params(2, 2));
        assert_eq!(
            store.frame_path(3, Species::Index(1)),
            PathBuf::from("/runs/a/frame300.density.1.dat")
        );
        assert_eq!(
            store.frame_path(0, Species::Combined),
            PathBuf::from("/runs/a/frame0.density.dat")
        );
    }

    #[test]
    fn missing_files_are_io_errors() {
        let mut store = FrameStore::new("/nonexistent/run/dir", params(2, 2));
        let err = store.read_grid(0, Species::Index(0)).unwrap_err();
        assert!(matches!(err, FrameError::Io { .. }));
        assert_eq!(
            err.path(),
            Some(&PathBuf::from("/nonexistent/run/dir/frame0.density.0.dat"))
        );
    }
}
