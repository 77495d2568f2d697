//! Derived fields built from the per-species occupancy grids of one frame.
//!
//! Two species give the classic binary order parameter
//! `phi = (n0 - n1) / (n0 + n1)` in `[-1, 1]`. Three or more species give a
//! density-weighted mean species index, shifted and scaled so that a cell
//! holding only species 0 maps to 0 and one holding only species `N-1` maps
//! to `(N-1) / (N-0.5)`. Values are never clamped.
//!
//! Cells with zero total density have no defined order parameter. The
//! [`EmptyCellPolicy`] decides whether they become NaN or fail the frame.

use crate::error::FrameError;
use crate::frame_store::{FrameStore, Species};
use crate::grid::{FieldF64, Grid};
use serde::Serialize;

/// How the order parameter is formed, chosen from the species count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompositionMode {
    TwoPhase,
    MultiPhase { species: usize },
}

impl CompositionMode {
    pub fn for_species(species_count: usize) -> Self {
        if species_count == 2 {
            CompositionMode::TwoPhase
        } else {
            CompositionMode::MultiPhase { species: species_count }
        }
    }

    pub fn species_count(&self) -> usize {
        match *self {
            CompositionMode::TwoPhase => 2,
            CompositionMode::MultiPhase { species } => species,
        }
    }

    /// Nominal range of the order parameter, used for colour scaling.
    pub fn nominal_range(&self) -> (f64, f64) {
        match self {
            CompositionMode::TwoPhase => (-1.0, 1.0),
            CompositionMode::MultiPhase { .. } => (0.0, 1.0),
        }
    }
}

/// What to do with cells whose total density is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum EmptyCellPolicy {
    /// The cell's order parameter is `NaN` and the frame is kept.
    #[default]
    Propagate,
    /// The whole frame fails with [`FrameError::EmptyCell`].
    Reject,
}

/// Fields derived for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedField {
    pub mode: CompositionMode,
    pub total_density: Grid,
    pub order_parameter: FieldF64,
    /// Number of cells with zero total density (NaN order parameter).
    pub empty_cells: usize,
}

impl DerivedField {
    pub fn dims(&self) -> (usize, usize) {
        self.total_density.dims()
    }
}

/// Combines per-species grids into a [`DerivedField`].
///
/// `grids[i]` is species `i`; there must be exactly `mode.species_count()`
/// of them and all must share one shape. Sums and differences are taken in
/// `i64`; a cell whose total does not fit an `i32` fails the frame.
/// `frame` is only used to label errors.
pub fn compose(
    mode: CompositionMode,
    grids: &[Grid],
    policy: EmptyCellPolicy,
    frame: usize,
) -> Result<DerivedField, FrameError> {
    let expected = mode.species_count();
    let first = match grids.first() {
        Some(first) if grids.len() == expected => first,
        _ => return Err(FrameError::SpeciesCount { frame, expected, found: grids.len() }),
    };
    let (rows, cols) = first.dims();
    if let Some((species, grid)) = grids.iter().enumerate().find(|(_, g)| g.dims() != (rows, cols)) {
        return Err(FrameError::GridsDiffer { frame, species, expected: (rows, cols), found: grid.dims() });
    }

    let mut total = vec![0i64; rows * cols];
    for grid in grids {
        for (t, &n) in total.iter_mut().zip(grid.as_slice()) {
            *t += n as i64;
        }
    }

    let numerator: Vec<f64> = match mode {
        CompositionMode::TwoPhase => grids[0]
            .as_slice()
            .iter()
            .zip(grids[1].as_slice())
            .map(|(&a, &b)| (a as i64 - b as i64) as f64)
            .collect(),
        CompositionMode::MultiPhase { .. } => {
            let mut weighted = vec![0.0f64; rows * cols];
            for (i, grid) in grids.iter().enumerate() {
                let weight = i as f64 + 0.5;
                for (w, &n) in weighted.iter_mut().zip(grid.as_slice()) {
                    *w += n as f64 * weight;
                }
            }
            weighted
        }
    };

    let mut empty_cells = 0;
    let mut values = Vec::with_capacity(rows * cols);
    let mut counts = Vec::with_capacity(rows * cols);
    for (idx, (&num, &tot)) in numerator.iter().zip(&total).enumerate() {
        let count = i32::try_from(tot)
            .map_err(|_| FrameError::DensityOverflow { frame, row: idx / cols, col: idx % cols })?;
        counts.push(count);
        if tot == 0 {
            if policy == EmptyCellPolicy::Reject {
                return Err(FrameError::EmptyCell { frame, row: idx / cols, col: idx % cols });
            }
            empty_cells += 1;
            values.push(f64::NAN);
            continue;
        }
        let ratio = num / tot as f64;
        values.push(match mode {
            CompositionMode::TwoPhase => ratio,
            CompositionMode::MultiPhase { species } => (ratio - 0.5) / (species as f64 - 0.5),
        });
    }

    Ok(DerivedField {
        mode,
        total_density: Grid::from_cells(rows, cols, counts),
        order_parameter: FieldF64::from_vec(rows, cols, values),
        empty_cells,
    })
}

/// Reads the species grids of a frame from a [`FrameStore`] and composes them.
#[derive(Debug)]
pub struct FieldCompositor {
    store: FrameStore,
    mode: CompositionMode,
    policy: EmptyCellPolicy,
}

impl FieldCompositor {
    pub fn new(store: FrameStore, policy: EmptyCellPolicy) -> Self {
        let mode = CompositionMode::for_species(store.params().species_count);
        FieldCompositor { store, mode, policy }
    }

    pub fn mode(&self) -> CompositionMode {
        self.mode
    }

    pub fn policy(&self) -> EmptyCellPolicy {
        self.policy
    }

    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Derived fields of `frame`. Fails if any species file is unreadable.
    pub fn compute(&mut self, frame: usize) -> Result<DerivedField, FrameError> {
        let grids = (0..self.mode.species_count())
            .map(|s| self.store.read_grid(frame, Species::Index(s)))
            .collect::<Result<Vec<_>, _>>()?;
        compose(self.mode, &grids, self.policy, frame)
    }

    /// Compares `field.total_density` with the combined density file the
    /// simulator writes alongside the per-species ones. Returns the number of
    /// disagreeing cells.
    pub fn verify_total(&mut self, frame: usize, field: &DerivedField) -> Result<usize, FrameError> {
        let combined = self.store.read_grid(frame, Species::Combined)?;
        Ok(combined
            .as_slice()
            .iter()
            .zip(field.total_density.as_slice())
            .filter(|(a, b)| a != b)
            .count())
    }
}

/// Summary numbers of one derived field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldStats {
    /// Smallest finite order parameter (NaN if there is none).
    pub phi_min: f64,
    pub phi_max: f64,
    pub phi_mean: f64,
    pub total_occupancy: i64,
    pub density_min: i32,
    pub density_max: i32,
    pub empty_cells: usize,
}

impl FieldStats {
    pub fn of(field: &DerivedField) -> Self {
        let mut phi_min = f64::INFINITY;
        let mut phi_max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut finite = 0usize;
        for &v in field.order_parameter.as_slice().iter().filter(|v| v.is_finite()) {
            phi_min = phi_min.min(v);
            phi_max = phi_max.max(v);
            sum += v;
            finite += 1;
        }
        let (phi_min, phi_max, phi_mean) = if finite > 0 {
            (phi_min, phi_max, sum / finite as f64)
        } else {
            (f64::NAN, f64::NAN, f64::NAN)
        };

        let density = field.total_density.as_slice();
        FieldStats {
            phi_min,
            phi_max,
            phi_mean,
            total_occupancy: field.total_density.total(),
            density_min: density.iter().copied().min().unwrap_or(0),
            density_max: density.iter().copied().max().unwrap_or(0),
            empty_cells: field.empty_cells,
        }
    }
}
