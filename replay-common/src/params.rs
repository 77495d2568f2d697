use crate::error::ParameterError;
use crate::literal::{parse_literal, Literal};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Name of the run card the simulator keeps next to its frame files.
pub const PARAMETER_FILE: &str = "parameters";

/// Lattice dimensions, in one of the two conventions the simulator has used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GridShape {
    /// `L = [rows, cols]`
    Lattice { rows: usize, cols: usize },
    /// `nboxes = n`, a square `n x n` lattice
    Boxes { nboxes: usize },
}

impl GridShape {
    pub fn dims(&self) -> (usize, usize) {
        match *self {
            GridShape::Lattice { rows, cols } => (rows, cols),
            GridShape::Boxes { nboxes } => (nboxes, nboxes),
        }
    }

    pub fn cell_count(&self) -> usize {
        let (rows, cols) = self.dims();
        rows * cols
    }
}

/// Run metadata read from the `parameters` file. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSet {
    pub grid_shape: GridShape,
    pub species_count: usize,
    pub step_count: usize,
    pub sample_interval: usize,
    /// Initial per-species density (`dens`); informational only.
    pub target_density: Option<Vec<f64>>,
    /// Integration time step (`tau`); informational only.
    pub time_step: Option<f64>,
}

impl ParameterSet {
    /// Loads `<dir>/parameters`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self, ParameterError> {
        let path = dir.as_ref().join(PARAMETER_FILE);
        let text = std::fs::read_to_string(&path)
            .map_err(|source| ParameterError::Io { path: path.clone(), source })?;
        Self::parse(&text)
    }

    /// Parses run-card text made of `name = value` lines.
    pub fn parse(text: &str) -> Result<Self, ParameterError> {
        let entries = collect_entries(text);

        let grid_shape = match (entries.get("L"), entries.get("nboxes")) {
            (Some(raw), Some(_)) => {
                return Err(ParameterError::Invalid {
                    key: "L",
                    value: raw.to_string(),
                    reason: "both 'L' and 'nboxes' are set, the lattice shape is ambiguous".into(),
                })
            }
            (Some(raw), None) => parse_lattice(raw)?,
            (None, Some(raw)) => GridShape::Boxes { nboxes: positive("nboxes", raw)? },
            (None, None) => return Err(ParameterError::Missing { key: "L" }),
        };
        check_cell_count(&entries, grid_shape)?;

        let species_count = positive("ntypes", required(&entries, "ntypes")?)?;
        let step_count = non_negative("nsteps", required(&entries, "nsteps")?)?;
        let sample_interval = positive("ninfo", required(&entries, "ninfo")?)?;

        let target_density = match entries.get("dens") {
            Some(raw) => {
                let lit = literal("dens", raw)?;
                let values = lit.as_floats().ok_or_else(|| ParameterError::Invalid {
                    key: "dens",
                    value: raw.to_string(),
                    reason: "expected a number or a flat sequence of numbers".into(),
                })?;
                if values.len() != 1 && values.len() != species_count {
                    warn!(
                        "'dens' lists {} values for {} species; keeping it as informational only.",
                        values.len(),
                        species_count
                    );
                }
                Some(values)
            }
            None => None,
        };

        let time_step = match entries.get("tau") {
            Some(raw) => Some(raw.parse::<f64>().map_err(|e| ParameterError::Invalid {
                key: "tau",
                value: raw.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(ParameterSet {
            grid_shape,
            species_count,
            step_count,
            sample_interval,
            target_density,
            time_step,
        })
    }

    pub fn dims(&self) -> (usize, usize) {
        self.grid_shape.dims()
    }

    pub fn cell_count(&self) -> usize {
        self.grid_shape.cell_count()
    }

    /// Number of saved frames, `nsteps / ninfo`.
    pub fn frame_count(&self) -> usize {
        self.step_count / self.sample_interval
    }

    /// Simulation step at which `frame` was written.
    pub fn step_of(&self, frame: usize) -> usize {
        frame * self.sample_interval
    }
}

/// Splits the text into `name -> value`, first occurrence wins.
fn collect_entries(text: &str) -> HashMap<&str, &str> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            debug!("Ignoring parameter line without '=': {}", line);
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if !KNOWN_KEYS.contains(&name) {
            debug!("Ignoring unknown parameter '{}'", name);
            continue;
        }
        if entries.contains_key(name) {
            warn!("Parameter '{}' is set more than once; keeping the first value.", name);
            continue;
        }
        entries.insert(name, value);
    }
    entries
}

const KNOWN_KEYS: &[&str] = &["L", "nboxes", "dens", "ntypes", "nsteps", "ninfo", "tau"];

fn required<'a>(entries: &HashMap<&str, &'a str>, key: &'static str) -> Result<&'a str, ParameterError> {
    entries.get(key).copied().ok_or(ParameterError::Missing { key })
}

fn literal(key: &'static str, raw: &str) -> Result<Literal, ParameterError> {
    parse_literal(raw).map_err(|source| ParameterError::Literal { key, source })
}

fn integer(key: &'static str, raw: &str) -> Result<i64, ParameterError> {
    raw.parse::<i64>().map_err(|e| ParameterError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

fn positive(key: &'static str, raw: &str) -> Result<usize, ParameterError> {
    match integer(key, raw)? {
        v if v >= 1 => Ok(v as usize),
        _ => Err(ParameterError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must be at least 1".into(),
        }),
    }
}

fn non_negative(key: &'static str, raw: &str) -> Result<usize, ParameterError> {
    match integer(key, raw)? {
        v if v >= 0 => Ok(v as usize),
        _ => Err(ParameterError::Invalid {
            key,
            value: raw.to_string(),
            reason: "must not be negative".into(),
        }),
    }
}

/// Rejects lattices whose per-cell buffers could not be addressed.
fn check_cell_count(entries: &HashMap<&str, &str>, shape: GridShape) -> Result<(), ParameterError> {
    let (rows, cols) = shape.dims();
    let fits = rows
        .checked_mul(cols)
        .and_then(|cells| cells.checked_mul(std::mem::size_of::<f64>()))
        .is_some_and(|bytes| bytes <= isize::MAX as usize);
    if fits {
        return Ok(());
    }
    let key = match shape {
        GridShape::Lattice { .. } => "L",
        GridShape::Boxes { .. } => "nboxes",
    };
    Err(ParameterError::Invalid {
        key,
        value: entries.get(key).copied().unwrap_or_default().to_string(),
        reason: format!("a {} x {} lattice is too large to address", rows, cols),
    })
}

fn parse_lattice(raw: &str) -> Result<GridShape, ParameterError> {
    let invalid = |reason: &str| ParameterError::Invalid {
        key: "L",
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    let dims = literal("L", raw)?
        .as_ints()
        .ok_or_else(|| invalid("expected a flat sequence of integers"))?;
    match dims.as_slice() {
        &[rows, cols] if rows > 0 && cols > 0 => Ok(GridShape::Lattice {
            rows: rows as usize,
            cols: cols as usize,
        }),
        &[_, _] => Err(invalid("dimensions must be positive")),
        _ => Err(invalid("expected exactly two dimensions")),
    }
}
