use serde::Serialize;

/// Occupancy counts of one species on the lattice at one recorded step.
/// Stored row-major; row 0 is the bottom row of the rendered picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    rows: usize,
    cols: usize,
    cells: Vec<i32>,
}

impl Grid {
    /// Wraps a row-major cell vector. Returns `None` if the length does not match `rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, cells: Vec<i32>) -> Option<Self> {
        (cells.len() == rows * cols).then_some(Grid { rows, cols, cells })
    }

    /// Length already checked by the caller.
    pub(crate) fn from_cells(rows: usize, cols: usize, cells: Vec<i32>) -> Self {
        debug_assert_eq!(cells.len(), rows * cols);
        Grid { rows, cols, cells }
    }

    /// A grid filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Grid { rows, cols, cells: vec![0; rows * cols] }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<i32> {
        if row < self.rows && col < self.cols {
            Some(self.cells[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.cells
    }


    /// Sum over all cells.
    pub fn total(&self) -> i64 {
        self.cells.iter().map(|&c| c as i64).sum()
    }

    /// Encodes the cells as little-endian `i32`, the layout the simulator writes.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.cells.len() * 4);
        for cell in &self.cells {
            out.extend_from_slice(&cell.to_le_bytes());
        }
        out
    }
}

/// Row-major floating point field with the same layout as [`Grid`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldF64 {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FieldF64 {
    pub(crate) fn from_vec(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), rows * cols);
        FieldF64 { rows, cols, values }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row < self.rows && col < self.cols {
            Some(self.values[row * self.cols + col])
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
