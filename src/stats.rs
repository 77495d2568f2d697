use anyhow::{Context, Result};
use replay_common::{DerivedField, FieldStats, FrameIndex};
use serde::Serialize;
use std::fs::File;
use std::path::Path;

/// One CSV row per frame index.
#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub frame: FrameIndex,
    pub step: usize,
    pub status: &'static str,
    pub phi_min: Option<f64>,
    pub phi_max: Option<f64>,
    pub phi_mean: Option<f64>,
    pub total_occupancy: Option<i64>,
    pub density_min: Option<i32>,
    pub density_max: Option<i32>,
    pub empty_cells: Option<usize>,
    pub total_mismatches: Option<usize>,
}

impl FrameRecord {
    pub fn rendered(frame: FrameIndex, step: usize, field: &DerivedField, total_mismatches: Option<usize>) -> Self {
        let stats = FieldStats::of(field);
        let finite = |v: f64| v.is_finite().then_some(v);
        FrameRecord {
            frame,
            step,
            status: "ok",
            phi_min: finite(stats.phi_min),
            phi_max: finite(stats.phi_max),
            phi_mean: finite(stats.phi_mean),
            total_occupancy: Some(stats.total_occupancy),
            density_min: Some(stats.density_min),
            density_max: Some(stats.density_max),
            empty_cells: Some(stats.empty_cells),
            total_mismatches,
        }
    }

    pub fn skipped(frame: FrameIndex, step: usize) -> Self {
        FrameRecord {
            frame,
            step,
            status: "skipped",
            phi_min: None,
            phi_max: None,
            phi_mean: None,
            total_occupancy: None,
            density_min: None,
            density_max: None,
            empty_cells: None,
            total_mismatches: None,
        }
    }
}

/// Per-frame statistics written as CSV.
pub struct StatsWriter {
    writer: csv::Writer<File>,
}

impl StatsWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create stats file {}", path.display()))?;
        Ok(StatsWriter { writer })
    }

    pub fn write(&mut self, record: &FrameRecord) -> Result<()> {
        self.writer.serialize(record).context("Failed to write stats row")
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush stats file")
    }
}
