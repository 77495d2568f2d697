use crate::colormap::ColorMap;
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use plotters::prelude::*;
use replay_common::DerivedField;

const MARGIN: u32 = 16;
const BAR_WIDTH: u32 = 14;
const BAR_GAP: u32 = 10;
const BAR_STEPS: u32 = 64;

/// Pixel placement of the lattice and its colour bar inside one panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelLayout {
    pub origin: (i32, i32),
    pub cell_w: f64,
    pub cell_h: f64,
    pub map_w: u32,
    pub map_h: u32,
    pub bar_x: i32,
}

impl PanelLayout {
    /// Fits a `rows x cols` lattice into a `width x height` panel, keeping square cells.
    pub fn new(width: u32, height: u32, rows: usize, cols: usize) -> Self {
        let avail_w = width.saturating_sub(2 * MARGIN + BAR_GAP + BAR_WIDTH).max(1) as f64;
        let avail_h = height.saturating_sub(2 * MARGIN).max(1) as f64;
        let cell = (avail_w / cols.max(1) as f64).min(avail_h / rows.max(1) as f64);
        let map_w = ((cell * cols as f64).floor() as u32).max(1);
        let map_h = ((cell * rows as f64).floor() as u32).max(1);
        let x0 = MARGIN as i32;
        let y0 = MARGIN as i32 + ((avail_h as u32).saturating_sub(map_h) / 2) as i32;
        PanelLayout {
            origin: (x0, y0),
            cell_w: map_w as f64 / cols.max(1) as f64,
            cell_h: map_h as f64 / rows.max(1) as f64,
            map_w,
            map_h,
            bar_x: x0 + map_w as i32 + BAR_GAP as i32,
        }
    }

    /// Pixel rectangle of cell `(row, col)`; row 0 is drawn at the bottom.
    pub fn cell_rect(&self, rows: usize, row: usize, col: usize) -> [(i32, i32); 2] {
        let (x0, y0) = self.origin;
        let flipped = rows - 1 - row;
        let left = x0 + (col as f64 * self.cell_w).round() as i32;
        let right = x0 + ((col + 1) as f64 * self.cell_w).round() as i32;
        let top = y0 + (flipped as f64 * self.cell_h).round() as i32;
        let bottom = y0 + ((flipped + 1) as f64 * self.cell_h).round() as i32;
        [(left, top), (right, bottom)]
    }
}

/// Colour scaling of one panel.
#[derive(Debug, Clone, Copy)]
pub struct PanelStyle {
    pub colormap: ColorMap,
    pub range: (f64, f64),
}

/// Draws the order parameter (left) and total density (right) side by side.
pub fn render_panels(
    field: &DerivedField,
    width: u32,
    height: u32,
    order_style: PanelStyle,
    density_style: PanelStyle,
) -> Result<RgbImage> {
    let (rows, cols) = field.dims();
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("failed to clear frame: {}", e))?;
        let panels = root.split_evenly((1, 2));
        let (left, right) = (&panels[0], &panels[1]);
        let layout = PanelLayout::new(width / 2, height, rows, cols);

        let phi = field.order_parameter.as_slice();
        draw_lattice(left, &layout, rows, cols, |i| {
            let (lo, hi) = order_style.range;
            order_style.colormap.sample_range(phi[i], lo, hi)
        })?;
        draw_color_bar(left, &layout, order_style.colormap)?;

        let density = field.total_density.as_slice();
        draw_lattice(right, &layout, rows, cols, |i| {
            let (lo, hi) = density_style.range;
            density_style.colormap.sample_range(density[i] as f64, lo, hi)
        })?;
        draw_color_bar(right, &layout, density_style.colormap)?;

        root.present().map_err(|e| anyhow!("failed to finish frame: {}", e))?;
    }
    RgbImage::from_raw(width, height, buffer).context("frame buffer has the wrong size")
}

/// Min/max of the total density, used to auto-scale the density panel.
pub fn density_range(field: &DerivedField) -> (f64, f64) {
    let cells = field.total_density.as_slice();
    let lo = cells.iter().copied().min().unwrap_or(0);
    let hi = cells.iter().copied().max().unwrap_or(0);
    (lo as f64, hi as f64)
}

fn draw_lattice<DB, F>(area: &DrawingArea<DB, plotters::coord::Shift>, layout: &PanelLayout, rows: usize, cols: usize, color_of: F) -> Result<()>
where
    DB: DrawingBackend,
    F: Fn(usize) -> [u8; 3],
{
    for row in 0..rows {
        for col in 0..cols {
            let [r, g, b] = color_of(row * cols + col);
            let rect = Rectangle::new(layout.cell_rect(rows, row, col), RGBColor(r, g, b).filled());
            area.draw(&rect).map_err(|e| anyhow!("failed to draw cell ({}, {}): {}", row, col, e))?;
        }
    }
    let (x0, y0) = layout.origin;
    let frame = [(x0, y0), (x0 + layout.map_w as i32, y0 + layout.map_h as i32)];
    area.draw(&Rectangle::new(frame, BLACK.stroke_width(1)))
        .map_err(|e| anyhow!("failed to draw lattice border: {}", e))?;
    Ok(())
}

fn draw_color_bar<DB: DrawingBackend>(area: &DrawingArea<DB, plotters::coord::Shift>, layout: &PanelLayout, colormap: ColorMap) -> Result<()> {
    let (_, y0) = layout.origin;
    let step_h = layout.map_h as f64 / BAR_STEPS as f64;
    for step in 0..BAR_STEPS {
        let t = (step as f64 + 0.5) / BAR_STEPS as f64;
        let [r, g, b] = colormap.sample(t);
        // low values at the bottom
        let top = y0 + (layout.map_h as f64 - (step + 1) as f64 * step_h).round() as i32;
        let bottom = y0 + (layout.map_h as f64 - step as f64 * step_h).round() as i32;
        let rect = Rectangle::new(
            [(layout.bar_x, top), (layout.bar_x + BAR_WIDTH as i32, bottom)],
            RGBColor(r, g, b).filled(),
        );
        area.draw(&rect).map_err(|e| anyhow!("failed to draw colour bar: {}", e))?;
    }
    let outline = [(layout.bar_x, y0), (layout.bar_x + BAR_WIDTH as i32, y0 + layout.map_h as i32)];
    area.draw(&Rectangle::new(outline, BLACK.stroke_width(1)))
        .map_err(|e| anyhow!("failed to draw colour bar border: {}", e))?;
    Ok(())
}
