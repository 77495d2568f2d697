//! Render sink for lattice replays: draws the order parameter and total
//! density of each frame side by side, writes PNG frames and/or an MP4.

pub mod colormap;
pub mod panels;
pub mod video;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use replay_common::{CompositionMode, DerivedField, FrameError, FrameIndex, RenderSink};
use std::fs;
use std::path::PathBuf;

pub use colormap::ColorMap;
pub use panels::{density_range, render_panels, PanelLayout, PanelStyle};
pub use video::VideoWriter;

/// Presentation settings for [`FrameRenderer`].
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Width of the output image in pixels (both panels)
    pub width: u32,
    /// Height of the output image in pixels
    pub height: u32,
    /// Colour map of the order-parameter panel; chosen from the species count if `None`
    pub order_colormap: Option<ColorMap>,
    pub density_colormap: ColorMap,
    /// Directory receiving one PNG per frame
    pub frames_dir: Option<PathBuf>,
    /// MP4 output path
    pub video: Option<PathBuf>,
    pub fps: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            width: 1200,
            height: 600,
            order_colormap: None,
            density_colormap: ColorMap::Viridis,
            frames_dir: None,
            video: None,
            fps: 10,
        }
    }
}

/// Turns composed frames into images and hands them to the configured outputs.
pub struct FrameRenderer {
    width: u32,
    height: u32,
    order_colormap: ColorMap,
    density_colormap: ColorMap,
    order_range: (f64, f64),
    frames_dir: Option<PathBuf>,
    video: Option<VideoWriter>,
    description: String,
    rendered: usize,
    failed: usize,
}

impl FrameRenderer {
    pub fn new(options: RenderOptions, mode: CompositionMode) -> Result<Self> {
        let width = video::even(options.width);
        let height = video::even(options.height);
        if (width, height) != (options.width, options.height) {
            warn!(
                "Frame size {}x{} rounded down to {}x{} for video encoding.",
                options.width, options.height, width, height
            );
        }

        if let Some(dir) = &options.frames_dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create frame directory {}", dir.display()))?;
            info!("Writing PNG frames to {}", dir.display());
        }

        let video = match &options.video {
            Some(path) => {
                info!("Writing video to {} at {} fps", path.display(), options.fps);
                Some(VideoWriter::new(path, width, height, options.fps)?)
            }
            None => None,
        };

        Ok(FrameRenderer {
            width,
            height,
            order_colormap: options
                .order_colormap
                .unwrap_or_else(|| ColorMap::for_species(mode.species_count())),
            density_colormap: options.density_colormap,
            order_range: mode.nominal_range(),
            frames_dir: options.frames_dir,
            video,
            description: format!("Lattice replay - {} species", mode.species_count()),
            rendered: 0,
            failed: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn rendered(&self) -> usize {
        self.rendered
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// File name of the PNG written for `frame`.
    pub fn png_name(frame: FrameIndex) -> String {
        format!("frame{:05}.png", frame)
    }

    /// Draws one frame without writing it anywhere.
    pub fn draw(&self, field: &DerivedField) -> Result<image::RgbImage> {
        let order = PanelStyle { colormap: self.order_colormap, range: self.order_range };
        let density = PanelStyle { colormap: self.density_colormap, range: density_range(field) };
        render_panels(field, self.width, self.height, order, density)
    }
}

impl RenderSink for FrameRenderer {
    fn render_frame(&mut self, frame: FrameIndex, field: &DerivedField) -> Result<()> {
        let image = self.draw(field).with_context(|| format!("Failed to draw frame {}", frame))?;

        if let Some(dir) = &self.frames_dir {
            let path = dir.join(Self::png_name(frame));
            image
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        if let Some(video) = self.video.as_mut() {
            video.push(&image)?;
        }
        self.rendered += 1;
        Ok(())
    }

    /// Only counts the frame; the playback loop reports the error.
    fn frame_failed(&mut self, frame: FrameIndex, error: &FrameError) {
        debug!("Frame {} left out of the output: {}", frame, error);
        self.failed += 1;
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(video) = self.video.take() {
            video.finish(&self.description)?;
        }
        info!("Rendered {} frames ({} skipped).", self.rendered, self.failed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_common::{compose, EmptyCellPolicy, Grid};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn field() -> DerivedField {
        compose(
            CompositionMode::MultiPhase { species: 3 },
            &[
                Grid::from_vec(2, 2, vec![1, 0, 0, 2]).unwrap(),
                Grid::from_vec(2, 2, vec![0, 1, 0, 2]).unwrap(),
                Grid::from_vec(2, 2, vec![0, 0, 1, 2]).unwrap(),
            ],
            EmptyCellPolicy::Propagate,
            0,
        )
        .unwrap()
    }

    #[test]
    fn odd_sizes_are_made_even() {
        let options = RenderOptions { width: 301, height: 151, ..RenderOptions::default() };
        let renderer = FrameRenderer::new(options, CompositionMode::TwoPhase).unwrap();
        assert_eq!(renderer.dimensions(), (300, 150));
    }

    #[test]
    fn writes_png_frames() {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
        let dir = std::env::temp_dir().join(format!("replay_visualizer_png_{}_{}", std::process::id(), timestamp));
        let options = RenderOptions {
            width: 200,
            height: 100,
            frames_dir: Some(dir.clone()),
            ..RenderOptions::default()
        };
        let mut renderer = FrameRenderer::new(options, CompositionMode::MultiPhase { species: 3 }).unwrap();
        renderer.render_frame(7, &field()).unwrap();
        renderer.finish().unwrap();
        assert_eq!(renderer.rendered(), 1);

        let written = image::open(dir.join(FrameRenderer::png_name(7))).expect("png").to_rgb8();
        assert_eq!(written.dimensions(), (200, 100));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failures_are_counted() {
        let mut renderer = FrameRenderer::new(RenderOptions::default(), CompositionMode::TwoPhase).unwrap();
        renderer.frame_failed(3, &FrameError::EmptyCell { frame: 3, row: 0, col: 0 });
        assert_eq!(renderer.failed(), 1);
        assert_eq!(renderer.rendered(), 0);
    }
}
