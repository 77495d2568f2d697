use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

mod stats;

use replay_common::{
    Advance, DerivedField, EmptyCellPolicy, EndBehavior, FieldCompositor, FieldStats, FrameError,
    FrameIndex, FrameStore, ParameterSet, PlaybackController, RenderSink,
};
use replay_visualizer::{ColorMap, FrameRenderer, RenderOptions};
use stats::{FrameRecord, StatsWriter};

/// Replays the density frames of a lattice simulation run as a two-panel animation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run directory holding the `parameters` file and the frame files
    dir: PathBuf,

    /// Directory to write one PNG per frame into
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Output video file path (.mp4)
    #[arg(long)]
    video: Option<PathBuf>,

    /// Frames per second for the output video
    #[arg(long, default_value_t = 10)]
    fps: u32,

    /// Width of the output images in pixels (both panels)
    #[arg(long, default_value_t = 1200)]
    width: u32,

    /// Height of the output images in pixels
    #[arg(long, default_value_t = 600)]
    height: u32,

    /// Colour map of the order-parameter panel (viridis, jet, gray); default depends on the species count
    #[arg(long)]
    colormap: Option<ColorMap>,

    /// Only replay this frame index
    #[arg(long)]
    frame: Option<FrameIndex>,

    /// Write per-frame statistics to this CSV file
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Fail frames containing cells with zero total density instead of drawing them blank
    #[arg(long)]
    strict_empty_cells: bool,

    /// Compare recomputed totals with the combined density file of each frame
    #[arg(long)]
    check_totals: bool,

    /// Keep decoded grids in memory for the whole session
    #[arg(long)]
    cache: bool,
}

/// Everything a replayed frame is handed to: the renderer, the stats file and the progress bar.
struct ReplayOutput {
    renderer: Option<FrameRenderer>,
    stats: Option<StatsWriter>,
    progress: ProgressBar,
    sample_interval: usize,
    total_mismatches: Option<usize>,
}

impl RenderSink for ReplayOutput {
    fn render_frame(&mut self, frame: FrameIndex, field: &DerivedField) -> Result<()> {
        let summary = FieldStats::of(field);
        debug!(
            "Frame {} | phi [{:.3}, {:.3}] mean {:.3} | occupancy {} | empty cells {}",
            frame, summary.phi_min, summary.phi_max, summary.phi_mean, summary.total_occupancy, summary.empty_cells
        );
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.render_frame(frame, field)?;
        }
        if let Some(stats) = self.stats.as_mut() {
            let step = frame * self.sample_interval;
            stats.write(&FrameRecord::rendered(frame, step, field, self.total_mismatches.take()))?;
        }
        self.progress.inc(1);
        Ok(())
    }

    fn frame_failed(&mut self, frame: FrameIndex, error: &FrameError) {
        self.progress.suspend(|| warn!("Skipping frame {}: {}", frame, error));
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.frame_failed(frame, error);
        }
        if let Some(stats) = self.stats.as_mut() {
            if let Err(e) = stats.write(&FrameRecord::skipped(frame, frame * self.sample_interval)) {
                error!("{:#}", e);
            }
        }
        self.progress.inc(1);
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.finish()?;
        }
        if let Some(stats) = self.stats.as_mut() {
            stats.flush()?;
        }
        self.progress.finish_and_clear();
        Ok(())
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    run_with_args(args)
}

fn run_with_args(args: Args) -> Result<()> {
    info!("Starting Lattice Replay...");
    info!("Run directory: {}", args.dir.display());

    // --- Load Run Parameters ---
    let params = ParameterSet::load(&args.dir)
        .with_context(|| format!("Failed to load run parameters from {}", args.dir.display()))?;
    let (rows, cols) = params.dims();
    info!("Lattice: {} x {} cells ({:?})", rows, cols, params.grid_shape);
    info!("Species: {}", params.species_count);
    info!(
        "Steps: {} saved every {} steps -> {} frames",
        params.step_count,
        params.sample_interval,
        params.frame_count()
    );
    if let Some(dens) = &params.target_density {
        info!("Initial density: {:?}", dens);
    }
    if let Some(tau) = params.time_step {
        info!("Time step: {}", tau);
    }
    debug!("Run parameters: {:#?}", params);

    if params.frame_count() == 0 {
        warn!("Run has no saved frames (nsteps < ninfo). Nothing to replay.");
        return Ok(());
    }

    // --- Build Playback ---
    let sample_interval = params.sample_interval;
    let frame_count = params.frame_count();
    let store = if args.cache {
        FrameStore::with_cache(&args.dir, params)
    } else {
        FrameStore::new(&args.dir, params)
    };
    let policy = if args.strict_empty_cells {
        EmptyCellPolicy::Reject
    } else {
        EmptyCellPolicy::Propagate
    };
    let compositor = FieldCompositor::new(store, policy);
    let mode = compositor.mode();
    info!("Composition mode: {:?}, empty cells: {:?}", mode, policy);
    let mut controller = PlaybackController::new(compositor, EndBehavior::Stop);

    let frames_to_replay = match args.frame {
        Some(frame) if frame < frame_count => 1,
        Some(frame) => anyhow::bail!("Frame {} is out of range, the run has {} frames", frame, frame_count),
        None => controller.frame_sequence().len(),
    };

    // --- Set up Outputs ---
    let renderer = if args.frames_dir.is_some() || args.video.is_some() {
        let options = RenderOptions {
            width: args.width,
            height: args.height,
            order_colormap: args.colormap,
            frames_dir: args.frames_dir.clone(),
            video: args.video.clone(),
            fps: args.fps,
            ..RenderOptions::default()
        };
        Some(FrameRenderer::new(options, mode)?)
    } else {
        info!("No --frames-dir or --video given; composing frames without rendering.");
        None
    };
    let stats = match &args.stats {
        Some(path) => Some(StatsWriter::create(path)?),
        None => None,
    };

    let progress = ProgressBar::new(frames_to_replay as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({percent}%) [{eta}]")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );

    let mut output = ReplayOutput {
        renderer,
        stats,
        progress,
        sample_interval,
        total_mismatches: None,
    };

    // --- Replay ---
    let start_time = Instant::now();
    let mut rendered = 0usize;
    let mut skipped = Vec::new();

    if let Some(frame) = args.frame {
        match controller.compute(frame) {
            Ok(field) => {
                deliver(&mut controller, &mut output, frame, &field, args.check_totals)?;
                rendered += 1;
            }
            Err(e) => {
                output.frame_failed(frame, &e);
                skipped.push(frame);
            }
        }
    } else {
        loop {
            match controller.advance() {
                Advance::Frame(frame, field) => {
                    deliver(&mut controller, &mut output, frame, &field, args.check_totals)?;
                    rendered += 1;
                }
                Advance::Skipped(frame, e) => {
                    output.frame_failed(frame, &e);
                    skipped.push(frame);
                }
                Advance::EndOfSequence => break,
            }
        }
    }
    output.finish()?;

    let duration = start_time.elapsed();
    info!(
        "Replay finished in {:.2?}: {} frames rendered, {} skipped ({:.1} frames per second)",
        duration,
        rendered,
        skipped.len(),
        rendered as f64 / duration.as_secs_f64().max(1e-9)
    );
    if !skipped.is_empty() {
        warn!("Skipped frames: {:?}", skipped);
    }
    if rendered == 0 {
        error!("No frame of {} could be replayed.", args.dir.display());
    }
    Ok(())
}

/// Optionally cross-checks totals, then hands the frame to the outputs.
fn deliver(
    controller: &mut PlaybackController,
    output: &mut ReplayOutput,
    frame: FrameIndex,
    field: &DerivedField,
    check_totals: bool,
) -> Result<()> {
    if check_totals {
        match controller.compositor_mut().verify_total(frame, field) {
            Ok(0) => output.total_mismatches = Some(0),
            Ok(n) => {
                output.progress.suspend(|| {
                    warn!("Frame {}: {} cells disagree with the combined density file", frame, n)
                });
                output.total_mismatches = Some(n);
            }
            Err(e) => output.progress.suspend(|| warn!("Frame {}: cannot check totals: {}", frame, e)),
        }
    }
    output.render_frame(frame, field)
}
