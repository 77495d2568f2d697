//! Pull-based playback over the saved frames of a run.
//!
//! The controller owns no timer. Whoever drives the display calls
//! [`PlaybackController::advance`] once per tick, or hands a [`RenderSink`]
//! to [`PlaybackController::play`] for a single pass.

use crate::compositor::{DerivedField, FieldCompositor};
use crate::error::FrameError;
use log::{debug, warn};
use std::ops::Range;

/// Index of a saved frame, `step / sample_interval`.
pub type FrameIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Stopped,
}

/// What [`PlaybackController::advance`] does after the last frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndBehavior {
    /// Report [`Advance::EndOfSequence`] and stay stopped until restarted.
    #[default]
    Stop,
    /// Wrap around to frame 0.
    Loop,
}

/// Result of one playback tick.
#[derive(Debug)]
pub enum Advance {
    Frame(FrameIndex, DerivedField),
    /// The frame could not be built; the cursor has moved past it.
    Skipped(FrameIndex, FrameError),
    EndOfSequence,
}

/// The frame indices of a run, `0..frame_count`. Cloning or calling
/// [`PlaybackController::frame_sequence`] again restarts from 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSequence {
    range: Range<FrameIndex>,
}

impl FrameSequence {
    pub fn new(frame_count: usize) -> Self {
        FrameSequence { range: 0..frame_count }
    }
}

impl Iterator for FrameSequence {
    type Item = FrameIndex;

    fn next(&mut self) -> Option<FrameIndex> {
        self.range.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl ExactSizeIterator for FrameSequence {}

/// Receives composed frames. Implemented by the visualizer.
pub trait RenderSink {
    fn render_frame(&mut self, frame: FrameIndex, field: &DerivedField) -> anyhow::Result<()>;

    /// Called instead of `render_frame` when a frame could not be built.
    fn frame_failed(&mut self, frame: FrameIndex, error: &FrameError) {
        warn!("Skipping frame {}: {}", frame, error);
    }

    /// Called once after the last frame of a pass.
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Outcome of [`PlaybackController::play`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub rendered: usize,
    pub skipped: Vec<FrameIndex>,
}

/// Walks the frame sequence and composes each frame on demand.
#[derive(Debug)]
pub struct PlaybackController {
    compositor: FieldCompositor,
    frame_count: usize,
    end_behavior: EndBehavior,
    cursor: FrameIndex,
    state: PlaybackState,
}

impl PlaybackController {
    pub fn new(compositor: FieldCompositor, end_behavior: EndBehavior) -> Self {
        let frame_count = compositor.store().params().frame_count();
        PlaybackController {
            compositor,
            frame_count,
            end_behavior,
            cursor: 0,
            state: PlaybackState::Idle,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Index the next call to `advance` will produce.
    pub fn cursor(&self) -> FrameIndex {
        self.cursor
    }

    pub fn compositor_mut(&mut self) -> &mut FieldCompositor {
        &mut self.compositor
    }

    pub fn frame_sequence(&self) -> FrameSequence {
        FrameSequence::new(self.frame_count)
    }

    /// Rewinds to frame 0.
    pub fn restart(&mut self) {
        self.cursor = 0;
        self.state = PlaybackState::Idle;
    }

    /// Derived fields of `frame`, independent of the cursor.
    pub fn compute(&mut self, frame: FrameIndex) -> Result<DerivedField, FrameError> {
        self.compositor.compute(frame)
    }

    /// Produces the frame under the cursor and moves the cursor on.
    pub fn advance(&mut self) -> Advance {
        if self.state == PlaybackState::Stopped {
            return Advance::EndOfSequence;
        }
        if self.cursor >= self.frame_count {
            match self.end_behavior {
                EndBehavior::Loop if self.frame_count > 0 => self.cursor = 0,
                _ => {
                    self.state = PlaybackState::Stopped;
                    return Advance::EndOfSequence;
                }
            }
        }

        self.state = PlaybackState::Playing;
        let frame = self.cursor;
        self.cursor += 1;
        match self.compositor.compute(frame) {
            Ok(field) => Advance::Frame(frame, field),
            Err(e) => Advance::Skipped(frame, e),
        }
    }

    /// Plays one pass from the start to the last frame into `sink`, then
    /// leaves the controller idle at frame 0. Frame errors are reported to
    /// the sink and skipped; sink errors end the pass.
    pub fn play<S: RenderSink + ?Sized>(&mut self, sink: &mut S) -> anyhow::Result<PlaybackSummary> {
        self.restart();
        let mut summary = PlaybackSummary::default();
        for frame in self.frame_sequence() {
            self.state = PlaybackState::Playing;
            self.cursor = frame + 1;
            match self.compositor.compute(frame) {
                Ok(field) => {
                    debug!("Frame {} composed ({} empty cells)", frame, field.empty_cells);
                    sink.render_frame(frame, &field)?;
                    summary.rendered += 1;
                }
                Err(e) => {
                    sink.frame_failed(frame, &e);
                    summary.skipped.push(frame);
                }
            }
        }
        sink.finish()?;
        self.restart();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::EmptyCellPolicy;
    use crate::frame_store::FrameStore;
    use crate::params::{GridShape, ParameterSet};

    fn controller(step_count: usize, sample_interval: usize, end: EndBehavior) -> PlaybackController {
        let params = ParameterSet {
            grid_shape: GridShape::Boxes { nboxes: 2 },
            species_count: 2,
            step_count,
            sample_interval,
            target_density: None,
            time_step: None,
        };
        let store = FrameStore::new("/nonexistent/playback/run", params);
        PlaybackController::new(FieldCompositor::new(store, EmptyCellPolicy::Propagate), end)
    }

    #[test]
    fn sequence_covers_saved_frames_and_restarts() {
        let ctl = controller(1000, 100, EndBehavior::Stop);
        let first: Vec<_> = ctl.frame_sequence().collect();
        let second: Vec<_> = ctl.frame_sequence().collect();
        assert_eq!(first, (0..10).collect::<Vec<_>>());
        assert_eq!(first, second);
        assert_eq!(ctl.frame_sequence().len(), 10);
    }

    #[test]
    fn unreadable_frames_are_skipped_and_the_cursor_moves_on() {
        let mut ctl = controller(300, 100, EndBehavior::Stop);
        assert_eq!(ctl.state(), PlaybackState::Idle);
        for expected in 0..3 {
            match ctl.advance() {
                Advance::Skipped(frame, FrameError::Io { .. }) => assert_eq!(frame, expected),
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(ctl.state(), PlaybackState::Playing);
        }
        assert!(matches!(ctl.advance(), Advance::EndOfSequence));
        assert_eq!(ctl.state(), PlaybackState::Stopped);
        assert!(matches!(ctl.advance(), Advance::EndOfSequence));

        ctl.restart();
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert!(matches!(ctl.advance(), Advance::Skipped(0, _)));
    }

    #[test]
    fn loop_wraps_to_the_first_frame() {
        let mut ctl = controller(200, 100, EndBehavior::Loop);
        let frames: Vec<_> = (0..5)
            .map(|_| match ctl.advance() {
                Advance::Skipped(frame, _) | Advance::Frame(frame, _) => frame,
                Advance::EndOfSequence => panic!("looping playback ended"),
            })
            .collect();
        assert_eq!(frames, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn empty_runs_end_immediately_even_when_looping() {
        let mut ctl = controller(50, 100, EndBehavior::Loop);
        assert_eq!(ctl.frame_count(), 0);
        assert!(matches!(ctl.advance(), Advance::EndOfSequence));
    }

    struct Recorder {
        failed: Vec<FrameIndex>,
        finished: bool,
    }

    impl RenderSink for Recorder {
        fn render_frame(&mut self, _: FrameIndex, _: &DerivedField) -> anyhow::Result<()> {
            unreachable!("no frame files exist")
        }

        fn frame_failed(&mut self, frame: FrameIndex, _: &FrameError) {
            self.failed.push(frame);
        }

        fn finish(&mut self) -> anyhow::Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    #[test]
    fn play_reports_every_failure_to_the_sink() {
        let mut ctl = controller(400, 100, EndBehavior::Loop);
        let mut sink = Recorder { failed: Vec::new(), finished: false };
        let summary = ctl.play(&mut sink).unwrap();
        assert_eq!(summary.rendered, 0);
        assert_eq!(summary.skipped, vec![0, 1, 2, 3]);
        assert_eq!(sink.failed, vec![0, 1, 2, 3]);
        assert!(sink.finished);
        assert_eq!(ctl.state(), PlaybackState::Idle);
        assert_eq!(ctl.cursor(), 0);
    }
}
