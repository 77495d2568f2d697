use replay_common::{
    Advance, DerivedField, EmptyCellPolicy, EndBehavior, FieldCompositor, FrameError, FrameIndex,
    FrameStore, Grid, ParameterSet, PlaybackController, RenderSink, Species,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

fn run_dir(tag: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "lattice_replay_{}_{}_{}",
        tag,
        std::process::id(),
        timestamp
    ));
    fs::create_dir_all(&dir).expect("create run dir");
    dir
}

fn write_grid(dir: &Path, step: usize, suffix: &str, grid: &Grid) {
    let path = dir.join(format!("frame{}.density{}.dat", step, suffix));
    fs::write(path, grid.to_le_bytes()).expect("write frame");
}

#[derive(Default)]
struct Collect {
    frames: Vec<(FrameIndex, DerivedField)>,
    failures: Vec<FrameIndex>,
}

impl RenderSink for Collect {
    fn render_frame(&mut self, frame: FrameIndex, field: &DerivedField) -> anyhow::Result<()> {
        self.frames.push((frame, field.clone()));
        Ok(())
    }

    fn frame_failed(&mut self, frame: FrameIndex, _: &FrameError) {
        self.failures.push(frame);
    }
}

#[test]
fn single_frame_run_renders_once() {
    let dir = run_dir("single");
    fs::write(
        dir.join("parameters"),
        "  L = [2, 3]\n  dens = [1, 1]\n  ntypes = 2\n  nsteps = 10\n  ninfo = 10\n",
    )
    .expect("write parameters");
    write_grid(&dir, 0, ".0", &Grid::from_vec(2, 3, vec![1, 2, 3, 4, 5, 6]).unwrap());
    write_grid(&dir, 0, ".1", &Grid::from_vec(2, 3, vec![1, 0, 1, 0, 1, 0]).unwrap());

    let params = ParameterSet::load(&dir).expect("parameters");
    let store = FrameStore::new(&dir, params);
    let mut ctl = PlaybackController::new(
        FieldCompositor::new(store, EmptyCellPolicy::Propagate),
        EndBehavior::Stop,
    );

    let mut sink = Collect::default();
    let summary = ctl.play(&mut sink).expect("play");
    assert_eq!(summary.rendered, 1);
    assert!(summary.skipped.is_empty());
    assert!(sink.failures.is_empty());

    let (frame, field) = &sink.frames[0];
    assert_eq!(*frame, 0);
    assert_eq!(field.dims(), (2, 3));
    assert_eq!(field.total_density.as_slice(), &[2, 2, 4, 4, 6, 6]);
    assert!(field.order_parameter.as_slice().iter().all(|v| v.is_finite()));
    assert_eq!(field.order_parameter.get(0, 0), Some(0.0));
    assert_eq!(field.order_parameter.get(0, 1), Some(1.0));
    assert_eq!(field.empty_cells, 0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bad_frames_are_skipped_and_playback_continues() {
    let dir = run_dir("skip");
    fs::write(dir.join("parameters"), " nboxes = 2\n ntypes = 2\n nsteps = 300\n ninfo = 100\n")
        .expect("write parameters");
    let ones = Grid::from_vec(2, 2, vec![1; 4]).unwrap();
    // frame 0: fine
    write_grid(&dir, 0, ".0", &ones);
    write_grid(&dir, 0, ".1", &ones);
    // frame 1: truncated species 1
    write_grid(&dir, 100, ".0", &ones);
    fs::write(dir.join("frame100.density.1.dat"), [0u8; 6]).expect("write frame");
    // frame 2: wrong lattice size
    write_grid(&dir, 200, ".0", &Grid::from_vec(1, 3, vec![1; 3]).unwrap());
    write_grid(&dir, 200, ".1", &ones);

    let params = ParameterSet::load(&dir).expect("parameters");
    let mut ctl = PlaybackController::new(
        FieldCompositor::new(FrameStore::new(&dir, params), EmptyCellPolicy::Propagate),
        EndBehavior::Stop,
    );

    assert!(matches!(ctl.advance(), Advance::Frame(0, _)));
    assert!(matches!(ctl.advance(), Advance::Skipped(1, FrameError::Corrupt { len: 6, .. })));
    assert!(matches!(
        ctl.advance(),
        Advance::Skipped(2, FrameError::ShapeMismatch { expected: 4, found: 3, .. })
    ));
    assert!(matches!(ctl.advance(), Advance::EndOfSequence));

    let mut sink = Collect::default();
    let summary = ctl.play(&mut sink).expect("play");
    assert_eq!(summary.rendered, 1);
    assert_eq!(summary.skipped, vec![1, 2]);
    assert_eq!(sink.failures, vec![1, 2]);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn overflowing_totals_skip_the_frame() {
    let dir = run_dir("overflow");
    fs::write(dir.join("parameters"), " nboxes = 1\n ntypes = 2\n nsteps = 2\n ninfo = 1\n")
        .expect("write parameters");
    write_grid(&dir, 0, ".0", &Grid::from_vec(1, 1, vec![i32::MAX]).unwrap());
    write_grid(&dir, 0, ".1", &Grid::from_vec(1, 1, vec![1]).unwrap());
    write_grid(&dir, 1, ".0", &Grid::from_vec(1, 1, vec![3]).unwrap());
    write_grid(&dir, 1, ".1", &Grid::from_vec(1, 1, vec![1]).unwrap());

    let params = ParameterSet::load(&dir).expect("parameters");
    let mut ctl = PlaybackController::new(
        FieldCompositor::new(FrameStore::new(&dir, params), EmptyCellPolicy::Propagate),
        EndBehavior::Stop,
    );

    assert!(matches!(
        ctl.advance(),
        Advance::Skipped(0, FrameError::DensityOverflow { frame: 0, row: 0, col: 0 })
    ));
    match ctl.advance() {
        Advance::Frame(1, field) => assert_eq!(field.order_parameter.as_slice(), &[0.5]),
        other => panic!("expected frame 1, got {:?}", other),
    }
    assert!(matches!(ctl.advance(), Advance::EndOfSequence));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn combined_density_file_cross_checks_totals() {
    let dir = run_dir("combined");
    fs::write(dir.join("parameters"), " L = (1, 2)\n ntypes = 3\n nsteps = 5\n ninfo = 5\n")
        .expect("write parameters");
    write_grid(&dir, 0, ".0", &Grid::from_vec(1, 2, vec![2, 0]).unwrap());
    write_grid(&dir, 0, ".1", &Grid::from_vec(1, 2, vec![0, 0]).unwrap());
    write_grid(&dir, 0, ".2", &Grid::from_vec(1, 2, vec![0, 0]).unwrap());
    write_grid(&dir, 0, "", &Grid::from_vec(1, 2, vec![2, 1]).unwrap());

    let params = ParameterSet::load(&dir).expect("parameters");
    let mut compositor = FieldCompositor::new(FrameStore::new(&dir, params), EmptyCellPolicy::Propagate);
    let field = compositor.compute(0).expect("frame 0");
    assert_eq!(field.order_parameter.get(0, 0), Some(0.0));
    assert!(field.order_parameter.get(0, 1).unwrap().is_nan());
    assert_eq!(field.empty_cells, 1);
    assert_eq!(compositor.verify_total(0, &field).expect("combined"), 1);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn cached_grids_survive_file_removal() {
    let dir = run_dir("cache");
    fs::write(dir.join("parameters"), " nboxes = 1\n ntypes = 2\n nsteps = 1\n ninfo = 1\n")
        .expect("write parameters");
    write_grid(&dir, 0, ".0", &Grid::from_vec(1, 1, vec![7]).unwrap());

    let params = ParameterSet::load(&dir).expect("parameters");
    let mut store = FrameStore::with_cache(&dir, params);
    let first = store.read_grid(0, Species::Index(0)).expect("first read");
    assert_eq!(store.cached_len(), 1);

    fs::remove_file(dir.join("frame0.density.0.dat")).expect("remove");
    let second = store.read_grid(0, Species::Index(0)).expect("cached read");
    assert_eq!(first, second);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_parameter_file_is_an_io_error() {
    let dir = run_dir("noparams");
    let err = ParameterSet::load(&dir).unwrap_err();
    assert!(matches!(err, replay_common::ParameterError::Io { .. }));
    let _ = fs::remove_dir_all(&dir);
}
