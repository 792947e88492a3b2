//! Example drivers for the tracking runtime.
//!
//! Two invocation forms:
//!
//! * `rigidtrack <camera.yaml> <body.yaml> <detector.yaml> <temp_dir>` —
//!   live run on a capture device, driven interactively from stdin.
//! * `rigidtrack <base_dir>` — deterministic single-pass run on a recorded
//!   sequence; the base directory holds `color_camera.yaml`, `body.yaml`,
//!   and `detector.yaml`, and receives the final pose as `pose_out.txt`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use rigidtrack::body::Body;
use rigidtrack::camera::{LoaderCamera, VideocapCamera};
use rigidtrack::detector::StaticDetector;
use rigidtrack::link::Link;
use rigidtrack::metafile;
use rigidtrack::optimizer::Optimizer;
use rigidtrack::renderer_geometry::RendererGeometry;
use rigidtrack::tracker::{Command, ScriptedCommands, StdinCommands, Tracker};
use rigidtrack::viewer::ColorViewer;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.len() {
        1 => run_on_recorded_sequence(Path::new(&args[0])),
        4 => run_on_color_camera(
            Path::new(&args[0]),
            Path::new(&args[1]),
            Path::new(&args[2]),
            Path::new(&args[3]),
        ),
        _ => bail!(
            "usage: rigidtrack <camera.yaml> <body.yaml> <detector.yaml> <temp_dir>\n\
             or:    rigidtrack <base_dir>"
        ),
    }
}

/// Interactive run on a live camera.
fn run_on_color_camera(
    camera_metafile: &Path,
    body_metafile: &Path,
    detector_metafile: &Path,
    temp_directory: &Path,
) -> Result<()> {
    let mut tracker = Tracker::new("tracker");

    let camera = tracker
        .scene_mut()
        .add_camera(VideocapCamera::from_metafile("color_camera", camera_metafile));
    let body = tracker
        .scene_mut()
        .add_body(Body::from_metafile("body", body_metafile));

    let mut renderer_geometry = RendererGeometry::new("renderer_geometry");
    renderer_geometry.add_body(body)?;
    let renderer_geometry = tracker.scene_mut().add_renderer_geometry(renderer_geometry);

    let mut viewer = ColorViewer::new("viewer", camera, renderer_geometry);
    viewer.start_saving_images(temp_directory);
    tracker.add_viewer(Box::new(viewer))?;

    // Pose-refinement modalities are external; the link starts bare and the
    // optimizer carries the detector-initialized pose through each cycle.
    let link = Link::new("link", body);
    tracker.add_optimizer(Optimizer::new("optimizer", link))?;
    tracker.add_detector(Box::new(StaticDetector::from_metafile(
        "detector",
        detector_metafile,
        body,
    )))?;

    tracker.set_up().context("tracker setup failed")?;
    println!("Wait for key: ({})", Command::HELP);
    let mut commands = StdinCommands::spawn();
    tracker
        .run_tracker_process(true, false, &mut commands)
        .context("tracker process failed")?;
    Ok(())
}

/// Deterministic single-pass run on a recorded sequence.
fn run_on_recorded_sequence(base_directory: &Path) -> Result<()> {
    let camera_metafile = base_directory.join("color_camera.yaml");
    let body_metafile = base_directory.join("body.yaml");
    let detector_metafile = base_directory.join("detector.yaml");
    for path in [&camera_metafile, &body_metafile, &detector_metafile] {
        if !path.is_file() {
            bail!("missing configuration file {}", path.display());
        }
    }

    let mut tracker = Tracker::new("tracker");

    let camera = tracker
        .scene_mut()
        .add_camera(LoaderCamera::from_metafile("color_camera", &camera_metafile));
    let body = tracker
        .scene_mut()
        .add_body(Body::from_metafile("body", &body_metafile));

    let mut renderer_geometry = RendererGeometry::new("renderer_geometry");
    renderer_geometry.add_body(body)?;
    let renderer_geometry = tracker.scene_mut().add_renderer_geometry(renderer_geometry);

    let mut viewer = ColorViewer::new("viewer", camera, renderer_geometry);
    viewer.start_saving_images(base_directory);
    tracker.add_viewer(Box::new(viewer))?;

    let link = Link::new("link", body);
    tracker.add_optimizer(Optimizer::new("optimizer", link))?;
    tracker.add_detector(Box::new(StaticDetector::from_metafile(
        "detector",
        &detector_metafile,
        body,
    )))?;

    tracker.set_up().context("tracker setup failed")?;
    let mut commands = ScriptedCommands::new([]);
    tracker
        .run_tracker_process(true, true, &mut commands)
        .context("tracker process failed")?;

    let pose = *tracker.scene().body(body).body2world_pose();
    let pose_path = base_directory.join("pose_out.txt");
    metafile::write_pose_txt(&pose_path, "PoseOut", &pose)?;
    info!(path = %pose_path.display(), "output pose saved");
    Ok(())
}
