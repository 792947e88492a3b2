//! The tracker: component registry, aggregate setup, and the cycle loop.

use std::collections::BTreeSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::detector::Detector;
use crate::error::{Result, TrackError};
use crate::optimizer::Optimizer;
use crate::scene::{CameraId, Scene};
use crate::tracker::command::{Command, CommandSource};
use crate::tracker::state::TrackerMode;
use crate::viewer::Viewer;

/// Orchestrator of the tracking pipeline.
///
/// Owns the component arena ([`Scene`]) plus three name-unique registries
/// (viewers, optimizers, detectors), aggregates setup of everything reachable
/// from them, and drives the per-cycle state machine: refresh each distinct
/// camera once, dispatch to the active mode, render, wait, poll for the next
/// command.
pub struct Tracker {
    name: String,
    scene: Scene,
    viewers: Vec<Box<dyn Viewer>>,
    optimizers: Vec<Optimizer>,
    detectors: Vec<Box<dyn Detector>>,
    mode: TrackerMode,
    frame_count: usize,
    cycle_delay: Duration,
    set_up: bool,
}

impl Tracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scene: Scene::new(),
            viewers: Vec::new(),
            optimizers: Vec::new(),
            detectors: Vec::new(),
            mode: TrackerMode::default(),
            frame_count: 0,
            cycle_delay: Duration::from_millis(10),
            set_up: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn mode(&self) -> TrackerMode {
        self.mode
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Wait inserted between cycles.
    pub fn set_cycle_delay(&mut self, delay: Duration) {
        self.cycle_delay = delay;
    }

    pub fn add_viewer(&mut self, viewer: Box<dyn Viewer>) -> Result<()> {
        if self.viewers.iter().any(|v| v.name() == viewer.name()) {
            return Err(TrackError::Configuration(format!(
                "tracker '{}': viewer '{}' already exists",
                self.name,
                viewer.name()
            )));
        }
        self.viewers.push(viewer);
        Ok(())
    }

    pub fn add_optimizer(&mut self, optimizer: Optimizer) -> Result<()> {
        if self.optimizers.iter().any(|o| o.name() == optimizer.name()) {
            return Err(TrackError::Configuration(format!(
                "tracker '{}': optimizer '{}' already exists",
                self.name,
                optimizer.name()
            )));
        }
        self.optimizers.push(optimizer);
        Ok(())
    }

    pub fn add_detector(&mut self, detector: Box<dyn Detector>) -> Result<()> {
        if self.detectors.iter().any(|d| d.name() == detector.name()) {
            return Err(TrackError::Configuration(format!(
                "tracker '{}': detector '{}' already exists",
                self.name,
                detector.name()
            )));
        }
        self.detectors.push(detector);
        Ok(())
    }

    /// Every distinct camera referenced by a registered component. The set
    /// is what guarantees a camera shared by several consumers is refreshed
    /// at most once per cycle.
    fn referenced_cameras(&self) -> BTreeSet<CameraId> {
        let mut cameras = BTreeSet::new();
        for viewer in &self.viewers {
            cameras.insert(viewer.camera());
        }
        for optimizer in &self.optimizers {
            optimizer.referenced_cameras(&mut cameras);
        }
        for detector in &self.detectors {
            if let Some(camera) = detector.camera() {
                cameras.insert(camera);
            }
        }
        cameras
    }

    /// Fail-fast aggregate setup: cameras (each distinct one exactly once),
    /// then bodies, renderer geometries, optimizers, detectors, viewers.
    /// Partial setup state is not rolled back; a failure here is expected to
    /// end the process.
    pub fn set_up(&mut self) -> Result<()> {
        self.set_up = false;
        for id in self.referenced_cameras() {
            self.scene.camera_mut(id).set_up()?;
        }
        for body in self.scene.bodies_mut() {
            body.set_up()?;
        }
        let (geometries, bodies) = self.scene.geometries_and_bodies();
        for geometry in geometries {
            geometry.set_up(bodies)?;
        }
        for optimizer in &mut self.optimizers {
            optimizer.set_up(&self.scene)?;
        }
        for detector in &mut self.detectors {
            detector.set_up(&self.scene)?;
        }
        for viewer in &mut self.viewers {
            viewer.set_up(&self.scene)?;
        }
        self.set_up = true;
        info!(tracker = %self.name, "set up complete");
        Ok(())
    }

    /// Run the tracking loop until a quit command.
    ///
    /// `start_tracking` skips `Waiting` and enters `Tracking` immediately
    /// (unattended execution). `single_pass` runs exactly one detect cycle
    /// followed by exactly one track cycle and stops, regardless of the
    /// command source; the final mode is `Stopped` and the resulting body
    /// poses stay retrievable from the scene.
    pub fn run_tracker_process(
        &mut self,
        start_tracking: bool,
        single_pass: bool,
        commands: &mut dyn CommandSource,
    ) -> Result<()> {
        if !self.set_up {
            return Err(TrackError::SetupOrder(format!("tracker '{}'", self.name)));
        }
        self.frame_count = 0;

        if single_pass {
            self.mode = TrackerMode::Detecting;
            self.execute_cycle()?;
            self.mode = TrackerMode::Tracking;
            self.execute_cycle()?;
            self.mode = TrackerMode::Stopped;
            return Ok(());
        }

        self.mode = if start_tracking {
            TrackerMode::Tracking
        } else {
            TrackerMode::Waiting
        };
        while self.mode != TrackerMode::Quit {
            self.execute_cycle()?;
            if let Some(command) = commands.poll() {
                self.apply_command(command);
            }
        }
        Ok(())
    }

    /// Apply one command at a cycle boundary. Transitions not listed in the
    /// table (e.g. `track` while already tracking, `stop` while waiting) are
    /// ignored.
    fn apply_command(&mut self, command: Command) {
        use TrackerMode::*;
        let next = match (command, self.mode) {
            (_, Quit) => Quit,
            (Command::Detect, _) => Detecting,
            (Command::Track, Detecting | Waiting | Stopped) => Tracking,
            (Command::Stop, Tracking | Detecting) => Stopped,
            (Command::Quit, _) => Quit,
            _ => {
                debug!(?command, mode = ?self.mode, "command ignored in current mode");
                self.mode
            }
        };
        self.mode = next;
    }

    fn execute_cycle(&mut self) -> Result<()> {
        self.update_cameras();
        match self.mode {
            TrackerMode::Detecting => {
                for detector in &mut self.detectors {
                    detector.detect(&mut self.scene)?;
                }
            }
            TrackerMode::Tracking => {
                for optimizer in &mut self.optimizers {
                    optimizer.optimize(&mut self.scene)?;
                }
            }
            TrackerMode::Waiting | TrackerMode::Stopped | TrackerMode::Quit => {}
        }
        for viewer in &mut self.viewers {
            viewer.update_viewer(&self.scene, self.frame_count)?;
        }
        std::thread::sleep(self.cycle_delay);
        self.frame_count += 1;
        Ok(())
    }

    /// Refresh each distinct referenced camera exactly once. A capture
    /// failure is logged and the cycle proceeds with the stale frame buffer;
    /// it does not abort the run.
    fn update_cameras(&mut self) {
        for id in self.referenced_cameras() {
            if let Err(e) = self.scene.camera_mut(id).update_image(true) {
                warn!(
                    camera = self.scene.camera(id).name(),
                    error = %e,
                    "frame refresh failed, continuing with stale buffer"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    use nalgebra::Vector3;

    use crate::body::Body;
    use crate::camera::videocap::test_support::MockDevice;
    use crate::camera::{Intrinsics, VideocapCamera};
    use crate::geometry::SE3;
    use crate::link::{Link, Modality};
    use crate::scene::BodyId;
    use crate::tracker::command::ScriptedCommands;

    fn intrinsics() -> Intrinsics {
        Intrinsics {
            fu: 600.0,
            fv: 600.0,
            ppu: 320.0,
            ppv: 240.0,
            width: 640,
            height: 480,
        }
    }

    fn mock_camera() -> (VideocapCamera, Rc<Cell<usize>>) {
        let mock = MockDevice::new(640, 480);
        let reads = mock.reads.clone();
        let mut camera = VideocapCamera::new("color_camera", intrinsics(), 0, 0);
        camera.set_device(Box::new(mock));
        (camera, reads)
    }

    struct ProbeViewer {
        name: String,
        camera: CameraId,
        renders: Rc<Cell<usize>>,
    }

    impl Viewer for ProbeViewer {
        fn name(&self) -> &str {
            &self.name
        }

        fn camera(&self) -> CameraId {
            self.camera
        }

        fn set_up(&mut self, _scene: &Scene) -> Result<()> {
            Ok(())
        }

        fn update_viewer(&mut self, scene: &Scene, _frame_index: usize) -> Result<()> {
            // every consumer must observe this cycle's frame
            scene.camera(self.camera).image()?;
            self.renders.set(self.renders.get() + 1);
            Ok(())
        }
    }

    struct ProbeDetector {
        name: String,
        body: BodyId,
        pose: SE3,
        detections: Rc<Cell<usize>>,
    }

    impl Detector for ProbeDetector {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_up(&mut self, _scene: &Scene) -> Result<()> {
            Ok(())
        }

        fn detect(&mut self, scene: &mut Scene) -> Result<()> {
            scene.body_mut(self.body).set_body2world_pose(self.pose);
            self.detections.set(self.detections.get() + 1);
            Ok(())
        }
    }

    struct ProbeModality {
        name: String,
        camera: CameraId,
        pose: SE3,
        updates: Rc<Cell<usize>>,
    }

    impl Modality for ProbeModality {
        fn name(&self) -> &str {
            &self.name
        }

        fn camera(&self) -> Option<CameraId> {
            Some(self.camera)
        }

        fn set_up(&mut self, _scene: &Scene) -> Result<()> {
            Ok(())
        }

        fn compute_pose_update(&mut self, _scene: &Scene) -> Result<Option<SE3>> {
            self.updates.set(self.updates.get() + 1);
            Ok(Some(self.pose))
        }
    }

    fn tracked_pose() -> SE3 {
        SE3::from_quaternion(1.0, 0.0, 0.0, 0.0, Vector3::new(0.0, 0.0, 0.8))
    }

    fn detected_pose() -> SE3 {
        SE3::from_quaternion(1.0, 0.0, 0.0, 0.0, Vector3::new(0.1, 0.0, 0.5))
    }

    struct Fixture {
        tracker: Tracker,
        body: BodyId,
        reads: Rc<Cell<usize>>,
        renders: Rc<Cell<usize>>,
        detections: Rc<Cell<usize>>,
        updates: Rc<Cell<usize>>,
        _dir: tempfile::TempDir,
    }

    /// Full pipeline: one camera shared by two viewers and one modality,
    /// one body, one detector, one optimizer.
    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("box.obj"), "o box\n").unwrap();

        let mut tracker = Tracker::new("tracker");
        tracker.set_cycle_delay(Duration::ZERO);

        let (camera, reads) = mock_camera();
        let camera = tracker.scene_mut().add_camera(camera);
        let body = tracker
            .scene_mut()
            .add_body(Body::new("box", dir.path().join("box.obj")));

        let renders = Rc::new(Cell::new(0));
        for name in ["viewer_a", "viewer_b"] {
            tracker
                .add_viewer(Box::new(ProbeViewer {
                    name: name.to_string(),
                    camera,
                    renders: renders.clone(),
                }))
                .unwrap();
        }

        let detections = Rc::new(Cell::new(0));
        tracker
            .add_detector(Box::new(ProbeDetector {
                name: "detector".to_string(),
                body,
                pose: detected_pose(),
                detections: detections.clone(),
            }))
            .unwrap();

        let updates = Rc::new(Cell::new(0));
        let mut link = Link::new("link", body);
        link.add_modality(Box::new(ProbeModality {
            name: "modality".to_string(),
            camera,
            pose: tracked_pose(),
            updates: updates.clone(),
        }))
        .unwrap();
        tracker.add_optimizer(Optimizer::new("optimizer", link)).unwrap();

        Fixture {
            tracker,
            body,
            reads,
            renders,
            detections,
            updates,
            _dir: dir,
        }
    }

    #[test]
    fn duplicate_names_are_rejected_per_collection() {
        let mut f = fixture();
        let camera = f.tracker.viewers[0].camera();
        let duplicate = ProbeViewer {
            name: "viewer_a".to_string(),
            camera,
            renders: Rc::new(Cell::new(0)),
        };
        assert!(matches!(
            f.tracker.add_viewer(Box::new(duplicate)).unwrap_err(),
            TrackError::Configuration(_)
        ));

        // same name in a different collection is fine
        let detector = ProbeDetector {
            name: "viewer_a".to_string(),
            body: f.body,
            pose: detected_pose(),
            detections: Rc::new(Cell::new(0)),
        };
        f.tracker.add_detector(Box::new(detector)).unwrap();
    }

    #[test]
    fn run_before_set_up_is_a_setup_order_error() {
        let mut f = fixture();
        let mut commands = ScriptedCommands::new([]);
        assert!(matches!(
            f.tracker
                .run_tracker_process(false, false, &mut commands)
                .unwrap_err(),
            TrackError::SetupOrder(_)
        ));
    }

    #[test]
    fn set_up_refreshes_each_distinct_camera_exactly_once() {
        let mut f = fixture();
        f.tracker.set_up().unwrap();
        // three consumers (two viewers + one modality) share one camera:
        // a single device open and a single validating read
        assert_eq!(f.reads.get(), 1);
    }

    #[test]
    fn shared_camera_is_captured_once_per_cycle() {
        let mut f = fixture();
        f.tracker.set_up().unwrap();
        let reads_after_setup = f.reads.get();
        let mut commands = ScriptedCommands::new([None, None, Some(Command::Quit)]);
        f.tracker
            .run_tracker_process(false, false, &mut commands)
            .unwrap();
        assert_eq!(f.tracker.frame_count(), 3);
        assert_eq!(f.reads.get() - reads_after_setup, 3);
        // both viewers rendered every cycle
        assert_eq!(f.renders.get(), 6);
    }

    #[test]
    fn single_pass_runs_one_detect_then_one_track_cycle() {
        let mut f = fixture();
        f.tracker.set_up().unwrap();
        let mut commands = ScriptedCommands::new([]);
        f.tracker
            .run_tracker_process(true, true, &mut commands)
            .unwrap();
        assert_eq!(f.detections.get(), 1);
        assert_eq!(f.updates.get(), 1);
        assert_eq!(f.tracker.mode(), TrackerMode::Stopped);
        // the final pose is the optimizer's result and stays retrievable
        let pose = f.tracker.scene().body(f.body).body2world_pose();
        assert!((pose.translation - tracked_pose().translation).norm() < 1e-12);
    }

    #[test]
    fn scripted_commands_drive_the_mode_table() {
        let mut f = fixture();
        f.tracker.set_up().unwrap();
        let mut commands = ScriptedCommands::new([
            Some(Command::Detect),
            Some(Command::Track),
            Some(Command::Stop),
            Some(Command::Quit),
        ]);
        f.tracker
            .run_tracker_process(false, false, &mut commands)
            .unwrap();
        assert_eq!(f.tracker.mode(), TrackerMode::Quit);
        // cycle 1: waiting, cycle 2: detecting, cycle 3: tracking,
        // cycle 4: stopped (cameras and viewers still active)
        assert_eq!(f.tracker.frame_count(), 4);
        assert_eq!(f.detections.get(), 1);
        assert_eq!(f.updates.get(), 1);
        assert_eq!(f.renders.get(), 8);
    }

    #[test]
    fn invalid_transitions_are_ignored() {
        let mut f = fixture();
        f.tracker.set_up().unwrap();
        f.tracker.mode = TrackerMode::Waiting;
        f.tracker.apply_command(Command::Stop);
        assert_eq!(f.tracker.mode(), TrackerMode::Waiting);
        f.tracker.mode = TrackerMode::Tracking;
        f.tracker.apply_command(Command::Track);
        assert_eq!(f.tracker.mode(), TrackerMode::Tracking);
        f.tracker.apply_command(Command::Detect);
        assert_eq!(f.tracker.mode(), TrackerMode::Detecting);
    }

    #[test]
    fn set_up_failure_propagates_and_leaves_tracker_not_ready() {
        let mut tracker = Tracker::new("tracker");
        let mut mock = MockDevice::new(640, 480);
        mock.fail_open = true;
        let mut camera = VideocapCamera::new("cam", intrinsics(), 0, 0);
        camera.set_device(Box::new(mock));
        let camera = tracker.scene_mut().add_camera(camera);
        tracker
            .add_viewer(Box::new(ProbeViewer {
                name: "viewer".to_string(),
                camera,
                renders: Rc::new(Cell::new(0)),
            }))
            .unwrap();

        assert!(matches!(
            tracker.set_up().unwrap_err(),
            TrackError::Device(_)
        ));
        let mut commands = ScriptedCommands::new([]);
        assert!(matches!(
            tracker
                .run_tracker_process(false, false, &mut commands)
                .unwrap_err(),
            TrackError::SetupOrder(_)
        ));
    }

    #[test]
    fn capture_failure_during_run_keeps_the_cycle_going() {
        let mut tracker = Tracker::new("tracker");
        tracker.set_cycle_delay(Duration::ZERO);
        let mut mock = MockDevice::new(640, 480);
        mock.empty_after = Some(1); // only the validating read succeeds
        let mut camera = VideocapCamera::new("cam", intrinsics(), 0, 0);
        camera.set_device(Box::new(mock));
        camera.set_empty_frame_policy(crate::camera::EmptyFramePolicy::Fail);
        let camera = tracker.scene_mut().add_camera(camera);
        let renders = Rc::new(Cell::new(0));
        tracker
            .add_viewer(Box::new(ProbeViewer {
                name: "viewer".to_string(),
                camera,
                renders: renders.clone(),
            }))
            .unwrap();

        tracker.set_up().unwrap();
        let mut commands = ScriptedCommands::new([None, Some(Command::Quit)]);
        tracker
            .run_tracker_process(false, false, &mut commands)
            .unwrap();
        // refresh failed every cycle, but viewers still saw the stale buffer
        assert_eq!(renders.get(), 2);
    }
}
