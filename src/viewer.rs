//! Viewers combine a camera's current frame with the projected model state.
//!
//! On-screen display is outside this crate; [`ColorViewer`] materializes the
//! overlay only when image saving is enabled, which is how offline runs
//! produce per-cycle diagnostics.

use std::path::PathBuf;

use image::{Rgb, RgbImage};

use crate::error::{Result, TrackError};
use crate::scene::{CameraId, RendererGeometryId, Scene};

pub trait Viewer {
    fn name(&self) -> &str;

    /// Camera whose frame this viewer renders.
    fn camera(&self) -> CameraId;

    fn set_up(&mut self, scene: &Scene) -> Result<()>;

    /// Render one cycle's frame.
    fn update_viewer(&mut self, scene: &Scene, frame_index: usize) -> Result<()>;
}

/// Viewer that overlays the projected origin of each tracked body on the
/// camera frame and optionally writes the result to disk.
pub struct ColorViewer {
    name: String,
    camera: CameraId,
    renderer_geometry: RendererGeometryId,
    save_directory: Option<PathBuf>,
    set_up: bool,
}

impl ColorViewer {
    pub fn new(
        name: impl Into<String>,
        camera: CameraId,
        renderer_geometry: RendererGeometryId,
    ) -> Self {
        Self {
            name: name.into(),
            camera,
            renderer_geometry,
            save_directory: None,
            set_up: false,
        }
    }

    /// Save every rendered frame into `directory`.
    pub fn start_saving_images(&mut self, directory: impl Into<PathBuf>) {
        self.save_directory = Some(directory.into());
    }

    fn render_overlay(&self, scene: &Scene) -> Result<RgbImage> {
        let camera = scene.camera(self.camera);
        let mut canvas = camera.image()?.clone();
        let intrinsics = camera.intrinsics().ok_or_else(|| {
            TrackError::SetupOrder(format!("camera '{}'", camera.name()))
        })?;
        let world2camera = camera.world2camera_pose();

        for body_id in scene.renderer_geometry(self.renderer_geometry).bodies() {
            let body = scene.body(*body_id);
            let origin_cam = world2camera.transform_point(&body.body2world_pose().translation);
            if let Some((u, v)) = intrinsics.project(&origin_cam) {
                draw_crosshair(&mut canvas, u, v);
            }
        }
        Ok(canvas)
    }
}

impl Viewer for ColorViewer {
    fn name(&self) -> &str {
        &self.name
    }

    fn camera(&self) -> CameraId {
        self.camera
    }

    fn set_up(&mut self, scene: &Scene) -> Result<()> {
        self.set_up = false;
        let camera = scene.camera(self.camera);
        if !camera.is_set_up() {
            return Err(TrackError::SetupOrder(format!(
                "camera '{}'",
                camera.name()
            )));
        }
        if !scene.renderer_geometry(self.renderer_geometry).is_set_up() {
            return Err(TrackError::SetupOrder(format!(
                "renderer geometry used by viewer '{}'",
                self.name
            )));
        }
        self.set_up = true;
        Ok(())
    }

    fn update_viewer(&mut self, scene: &Scene, frame_index: usize) -> Result<()> {
        if !self.set_up {
            return Err(TrackError::SetupOrder(format!("viewer '{}'", self.name)));
        }
        let Some(directory) = self.save_directory.clone() else {
            // Headless: the frame was refreshed this cycle, nothing to emit.
            return Ok(());
        };
        let canvas = self.render_overlay(scene)?;
        std::fs::create_dir_all(&directory).map_err(|e| {
            TrackError::Configuration(format!("could not create {}: {e}", directory.display()))
        })?;
        let path = directory.join(format!("{}_{}.png", self.name, frame_index));
        canvas
            .save(&path)
            .map_err(|e| TrackError::Capture(format!("could not save {}: {e}", path.display())))
    }
}

fn draw_crosshair(canvas: &mut RgbImage, u: f64, v: f64) {
    const ARM: i64 = 4;
    const COLOR: Rgb<u8> = Rgb([255, 0, 0]);
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    let (cu, cv) = (u.round() as i64, v.round() as i64);
    for d in -ARM..=ARM {
        if (0..w).contains(&(cu + d)) && (0..h).contains(&cv) {
            canvas.put_pixel((cu + d) as u32, cv as u32, COLOR);
        }
        if (0..w).contains(&cu) && (0..h).contains(&(cv + d)) {
            canvas.put_pixel(cu as u32, (cv + d) as u32, COLOR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;
    use crate::camera::videocap::test_support::MockDevice;
    use crate::camera::{Intrinsics, VideocapCamera};
    use crate::renderer_geometry::RendererGeometry;

    fn scene_with_camera_and_body() -> (
        Scene,
        CameraId,
        crate::scene::BodyId,
        RendererGeometryId,
        tempfile::TempDir,
    ) {
        let mut scene = Scene::new();
        let mut camera = VideocapCamera::new(
            "cam",
            Intrinsics {
                fu: 50.0,
                fv: 50.0,
                ppu: 32.0,
                ppv: 24.0,
                width: 64,
                height: 48,
            },
            0,
            0,
        );
        camera.set_device(Box::new(MockDevice::new(64, 48)));
        let camera = scene.add_camera(camera);
        scene.camera_mut(camera).set_up().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let geometry = dir.path().join("box.obj");
        std::fs::write(&geometry, "o box\n").unwrap();
        let body = scene.add_body(Body::new("box", geometry));
        scene.body_mut(body).set_up().unwrap();

        let mut rg = RendererGeometry::new("renderer_geometry");
        rg.add_body(body).unwrap();
        let rg = scene.add_renderer_geometry(rg);
        let (geometries, bodies) = scene.geometries_and_bodies();
        geometries[0].set_up(bodies).unwrap();
        (scene, camera, body, rg, dir)
    }

    #[test]
    fn saves_overlay_frames_when_enabled() {
        let (mut scene, camera, body, rg, _fixtures) = scene_with_camera_and_body();
        // place the body in front of the camera so the marker projects
        scene
            .body_mut(body)
            .set_body2world_pose(crate::geometry::SE3::from_quaternion(
                1.0,
                0.0,
                0.0,
                0.0,
                nalgebra::Vector3::new(0.0, 0.0, 1.0),
            ));

        let out = tempfile::tempdir().unwrap();
        let mut viewer = ColorViewer::new("viewer", camera, rg);
        viewer.start_saving_images(out.path());
        viewer.set_up(&scene).unwrap();
        viewer.update_viewer(&scene, 3).unwrap();

        let saved = image::open(out.path().join("viewer_3.png")).unwrap().to_rgb8();
        // crosshair center lands on the principal point
        assert_eq!(*saved.get_pixel(32, 24), Rgb([255, 0, 0]));
    }

    #[test]
    fn update_before_set_up_is_a_setup_order_error() {
        let (scene, camera, _body, rg, _fixtures) = scene_with_camera_and_body();
        let mut viewer = ColorViewer::new("viewer", camera, rg);
        assert!(matches!(
            viewer.update_viewer(&scene, 0).unwrap_err(),
            TrackError::SetupOrder(_)
        ));
    }
}
