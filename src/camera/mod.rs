//! Camera abstraction: the sensor contract of the tracking runtime.
//!
//! A camera is a capability-typed source of intrinsics and periodic frames
//! with its own setup/teardown and optional persisted configuration. The
//! concrete backends form a closed set: [`VideocapCamera`] captures from a
//! live device, [`LoaderCamera`] replays an image sequence from disk. Both
//! share their common state through [`CameraBase`] and are selected at
//! configuration-load time via the [`Camera`] union.

pub mod device;
pub mod loader;
pub mod videocap;

use std::path::{Path, PathBuf};

use image::RgbImage;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geometry::SE3;

pub use loader::LoaderCamera;
pub use videocap::{EmptyFramePolicy, VideocapCamera};

/// Pinhole calibration parameters mapping 3D camera-space points to pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// Focal length in x direction, in pixels.
    pub fu: f64,
    /// Focal length in y direction, in pixels.
    pub fv: f64,
    /// Principal point x coordinate, in pixels.
    pub ppu: f64,
    /// Principal point y coordinate, in pixels.
    pub ppv: f64,
    pub width: u32,
    pub height: u32,
}

impl Intrinsics {
    /// Project a camera-space point to pixel coordinates. Returns `None` for
    /// points at or behind the image plane.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<(f64, f64)> {
        if p_cam.z <= 0.0 {
            return None;
        }
        Some((
            self.fu * p_cam.x / p_cam.z + self.ppu,
            self.fv * p_cam.y / p_cam.z + self.ppv,
        ))
    }
}

/// Encoding used when persisting captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFileType {
    #[default]
    Png,
    Jpg,
    Bmp,
}

impl ImageFileType {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFileType::Png => "png",
            ImageFileType::Jpg => "jpg",
            ImageFileType::Bmp => "bmp",
        }
    }
}

/// State shared by every camera backend: identity, calibration, the extrinsic
/// pose pair, the current frame buffer, and the persistence configuration.
///
/// The pose pair maintains the invariant that `world2camera_pose` is always
/// the inverse of `camera2world_pose`; it is recomputed on every assignment.
#[derive(Debug)]
pub struct CameraBase {
    name: String,
    metafile_path: Option<PathBuf>,
    intrinsics: Option<Intrinsics>,
    camera2world_pose: SE3,
    world2camera_pose: SE3,
    image: Option<RgbImage>,
    set_up: bool,
    save_images: bool,
    save_directory: Option<PathBuf>,
    save_index: usize,
    save_image_type: ImageFileType,
}

impl CameraBase {
    pub(crate) fn new(name: impl Into<String>, metafile_path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            metafile_path,
            intrinsics: None,
            camera2world_pose: SE3::identity(),
            world2camera_pose: SE3::identity(),
            image: None,
            set_up: false,
            save_images: false,
            save_directory: None,
            save_index: 0,
            save_image_type: ImageFileType::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metafile_path(&self) -> Option<&Path> {
        self.metafile_path.as_deref()
    }

    pub fn intrinsics(&self) -> Option<&Intrinsics> {
        self.intrinsics.as_ref()
    }

    pub(crate) fn set_intrinsics(&mut self, intrinsics: Intrinsics) {
        self.intrinsics = Some(intrinsics);
    }

    pub fn camera2world_pose(&self) -> &SE3 {
        &self.camera2world_pose
    }

    pub fn world2camera_pose(&self) -> &SE3 {
        &self.world2camera_pose
    }

    /// Assign the extrinsic pose, recomputing its inverse.
    pub fn set_camera2world_pose(&mut self, pose: SE3) {
        self.camera2world_pose = pose;
        self.world2camera_pose = pose.inverse();
    }

    /// The most recently captured frame. Undefined (an error) before the
    /// first successful refresh.
    pub fn image(&self) -> Result<&RgbImage> {
        self.image
            .as_ref()
            .ok_or_else(|| TrackError::SetupOrder(format!("camera '{}'", self.name)))
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    pub(crate) fn mark_set_up(&mut self) {
        self.set_up = true;
    }

    pub(crate) fn clear_set_up(&mut self) {
        self.set_up = false;
    }

    pub fn save_images(&self) -> bool {
        self.save_images
    }

    pub fn save_directory(&self) -> Option<&Path> {
        self.save_directory.as_deref()
    }

    pub fn save_index(&self) -> usize {
        self.save_index
    }

    pub fn save_image_type(&self) -> ImageFileType {
        self.save_image_type
    }

    pub(crate) fn set_save_config(
        &mut self,
        save_images: bool,
        save_directory: Option<PathBuf>,
        save_index: usize,
        save_image_type: ImageFileType,
    ) -> Result<()> {
        if save_images && save_directory.is_none() {
            return Err(TrackError::Configuration(format!(
                "camera '{}': save_images enabled without save_directory",
                self.name
            )));
        }
        self.save_images = save_images;
        self.save_directory = save_directory;
        self.save_index = save_index;
        self.save_image_type = save_image_type;
        Ok(())
    }

    /// Store a captured frame and persist it when image saving is enabled.
    pub(crate) fn store_image(&mut self, image: RgbImage) -> Result<()> {
        if self.save_images {
            // Presence of save_directory was validated in set_save_config.
            let dir = self.save_directory.clone().unwrap_or_default();
            std::fs::create_dir_all(&dir).map_err(|e| {
                TrackError::Configuration(format!("could not create {}: {e}", dir.display()))
            })?;
            let path = dir.join(format!(
                "{}_image_{}.{}",
                self.name,
                self.save_index,
                self.save_image_type.extension()
            ));
            image.save(&path).map_err(|e| {
                TrackError::Capture(format!("could not save {}: {e}", path.display()))
            })?;
            self.save_index += 1;
        }
        self.image = Some(image);
        Ok(())
    }
}

/// The closed set of camera backends. New variants are added here rather than
/// through open-ended trait objects, so every consumer can rely on a fixed,
/// documented set of behaviors.
#[derive(Debug)]
pub enum Camera {
    Videocap(VideocapCamera),
    Loader(LoaderCamera),
}

impl Camera {
    fn base(&self) -> &CameraBase {
        match self {
            Camera::Videocap(c) => c.base(),
            Camera::Loader(c) => c.base(),
        }
    }

    pub fn name(&self) -> &str {
        self.base().name()
    }

    pub fn intrinsics(&self) -> Option<&Intrinsics> {
        self.base().intrinsics()
    }

    pub fn camera2world_pose(&self) -> &SE3 {
        self.base().camera2world_pose()
    }

    pub fn world2camera_pose(&self) -> &SE3 {
        self.base().world2camera_pose()
    }

    pub fn set_camera2world_pose(&mut self, pose: SE3) {
        match self {
            Camera::Videocap(c) => c.set_camera2world_pose(pose),
            Camera::Loader(c) => c.set_camera2world_pose(pose),
        }
    }

    pub fn image(&self) -> Result<&RgbImage> {
        self.base().image()
    }

    pub fn is_set_up(&self) -> bool {
        self.base().is_set_up()
    }

    pub fn set_up(&mut self) -> Result<()> {
        match self {
            Camera::Videocap(c) => c.set_up(),
            Camera::Loader(c) => c.set_up(),
        }
    }

    /// Capture one frame into the frame buffer. `synchronized` is a hint for
    /// backends capable of hardware-level multi-sensor synchronization;
    /// backends that cannot honor it accept and ignore it.
    pub fn update_image(&mut self, synchronized: bool) -> Result<()> {
        match self {
            Camera::Videocap(c) => c.update_image(synchronized),
            Camera::Loader(c) => c.update_image(synchronized),
        }
    }
}

impl From<VideocapCamera> for Camera {
    fn from(camera: VideocapCamera) -> Self {
        Camera::Videocap(camera)
    }
}

impl From<LoaderCamera> for Camera {
    fn from(camera: LoaderCamera) -> Self {
        Camera::Loader(camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn projection_maps_optical_axis_to_principal_point() {
        let intr = Intrinsics {
            fu: 600.0,
            fv: 600.0,
            ppu: 320.0,
            ppv: 240.0,
            width: 640,
            height: 480,
        };
        let (u, v) = intr.project(&Vector3::new(0.0, 0.0, 1.0)).unwrap();
        assert_relative_eq!(u, 320.0);
        assert_relative_eq!(v, 240.0);
        assert!(intr.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
    }

    #[test]
    fn world2camera_tracks_camera2world() {
        let mut base = CameraBase::new("cam", None);
        let pose = SE3::from_quaternion(
            0.8,
            0.2,
            -0.1,
            0.4,
            nalgebra::Vector3::new(0.3, 0.7, -1.2),
        );
        base.set_camera2world_pose(pose);
        let composed = base.camera2world_pose().compose(base.world2camera_pose());
        assert_relative_eq!(composed.translation.norm(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(composed.rotation.angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn save_images_requires_directory() {
        let mut base = CameraBase::new("cam", None);
        assert!(base
            .set_save_config(true, None, 0, ImageFileType::Png)
            .is_err());
        assert!(base
            .set_save_config(true, Some(PathBuf::from("/tmp")), 0, ImageFileType::Png)
            .is_ok());
    }
}
