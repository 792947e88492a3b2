//! Live-device camera backend.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::camera::device::{default_device, CaptureDevice};
use crate::camera::{CameraBase, ImageFileType, Intrinsics};
use crate::error::{Result, TrackError};
use crate::geometry::SE3;
use crate::metafile;

/// What to do when the device delivers an empty frame during steady-state
/// running. `RetainPrevious` keeps the previous frame buffer and reports
/// success; `Fail` propagates a capture error. During the validating refresh
/// inside `set_up` an empty read is always fatal, independent of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyFramePolicy {
    #[default]
    RetainPrevious,
    Fail,
}

/// Persisted configuration document of a [`VideocapCamera`].
#[derive(Debug, Serialize, Deserialize)]
struct VideocapMetafile {
    device_id: i32,
    api_id: i32,
    intrinsics: Intrinsics,
    #[serde(default)]
    camera2world_pose: Option<Vec<f64>>,
    #[serde(default)]
    save_directory: Option<PathBuf>,
    #[serde(default)]
    save_index: Option<usize>,
    #[serde(default)]
    save_image_type: Option<ImageFileType>,
    #[serde(default)]
    save_images: Option<bool>,
}

/// Camera that captures color images from a live video device.
///
/// Constructed either from a metafile (parameters loaded during `set_up`) or
/// from explicit parameters. The capture hardware sits behind
/// [`CaptureDevice`], so tests can substitute mock devices.
pub struct VideocapCamera {
    base: CameraBase,
    device_id: i32,
    api_id: i32,
    device: Box<dyn CaptureDevice>,
    empty_frame_policy: EmptyFramePolicy,
}

impl std::fmt::Debug for VideocapCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideocapCamera")
            .field("name", &self.base.name())
            .field("device_id", &self.device_id)
            .field("api_id", &self.api_id)
            .field("set_up", &self.base.is_set_up())
            .finish()
    }
}

impl VideocapCamera {
    /// Camera configured by a metafile; parameters are loaded in `set_up`.
    pub fn from_metafile(name: impl Into<String>, metafile_path: impl Into<PathBuf>) -> Self {
        Self {
            base: CameraBase::new(name, Some(metafile_path.into())),
            device_id: 0,
            api_id: 0,
            device: default_device(),
            empty_frame_policy: EmptyFramePolicy::default(),
        }
    }

    /// Camera configured by explicit parameters.
    pub fn new(
        name: impl Into<String>,
        intrinsics: Intrinsics,
        device_id: i32,
        api_id: i32,
    ) -> Self {
        let mut base = CameraBase::new(name, None);
        base.set_intrinsics(intrinsics);
        Self {
            base,
            device_id,
            api_id,
            device: default_device(),
            empty_frame_policy: EmptyFramePolicy::default(),
        }
    }

    /// Substitute the capture backend. Used by tests and by callers wiring
    /// an alternative capture API.
    pub fn set_device(&mut self, device: Box<dyn CaptureDevice>) {
        self.device = device;
    }

    pub fn set_empty_frame_policy(&mut self, policy: EmptyFramePolicy) {
        self.empty_frame_policy = policy;
    }

    pub fn base(&self) -> &CameraBase {
        &self.base
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn api_id(&self) -> i32 {
        self.api_id
    }

    pub fn set_camera2world_pose(&mut self, pose: SE3) {
        self.base.set_camera2world_pose(pose);
    }

    /// Bring the camera up: load the metafile (if any), persist the resolved
    /// configuration when requested, open the device, apply the requested
    /// resolution, and run one validating refresh. The ready flag is set only
    /// when every step succeeds.
    pub fn set_up(&mut self) -> Result<()> {
        self.base.clear_set_up();
        if let Some(path) = self.base.metafile_path().map(Path::to_path_buf) {
            self.load_metafile(&path)?;
        }
        self.save_metafile_if_desired()?;

        let intrinsics = *self.base.intrinsics().ok_or_else(|| {
            TrackError::Configuration(format!(
                "camera '{}' has no intrinsics configured",
                self.base.name()
            ))
        })?;
        self.device.open(self.device_id, self.api_id)?;
        self.device
            .set_resolution(intrinsics.width, intrinsics.height)?;

        self.base.mark_set_up();
        if let Err(e) = self.refresh(true, true) {
            self.base.clear_set_up();
            return Err(e);
        }
        Ok(())
    }

    /// Capture one frame. `synchronized` is accepted and ignored: this
    /// backend has no hardware-level multi-sensor synchronization.
    pub fn update_image(&mut self, synchronized: bool) -> Result<()> {
        self.refresh(synchronized, false)
    }

    fn refresh(&mut self, _synchronized: bool, validating: bool) -> Result<()> {
        if !self.base.is_set_up() {
            return Err(TrackError::SetupOrder(format!(
                "camera '{}'",
                self.base.name()
            )));
        }
        match self.device.read()? {
            Some(frame) => self.base.store_image(frame),
            None => {
                if validating || self.empty_frame_policy == EmptyFramePolicy::Fail {
                    return Err(TrackError::Capture(format!(
                        "camera '{}' delivered an empty frame",
                        self.base.name()
                    )));
                }
                warn!(
                    camera = self.base.name(),
                    "empty frame, retaining previous image"
                );
                Ok(())
            }
        }
    }

    fn load_metafile(&mut self, path: &Path) -> Result<()> {
        let doc: VideocapMetafile = metafile::load_yaml(path)?;
        self.device_id = doc.device_id;
        self.api_id = doc.api_id;
        self.base.set_intrinsics(doc.intrinsics);

        let pose = match &doc.camera2world_pose {
            Some(elements) => metafile::pose_from_elements(elements)?,
            None => SE3::identity(),
        };
        self.base.set_camera2world_pose(pose);

        let save_directory = doc
            .save_directory
            .map(|dir| metafile::resolve_relative_to(path, &dir));
        self.base.set_save_config(
            doc.save_images.unwrap_or(false),
            save_directory,
            doc.save_index.unwrap_or(0),
            doc.save_image_type.unwrap_or_default(),
        )
    }

    /// Persist the resolved configuration next to the saved images, so a
    /// run's effective settings are recoverable without the input metafile.
    fn save_metafile_if_desired(&self) -> Result<()> {
        if !self.base.save_images() {
            return Ok(());
        }
        let dir = self.base.save_directory().ok_or_else(|| {
            TrackError::Configuration(format!(
                "camera '{}': save_images enabled without save_directory",
                self.base.name()
            ))
        })?;
        let intrinsics = *self.base.intrinsics().ok_or_else(|| {
            TrackError::Configuration(format!(
                "camera '{}' has no intrinsics configured",
                self.base.name()
            ))
        })?;
        let doc = VideocapMetafile {
            device_id: self.device_id,
            api_id: self.api_id,
            intrinsics,
            camera2world_pose: Some(metafile::pose_to_elements(self.base.camera2world_pose())),
            save_directory: Some(dir.to_path_buf()),
            save_index: Some(self.base.save_index()),
            save_image_type: Some(self.base.save_image_type()),
            save_images: Some(true),
        };
        metafile::save_yaml(&dir.join(format!("{}.yaml", self.base.name())), &doc)
    }
}
