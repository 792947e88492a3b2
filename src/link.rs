//! Link: one body grouped with the modalities that measure its pose.
//!
//! The refinement mathematics (region, depth, texture modalities and their
//! Gauss-Newton machinery) are external to this crate; they plug in through
//! the [`Modality`] trait.

use crate::error::{Result, TrackError};
use crate::geometry::SE3;
use crate::scene::{BodyId, CameraId, Scene};

/// External source of pose-refinement measurements for a body.
pub trait Modality {
    fn name(&self) -> &str;

    /// Camera this modality measures through, if any. Used by the tracker to
    /// collect the set of cameras that must be refreshed each cycle.
    fn camera(&self) -> Option<CameraId> {
        None
    }

    fn set_up(&mut self, scene: &Scene) -> Result<()>;

    /// One refinement step over the current frame. Returns the refined
    /// `body2world` pose, or `None` when the modality has no measurement
    /// this cycle.
    fn compute_pose_update(&mut self, scene: &Scene) -> Result<Option<SE3>>;
}

/// Groups one body with its modalities.
pub struct Link {
    name: String,
    body: BodyId,
    modalities: Vec<Box<dyn Modality>>,
}

impl Link {
    pub fn new(name: impl Into<String>, body: BodyId) -> Self {
        Self {
            name: name.into(),
            body,
            modalities: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn add_modality(&mut self, modality: Box<dyn Modality>) -> Result<()> {
        if self.modalities.iter().any(|m| m.name() == modality.name()) {
            return Err(TrackError::Configuration(format!(
                "link '{}': modality '{}' already exists",
                self.name,
                modality.name()
            )));
        }
        self.modalities.push(modality);
        Ok(())
    }

    pub fn modalities(&self) -> &[Box<dyn Modality>] {
        &self.modalities
    }

    pub(crate) fn modalities_mut(&mut self) -> &mut [Box<dyn Modality>] {
        &mut self.modalities
    }
}
