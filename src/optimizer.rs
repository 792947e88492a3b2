//! Optimizer: refines one link's pose estimate per cycle.
//!
//! The numerical refinement itself happens inside the link's modalities;
//! the optimizer sequences them over the current frame and applies the
//! resulting pose to the linked body.

use std::collections::BTreeSet;

use crate::error::{Result, TrackError};
use crate::link::Link;
use crate::scene::{CameraId, Scene};

pub struct Optimizer {
    name: String,
    link: Link,
    set_up: bool,
}

impl Optimizer {
    pub fn new(name: impl Into<String>, link: Link) -> Self {
        Self {
            name: name.into(),
            link,
            set_up: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    /// Cameras the linked modalities measure through.
    pub(crate) fn referenced_cameras(&self, out: &mut BTreeSet<CameraId>) {
        for modality in self.link.modalities() {
            if let Some(camera) = modality.camera() {
                out.insert(camera);
            }
        }
    }

    pub fn set_up(&mut self, scene: &Scene) -> Result<()> {
        self.set_up = false;
        let body = scene.body(self.link.body());
        if !body.is_set_up() {
            return Err(TrackError::SetupOrder(format!("body '{}'", body.name())));
        }
        for modality in self.link.modalities_mut() {
            modality.set_up(scene)?;
        }
        self.set_up = true;
        Ok(())
    }

    /// One refinement pass: run every modality over the current frame and
    /// apply the last produced pose update to the linked body.
    pub fn optimize(&mut self, scene: &mut Scene) -> Result<()> {
        if !self.set_up {
            return Err(TrackError::SetupOrder(format!(
                "optimizer '{}'",
                self.name
            )));
        }
        let mut refined = None;
        for modality in self.link.modalities_mut() {
            if let Some(pose) = modality.compute_pose_update(scene)? {
                refined = Some(pose);
            }
        }
        if let Some(pose) = refined {
            scene.body_mut(self.link.body()).set_body2world_pose(pose);
        }
        Ok(())
    }
}
