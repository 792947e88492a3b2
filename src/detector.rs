//! Detectors bootstrap tracking by producing an initial body pose.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geometry::SE3;
use crate::metafile;
use crate::scene::{BodyId, CameraId, Scene};

pub trait Detector {
    fn name(&self) -> &str;

    /// Camera the detector observes through, if any.
    fn camera(&self) -> Option<CameraId> {
        None
    }

    fn set_up(&mut self, scene: &Scene) -> Result<()>;

    /// Produce an initial pose for the target body.
    fn detect(&mut self, scene: &mut Scene) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StaticDetectorMetafile {
    body2world_pose: Vec<f64>,
}

/// Detector that re-initializes its target body to a fixed pose loaded from
/// a metafile. Useful for sequences where the initial object pose is known,
/// and as the bootstrap for offline single-pass runs.
#[derive(Debug)]
pub struct StaticDetector {
    name: String,
    metafile_path: PathBuf,
    body: BodyId,
    body2world_pose: SE3,
    set_up: bool,
}

impl StaticDetector {
    pub fn from_metafile(
        name: impl Into<String>,
        metafile_path: impl Into<PathBuf>,
        body: BodyId,
    ) -> Self {
        Self {
            name: name.into(),
            metafile_path: metafile_path.into(),
            body,
            body2world_pose: SE3::identity(),
            set_up: false,
        }
    }

    pub fn body2world_pose(&self) -> &SE3 {
        &self.body2world_pose
    }

    fn load_metafile(&mut self, path: &Path) -> Result<()> {
        let doc: StaticDetectorMetafile = metafile::load_yaml(path)?;
        self.body2world_pose = metafile::pose_from_elements(&doc.body2world_pose)?;
        Ok(())
    }
}

impl Detector for StaticDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_up(&mut self, scene: &Scene) -> Result<()> {
        self.set_up = false;
        let body = scene.body(self.body);
        if !body.is_set_up() {
            return Err(TrackError::SetupOrder(format!("body '{}'", body.name())));
        }
        let path = self.metafile_path.clone();
        self.load_metafile(&path)?;
        self.set_up = true;
        Ok(())
    }

    fn detect(&mut self, scene: &mut Scene) -> Result<()> {
        if !self.set_up {
            return Err(TrackError::SetupOrder(format!("detector '{}'", self.name)));
        }
        scene
            .body_mut(self.body)
            .set_body2world_pose(self.body2world_pose);
        Ok(())
    }
}
