//! Rigid body whose pose is being tracked.
//!
//! The geometric mesh itself is consumed by the external renderer; this
//! module only carries the body's identity, its geometry reference, and the
//! `body2world`/`world2body` pose pair.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geometry::SE3;
use crate::metafile;

#[derive(Debug, Serialize, Deserialize)]
struct BodyMetafile {
    geometry_path: PathBuf,
    #[serde(default)]
    geometry_unit_in_meter: Option<f64>,
    #[serde(default)]
    body2world_pose: Option<Vec<f64>>,
}

#[derive(Debug)]
pub struct Body {
    name: String,
    metafile_path: Option<PathBuf>,
    geometry_path: PathBuf,
    geometry_unit_in_meter: f64,
    body2world_pose: SE3,
    world2body_pose: SE3,
    set_up: bool,
}

impl Body {
    pub fn from_metafile(name: impl Into<String>, metafile_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            metafile_path: Some(metafile_path.into()),
            geometry_path: PathBuf::new(),
            geometry_unit_in_meter: 1.0,
            body2world_pose: SE3::identity(),
            world2body_pose: SE3::identity(),
            set_up: false,
        }
    }

    pub fn new(name: impl Into<String>, geometry_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            metafile_path: None,
            geometry_path: geometry_path.into(),
            geometry_unit_in_meter: 1.0,
            body2world_pose: SE3::identity(),
            world2body_pose: SE3::identity(),
            set_up: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry_path(&self) -> &Path {
        &self.geometry_path
    }

    pub fn geometry_unit_in_meter(&self) -> f64 {
        self.geometry_unit_in_meter
    }

    pub fn body2world_pose(&self) -> &SE3 {
        &self.body2world_pose
    }

    pub fn world2body_pose(&self) -> &SE3 {
        &self.world2body_pose
    }

    /// Assign the body pose, recomputing its inverse.
    pub fn set_body2world_pose(&mut self, pose: SE3) {
        self.body2world_pose = pose;
        self.world2body_pose = pose.inverse();
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    pub fn set_up(&mut self) -> Result<()> {
        self.set_up = false;
        if let Some(path) = self.metafile_path.clone() {
            self.load_metafile(&path)?;
        }
        if !self.geometry_path.is_file() {
            return Err(TrackError::Configuration(format!(
                "body '{}': geometry file {} does not exist",
                self.name,
                self.geometry_path.display()
            )));
        }
        self.set_up = true;
        Ok(())
    }

    fn load_metafile(&mut self, path: &Path) -> Result<()> {
        let doc: BodyMetafile = metafile::load_yaml(path)?;
        self.geometry_path = metafile::resolve_relative_to(path, &doc.geometry_path);
        self.geometry_unit_in_meter = doc.geometry_unit_in_meter.unwrap_or(1.0);
        let pose = match &doc.body2world_pose {
            Some(elements) => metafile::pose_from_elements(elements)?,
            None => SE3::identity(),
        };
        self.set_body2world_pose(pose);
        Ok(())
    }
}
