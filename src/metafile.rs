//! YAML metafile handling shared by cameras, bodies, and detectors.
//!
//! Every stateful component can be constructed from a small YAML document
//! ("metafile"). This module provides the typed load/save entry points, the
//! relative-path resolution rule, and the pose encoding used across all
//! documents: a 4x4 homogeneous matrix flattened into 16 row-major values.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use nalgebra::Matrix4;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, TrackError};
use crate::geometry::SE3;

/// Load a typed configuration document. Both unreadable files and missing
/// required fields surface as configuration errors.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| {
        TrackError::Configuration(format!("could not open {}: {e}", path.display()))
    })?;
    serde_yaml::from_reader(file).map_err(|e| {
        TrackError::Configuration(format!("could not parse {}: {e}", path.display()))
    })
}

/// Serialize a configuration document, creating parent directories as needed.
pub fn save_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            TrackError::Configuration(format!("could not create {}: {e}", parent.display()))
        })?;
    }
    let file = File::create(path).map_err(|e| {
        TrackError::Configuration(format!("could not create {}: {e}", path.display()))
    })?;
    serde_yaml::to_writer(file, value).map_err(|e| {
        TrackError::Configuration(format!("could not write {}: {e}", path.display()))
    })
}

/// Resolve a path from a metafile against the metafile's own directory.
/// Absolute paths are returned unchanged.
pub fn resolve_relative_to(metafile_path: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        metafile_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(path)
    }
}

/// Decode a pose stored as 16 row-major matrix elements.
pub fn pose_from_elements(elements: &[f64]) -> Result<SE3> {
    if elements.len() != 16 {
        return Err(TrackError::Configuration(format!(
            "expected 16 pose elements, got {}",
            elements.len()
        )));
    }
    Ok(SE3::from_matrix(Matrix4::from_row_slice(elements)))
}

/// Encode a pose as 16 row-major matrix elements.
pub fn pose_to_elements(pose: &SE3) -> Vec<f64> {
    let mat = pose.to_matrix();
    (0..4)
        .flat_map(|r| (0..4).map(move |c| (r, c)))
        .map(|(r, c)| mat[(r, c)])
        .collect()
}

/// Write a named pose as a plain-text 4x4 matrix, one row per line. Used to
/// persist the final pose of an offline run.
pub fn write_pose_txt(path: &Path, key: &str, pose: &SE3) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        TrackError::Configuration(format!("could not create {}: {e}", path.display()))
    })?;
    let mat = pose.to_matrix();
    let mut out = format!("{key}:\n");
    for r in 0..4 {
        let row: Vec<String> = (0..4).map(|c| format!("{:.9}", mat[(r, c)])).collect();
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    file.write_all(out.as_bytes())
        .map_err(|e| TrackError::Configuration(format!("could not write {}: {e}", path.display())))
}
