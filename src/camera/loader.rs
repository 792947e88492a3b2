//! Offline camera backend replaying an image sequence from disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::camera::{CameraBase, ImageFileType, Intrinsics};
use crate::error::{Result, TrackError};
use crate::geometry::SE3;
use crate::metafile;

/// Persisted configuration document of a [`LoaderCamera`].
#[derive(Debug, Serialize, Deserialize)]
struct LoaderMetafile {
    load_directory: PathBuf,
    intrinsics: Intrinsics,
    #[serde(default)]
    load_index: Option<usize>,
    #[serde(default)]
    n_leading_zeros: Option<usize>,
    #[serde(default)]
    image_name_pre: Option<String>,
    #[serde(default)]
    load_image_type: Option<ImageFileType>,
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

/// Camera that replays numbered images from a directory.
///
/// Frame `i` is read from
/// `load_directory/{image_name_pre}{i:0>n_leading_zeros}.{load_image_type}`;
/// the index advances on every refresh. Running past the end of the sequence
/// is a capture error, unlike a live device's empty read: a replay has a
/// definite end and continuing on a stale buffer would silently loop the
/// last frame forever.
#[derive(Debug)]
pub struct LoaderCamera {
    base: CameraBase,
    load_directory: PathBuf,
    load_index: usize,
    n_leading_zeros: usize,
    image_name_pre: String,
    load_image_type: ImageFileType,
}

impl LoaderCamera {
    pub fn from_metafile(name: impl Into<String>, metafile_path: impl Into<PathBuf>) -> Self {
        Self {
            base: CameraBase::new(name, Some(metafile_path.into())),
            load_directory: PathBuf::new(),
            load_index: 0,
            n_leading_zeros: 0,
            image_name_pre: String::new(),
            load_image_type: ImageFileType::default(),
        }
    }

    pub fn new(
        name: impl Into<String>,
        intrinsics: Intrinsics,
        load_directory: impl Into<PathBuf>,
    ) -> Self {
        let mut base = CameraBase::new(name, None);
        base.set_intrinsics(intrinsics);
        Self {
            base,
            load_directory: load_directory.into(),
            load_index: 0,
            n_leading_zeros: 0,
            image_name_pre: String::new(),
            load_image_type: ImageFileType::default(),
        }
    }

    pub fn base(&self) -> &CameraBase {
        &self.base
    }

    pub fn load_index(&self) -> usize {
        self.load_index
    }

    pub fn set_camera2world_pose(&mut self, pose: SE3) {
        self.base.set_camera2world_pose(pose);
    }

    pub fn set_up(&mut self) -> Result<()> {
        self.base.clear_set_up();
        if let Some(path) = self.base.metafile_path().map(Path::to_path_buf) {
            self.load_metafile(&path)?;
        }
        self.save_metafile_if_desired()?;
        if !self.load_directory.is_dir() {
            return Err(TrackError::Device(format!(
                "camera '{}': load directory {} does not exist",
                self.base.name(),
                self.load_directory.display()
            )));
        }
        self.base.mark_set_up();
        if let Err(e) = self.update_image(true) {
            self.base.clear_set_up();
            return Err(e);
        }
        Ok(())
    }

    /// Load the next image of the sequence. `synchronized` is accepted and
    /// ignored; replay is synchronous by construction.
    pub fn update_image(&mut self, _synchronized: bool) -> Result<()> {
        if !self.base.is_set_up() {
            return Err(TrackError::SetupOrder(format!(
                "camera '{}'",
                self.base.name()
            )));
        }
        let path = self.image_path(self.load_index);
        let image = image::open(&path)
            .map_err(|e| TrackError::Capture(format!("could not load {}: {e}", path.display())))?
            .to_rgb8();
        self.base.store_image(image)?;
        self.load_index += 1;
        Ok(())
    }

    fn image_path(&self, index: usize) -> PathBuf {
        let name = format!(
            "{}{:0width$}.{}",
            self.image_name_pre,
            index,
            self.load_image_type.extension(),
            width = self.n_leading_zeros
        );
        self.load_directory.join(name)
    }

    fn load_metafile(&mut self, path: &Path) -> Result<()> {
        let doc: LoaderMetafile = metafile::load_yaml(path)?;
        self.load_directory = metafile::resolve_relative_to(path, &doc.load_directory);
        self.load_index = doc.load_index.unwrap_or(0);
        self.n_leading_zeros = doc.n_leading_zeros.unwrap_or(0);
        self.image_name_pre = doc.image_name_pre.unwrap_or_default();
        self.load_image_type = doc.load_image_type.unwrap_or_default();
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
        let doc = LoaderMetafile {
            load_directory: self.load_directory.clone(),
            intrinsics,
            load_index: Some(self.load_index),
            n_leading_zeros: Some(self.n_leading_zeros),
            image_name_pre: Some(self.image_name_pre.clone()),
            load_image_type: Some(self.load_image_type),
            camera2world_pose: Some(metafile::pose_to_elements(self.base.camera2world_pose())),
            save_directory: Some(dir.to_path_buf()),
            save_index: Some(self.base.save_index()),
            save_image_type: Some(self.base.save_image_type()),
            save_images: Some(true),
        };
        metafile::save_yaml(&dir.join(format!("{}.yaml", self.base.name())), &doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn intrinsics_4x4() -> Intrinsics {
        Intrinsics {
            fu: 4.0,
            fv: 4.0,
            ppu: 2.0,
            ppv: 2.0,
            width: 4,
            height: 4,
        }
    }

    fn write_sequence(dir: &Path, count: usize) {
        for i in 0..count {
            let mut img = RgbImage::new(4, 4);
            img.put_pixel(0, 0, image::Rgb([i as u8, 0, 0]));
            img.save(dir.join(format!("{i}.png"))).unwrap();
        }
    }

    #[test]
    fn replays_sequence_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path(), 3);
        let mut camera = LoaderCamera::new("loader", intrinsics_4x4(), dir.path());
        camera.set_up().unwrap(); // consumes frame 0
        assert_eq!(camera.load_index(), 1);
        assert_eq!(camera.base().image().unwrap().get_pixel(0, 0)[0], 0);

        camera.update_image(false).unwrap();
        assert_eq!(camera.base().image().unwrap().get_pixel(0, 0)[0], 1);
        camera.update_image(false).unwrap();
        assert_eq!(camera.base().image().unwrap().get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn past_end_of_sequence_is_a_capture_error() {
        let dir = tempfile::tempdir().unwrap();
        write_sequence(dir.path(), 1);
        let mut camera = LoaderCamera::new("loader", intrinsics_4x4(), dir.path());
        camera.set_up().unwrap();
        assert!(matches!(
            camera.update_image(false).unwrap_err(),
            TrackError::Capture(_)
        ));
    }

    #[test]
    fn missing_directory_fails_set_up() {
        let mut camera = LoaderCamera::new("loader", intrinsics_4x4(), "/no/such/dir");
        assert!(matches!(
            camera.set_up().unwrap_err(),
            TrackError::Device(_)
        ));
        assert!(!camera.base().is_set_up());
    }

    #[test]
    fn metafile_configures_name_pattern_and_start_index() {
        let dir = tempfile::tempdir().unwrap();
        let frames = dir.path().join("frames");
        std::fs::create_dir(&frames).unwrap();
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(0, 0, image::Rgb([9, 0, 0]));
        img.save(frames.join("color_0005.png")).unwrap();

        let path = dir.path().join("color_camera.yaml");
        std::fs::write(
            &path,
            "load_directory: frames\nintrinsics:\n  fu: 4.0\n  fv: 4.0\n  ppu: 2.0\n  ppv: 2.0\n  width: 4\n  height: 4\nload_index: 5\nn_leading_zeros: 4\nimage_name_pre: color_\n",
        )
        .unwrap();
        let mut camera = LoaderCamera::from_metafile("color_camera", &path);
        camera.set_up().unwrap();
        assert_eq!(camera.base().image().unwrap().get_pixel(0, 0)[0], 9);
        assert_eq!(camera.load_index(), 6);
    }

    #[test]
    fn refresh_before_set_up_is_a_setup_order_error() {
        let mut camera = LoaderCamera::new("loader", intrinsics_4x4(), "/tmp");
        assert!(matches!(
            camera.update_image(false).unwrap_err(),
            TrackError::SetupOrder(_)
        ));
    }
}
