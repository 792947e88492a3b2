//! Runtime for real-time, model-based 6-DoF object pose tracking.
//!
//! The crate provides the two stateful cores of such a pipeline: the camera
//! contract (lifecycle, calibration, frame buffer, persisted configuration)
//! and the tracker (component registry, aggregate setup, per-cycle state
//! machine). Pose-refinement mathematics, mesh rendering, and on-screen
//! display are external collaborators that plug in at the `Modality`,
//! `RendererGeometry`, and `Viewer` boundaries.

pub mod body;
pub mod camera;
pub mod detector;
pub mod error;
pub mod geometry;
pub mod link;
pub mod metafile;
pub mod optimizer;
pub mod renderer_geometry;
pub mod scene;
pub mod tracker;
pub mod viewer;
