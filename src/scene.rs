//! Component arena owned by the tracker.
//!
//! Cameras, bodies, and renderer geometries are stored once in the arena and
//! addressed by stable handles; viewers, optimizers, and detectors hold
//! handles rather than owning references. This keeps one instance per
//! component no matter how many consumers reference it, which is what makes
//! the "refresh each distinct camera once per cycle" rule enforceable by a
//! plain handle dedup.

use crate::body::Body;
use crate::camera::Camera;
use crate::renderer_geometry::RendererGeometry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CameraId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RendererGeometryId(usize);

impl BodyId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    cameras: Vec<Camera>,
    bodies: Vec<Body>,
    renderer_geometries: Vec<RendererGeometry>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_camera(&mut self, camera: impl Into<Camera>) -> CameraId {
        self.cameras.push(camera.into());
        CameraId(self.cameras.len() - 1)
    }

    pub fn add_body(&mut self, body: Body) -> BodyId {
        self.bodies.push(body);
        BodyId(self.bodies.len() - 1)
    }

    pub fn add_renderer_geometry(&mut self, geometry: RendererGeometry) -> RendererGeometryId {
        self.renderer_geometries.push(geometry);
        RendererGeometryId(self.renderer_geometries.len() - 1)
    }

    pub fn camera(&self, id: CameraId) -> &Camera {
        &self.cameras[id.0]
    }

    pub fn camera_mut(&mut self, id: CameraId) -> &mut Camera {
        &mut self.cameras[id.0]
    }

    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id.0]
    }

    pub fn body_mut(&mut self, id: BodyId) -> &mut Body {
        &mut self.bodies[id.0]
    }

    pub fn renderer_geometry(&self, id: RendererGeometryId) -> &RendererGeometry {
        &self.renderer_geometries[id.0]
    }

    pub fn renderer_geometry_mut(&mut self, id: RendererGeometryId) -> &mut RendererGeometry {
        &mut self.renderer_geometries[id.0]
    }

    pub(crate) fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Split borrow used during aggregate setup: renderer geometries need the
    /// (already set up) bodies while being mutated themselves.
    pub(crate) fn geometries_and_bodies(&mut self) -> (&mut [RendererGeometry], &[Body]) {
        (&mut self.renderer_geometries, &self.bodies)
    }
}
