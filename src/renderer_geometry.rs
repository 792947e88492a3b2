//! Registry of renderable bodies shared by viewers and renderers.
//!
//! Mesh loading and rasterization live in the external renderer; this type
//! only tracks which bodies participate in rendering and aggregates their
//! setup state.

use crate::body::Body;
use crate::error::{Result, TrackError};
use crate::scene::BodyId;

#[derive(Debug)]
pub struct RendererGeometry {
    name: String,
    bodies: Vec<BodyId>,
    set_up: bool,
}

impl RendererGeometry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bodies: Vec::new(),
            set_up: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bodies(&self) -> &[BodyId] {
        &self.bodies
    }

    /// Register a body for rendering. Registering the same handle twice is a
    /// configuration error.
    pub fn add_body(&mut self, body: BodyId) -> Result<()> {
        if self.bodies.contains(&body) {
            return Err(TrackError::Configuration(format!(
                "renderer geometry '{}': body already added",
                self.name
            )));
        }
        self.bodies.push(body);
        Ok(())
    }

    pub fn is_set_up(&self) -> bool {
        self.set_up
    }

    /// Requires every registered body to be set up already; the orchestrator
    /// sets bodies up first.
    pub fn set_up(&mut self, bodies: &[Body]) -> Result<()> {
        self.set_up = false;
        for id in &self.bodies {
            let body = bodies.get(id.index()).ok_or_else(|| {
                TrackError::Configuration(format!(
                    "renderer geometry '{}': unknown body handle",
                    self.name
                ))
            })?;
            if !body.is_set_up() {
                return Err(TrackError::SetupOrder(format!("body '{}'", body.name())));
            }
        }
        self.set_up = true;
        Ok(())
    }
}
