//! Error taxonomy for the tracking runtime.
//!
//! All failure paths are surfaced as `Result` values; there are no panicking
//! paths in normal operation. Setup-time errors (`Configuration`, `Device`,
//! `SetupOrder`) are fatal to the operation that produced them, while
//! `Capture` errors during steady-state running are logged by the caller and
//! the cycle proceeds with the stale frame buffer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    /// A required field is absent from a configuration document, a document
    /// cannot be read or parsed, or a name collision occurs in one of the
    /// tracker's registries.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying capture device cannot be opened or cannot be configured
    /// to the requested resolution.
    #[error("device error: {0}")]
    Device(String),

    /// A frame-read attempt yielded no usable data.
    #[error("capture error: {0}")]
    Capture(String),

    /// An operation requiring prior successful setup was invoked before it.
    #[error("{0} must be set up first")]
    SetupOrder(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;
