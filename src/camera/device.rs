//! Capture device abstraction for the live camera backend.
//!
//! [`VideocapCamera`](super::VideocapCamera) talks to hardware exclusively
//! through the [`CaptureDevice`] trait, which keeps the setup/refresh logic
//! testable with mock devices and keeps the actual capture API pluggable.
//! The shipped implementation uses V4L2 behind the `v4l-capture` feature;
//! without it, opening a live device reports a device error.

use image::RgbImage;

use crate::error::Result;

/// A physical (or simulated) frame source.
///
/// Lifecycle: `open` -> `set_resolution` -> repeated `read`. Implementations
/// must fail `open`/`set_resolution` with a device error rather than
/// silently delivering a different configuration.
pub trait CaptureDevice {
    /// Open the device. `api_id` selects among capture APIs where several
    /// are available; implementations with a single API accept and ignore it.
    fn open(&mut self, device_id: i32, api_id: i32) -> Result<()>;

    /// Request the capture resolution. Fails if the device cannot deliver
    /// exactly the requested dimensions.
    fn set_resolution(&mut self, width: u32, height: u32) -> Result<()>;

    /// Read one frame. `Ok(None)` signals an empty read: the device is alive
    /// but delivered no usable data.
    fn read(&mut self) -> Result<Option<RgbImage>>;
}

/// Construct the capture backend compiled into this build.
pub fn default_device() -> Box<dyn CaptureDevice> {
    #[cfg(feature = "v4l-capture")]
    {
        Box::new(v4l_backend::V4lDevice::new())
    }
    #[cfg(not(feature = "v4l-capture"))]
    {
        Box::new(UnsupportedDevice)
    }
}

/// Placeholder backend for builds without live-capture support.
#[cfg(not(feature = "v4l-capture"))]
struct UnsupportedDevice;

#[cfg(not(feature = "v4l-capture"))]
impl CaptureDevice for UnsupportedDevice {
    fn open(&mut self, device_id: i32, _api_id: i32) -> Result<()> {
        Err(crate::error::TrackError::Device(format!(
            "cannot open device {device_id}: no capture backend compiled in \
             (enable the v4l-capture feature)"
        )))
    }

    fn set_resolution(&mut self, _width: u32, _height: u32) -> Result<()> {
        Err(crate::error::TrackError::Device(
            "no capture backend compiled in".to_string(),
        ))
    }

    fn read(&mut self) -> Result<Option<RgbImage>> {
        Err(crate::error::TrackError::Device(
            "no capture backend compiled in".to_string(),
        ))
    }
}

#[cfg(feature = "v4l-capture")]
mod v4l_backend {
    use image::RgbImage;
    use ouroboros::self_referencing;
    use tracing::debug;
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;
    use v4l::video::Capture;

    use super::CaptureDevice;
    use crate::error::{Result, TrackError};

    // The mmap stream borrows the device, so both live together in a
    // self-referencing cell (same construction as other V4L2 ingest code
    // built on the v4l crate).
    #[self_referencing]
    struct StreamState {
        device: v4l::Device,
        #[borrows(mut device)]
        #[covariant]
        stream: v4l::prelude::MmapStream<'this, v4l::Device>,
    }

    /// V4L2 capture backend. `device_id` maps to `/dev/video{device_id}`.
    pub struct V4lDevice {
        device: Option<v4l::Device>,
        state: Option<StreamState>,
        width: u32,
        height: u32,
    }

    impl V4lDevice {
        pub fn new() -> Self {
            Self {
                device: None,
                state: None,
                width: 0,
                height: 0,
            }
        }
    }

    impl CaptureDevice for V4lDevice {
        fn open(&mut self, device_id: i32, api_id: i32) -> Result<()> {
            if api_id != 0 {
                debug!(api_id, "only the V4L2 backend is compiled in; api_id ignored");
            }
            let device = v4l::Device::new(device_id as usize).map_err(|e| {
                TrackError::Device(format!("could not open /dev/video{device_id}: {e}"))
            })?;
            self.device = Some(device);
            self.state = None;
            Ok(())
        }

        fn set_resolution(&mut self, width: u32, height: u32) -> Result<()> {
            let device = self
                .device
                .as_mut()
                .ok_or_else(|| TrackError::Device("device not opened".to_string()))?;
            let mut format = device
                .format()
                .map_err(|e| TrackError::Device(format!("could not query format: {e}")))?;
            format.width = width;
            format.height = height;
            format.fourcc = v4l::FourCC::new(b"RGB3");
            let applied = device
                .set_format(&format)
                .map_err(|e| TrackError::Device(format!("could not set format: {e}")))?;
            if applied.width != width || applied.height != height {
                return Err(TrackError::Device(format!(
                    "requested {width}x{height}, device delivers {}x{}",
                    applied.width, applied.height
                )));
            }
            self.width = width;
            self.height = height;
            Ok(())
        }

        fn read(&mut self) -> Result<Option<RgbImage>> {
            if self.state.is_none() {
                let device = self
                    .device
                    .take()
                    .ok_or_else(|| TrackError::Device("device not opened".to_string()))?;
                let state = StreamStateTryBuilder {
                    device,
                    stream_builder: |device| {
                        v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                            .map_err(|e| {
                                TrackError::Device(format!("could not create stream: {e}"))
                            })
                    },
                }
                .try_build()?;
                self.state = Some(state);
            }
            let Some(state) = self.state.as_mut() else {
                return Err(TrackError::Device("stream unavailable".to_string()));
            };
            let (width, height) = (self.width, self.height);
            state.with_stream_mut(|stream| {
                let (buf, meta) = stream
                    .next()
                    .map_err(|e| TrackError::Capture(format!("frame read failed: {e}")))?;
                if meta.bytesused == 0 {
                    return Ok(None);
                }
                Ok(RgbImage::from_raw(width, height, buf.to_vec()))
            })
        }
    }
}
