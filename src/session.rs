//! Capture session lifecycle
//!
//! A session owns the device handle, its single mapped hardware buffer, the
//! resolution catalog and both conversion buffers. Every teardown path (error,
//! reconfigure, close, drop) releases all of them.

use crate::capture::{CaptureDevice, DeviceOpener, V4lOpener, CAPTURE_FOURCC};
use crate::config::{CaptureConfig, FrameLimits};
use crate::convert::{self, FitMode, OutputFormat, Placement};
use crate::error::{CaptureError, Result};
use crate::resolution::{Resolution, ResolutionCatalog};
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Configuring,
    Streaming,
    Reconfiguring,
    /// Last open failed; all resources have been released
    Error,
}

/// Capture size chosen on the device and the size handed to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureGeometry {
    pub capture: Resolution,
    pub output: Resolution,
}

impl CaptureGeometry {
    pub fn placement(&self) -> Placement {
        Placement::new(self.capture, self.output)
    }

    pub fn fit_mode(&self) -> FitMode {
        self.placement().mode
    }
}

/// A converted frame borrowed from the session
///
/// Valid until the next capture or until the session is reconfigured or closed.
#[derive(Debug)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub format: OutputFormat,
    pub size: Resolution,
    pub sequence: u64,
}

pub struct CaptureSession<O: DeviceOpener = V4lOpener> {
    opener: O,
    path: PathBuf,
    limits: FrameLimits,
    output: Resolution,
    state: SessionState,
    device: Option<O::Device>,
    streaming: bool,
    catalog: ResolutionCatalog,
    geometry: Option<CaptureGeometry>,
    buffer_len: usize,
    gray: Option<Vec<u8>>,
    color: Option<Vec<u8>>,
    frames: u64,
}

impl CaptureSession<V4lOpener> {
    /// Open a V4L2 device and start streaming at an output size
    pub fn open<P: AsRef<Path>>(path: P, output_width: u32, output_height: u32) -> Result<Self> {
        Self::with_opener(V4lOpener, path, output_width, output_height)
    }

    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        Self::with_config(V4lOpener, config)
    }
}

impl<O: DeviceOpener> CaptureSession<O> {
    pub fn with_opener<P: AsRef<Path>>(
        opener: O,
        path: P,
        output_width: u32,
        output_height: u32,
    ) -> Result<Self> {
        let config = CaptureConfig::new(path.as_ref(), output_width, output_height);
        Self::with_config(opener, &config)
    }

    pub fn with_config(opener: O, config: &CaptureConfig) -> Result<Self> {
        config.validate()?;

        let mut session = Self {
            opener,
            path: config.device.clone(),
            limits: config.limits,
            output: Resolution::new(config.output_width, config.output_height),
            state: SessionState::Closed,
            device: None,
            streaming: false,
            catalog: ResolutionCatalog::default(),
            geometry: None,
            buffer_len: 0,
            gray: None,
            color: None,
            frames: 0,
        };

        session.start()?;
        Ok(session)
    }

    /// Bring the device from closed to streaming at `self.output`
    fn start(&mut self) -> Result<()> {
        match self.try_start() {
            Ok(()) => {
                self.set_state(SessionState::Streaming);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to start capture on {}: {}", self.path.display(), e);
                self.teardown();
                self.set_state(SessionState::Error);
                Err(e)
            }
        }
    }

    fn try_start(&mut self) -> Result<()> {
        self.set_state(SessionState::Opening);
        let output = self.output;

        let device = self
            .opener
            .open(&self.path)
            .map_err(|source| CaptureError::DeviceOpenFailure {
                path: self.path.clone(),
                source,
            })?;
        let device = self.device.insert(device);

        if self.catalog.is_empty() {
            self.catalog = ResolutionCatalog::query(&*device)?;
            tracing::debug!(
                "Resolution catalog for {}: {:?}",
                self.path.display(),
                self.catalog.entries()
            );
        }

        let (chosen, mode) = self
            .catalog
            .negotiate(output)
            .ok_or(CaptureError::InternalConsistency("empty resolution catalog"))?;
        tracing::info!("Requested output {}, capturing at {} ({})", output, chosen, mode);

        self.set_state(SessionState::Configuring);
        let device = self
            .device
            .as_mut()
            .ok_or(CaptureError::InternalConsistency("device closed while opening"))?;

        let capture = device
            .set_format(CAPTURE_FOURCC, chosen)
            .map_err(CaptureError::FormatNegotiationFailure)?;
        if capture != chosen {
            tracing::warn!("Requested {}, driver applied {}", chosen, capture);
            if !self.catalog.contains(capture) {
                tracing::warn!("Driver size {} is not in the resolution catalog", capture);
            }
        }

        let buffer_len = device
            .map_buffer()
            .map_err(CaptureError::BufferAllocationFailure)?;
        let frame_len = capture.pixels() * 2;
        if buffer_len < frame_len {
            return Err(CaptureError::BufferAllocationFailure(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("buffer of {} bytes cannot hold a {} frame", buffer_len, capture),
            )));
        }

        device
            .queue_buffer()
            .map_err(CaptureError::StreamStartFailure)?;
        device
            .start_streaming()
            .map_err(CaptureError::StreamStartFailure)?;
        self.streaming = true;

        self.gray = Some(allocate(OutputFormat::Grayscale.frame_len(output))?);
        self.color = Some(allocate(OutputFormat::Rgb565.frame_len(output))?);

        self.buffer_len = buffer_len;
        self.geometry = Some(CaptureGeometry { capture, output });

        tracing::info!(
            "Capture started on {}: input {}, output {}, buffer {} bytes",
            self.path.display(),
            capture,
            output,
            buffer_len
        );
        Ok(())
    }

    /// Block for the next frame and convert it into `format`
    pub fn capture(&mut self, format: OutputFormat) -> Result<Frame<'_>> {
        if self.state != SessionState::Streaming {
            return Err(CaptureError::NotStreaming);
        }
        let geometry = self
            .geometry
            .ok_or(CaptureError::InternalConsistency("streaming without capture geometry"))?;
        if self.gray.is_none() || self.color.is_none() {
            return Err(CaptureError::InternalConsistency(
                "conversion buffers missing while streaming",
            ));
        }

        let device = self
            .device
            .as_mut()
            .ok_or(CaptureError::InternalConsistency("streaming without a device"))?;
        let output = match format {
            OutputFormat::Grayscale => self.gray.as_mut(),
            OutputFormat::Rgb565 => self.color.as_mut(),
        }
        .ok_or(CaptureError::InternalConsistency("conversion buffer missing"))?;

        let src = device.dequeue_buffer().map_err(|e| {
            tracing::warn!("Dequeue failed on {}: {}", self.path.display(), e);
            CaptureError::DequeueFailure(e)
        })?;

        let converted = {
            let _span = tracing::debug_span!("convert", %format).entered();
            convert::convert(format, src, geometry.capture, output, geometry.output)
        };

        // the hardware buffer goes back to the driver whatever the conversion did
        let requeued = device.queue_buffer();
        converted?;
        requeued.map_err(CaptureError::DequeueFailure)?;

        self.frames += 1;
        tracing::debug!("Captured frame {} as {}", self.frames, format);

        Ok(Frame {
            data: output.as_slice(),
            format,
            size: geometry.output,
            sequence: self.frames,
        })
    }

    /// Change the output size, restarting the device
    ///
    /// `None` keeps the current dimension. A streaming session asked for its
    /// current size is left untouched; anything else is a full close and reopen.
    pub fn reconfigure(&mut self, output_width: Option<u32>, output_height: Option<u32>) -> Result<()> {
        let requested = Resolution::new(
            output_width.unwrap_or(self.output.width),
            output_height.unwrap_or(self.output.height),
        );
        self.limits.validate(requested.width, requested.height)?;

        if requested == self.output && self.state == SessionState::Streaming {
            return Ok(());
        }

        tracing::info!(
            "Reconfiguring {}: output {} -> {}",
            self.path.display(),
            self.output,
            requested
        );

        self.set_state(SessionState::Reconfiguring);
        self.teardown();
        self.output = requested;
        self.start()
    }

    /// Drop both conversion buffers; captures fail until the session is reopened
    pub fn release_output_buffers(&mut self) {
        self.gray = None;
        self.color = None;
        tracing::debug!("Released conversion buffers for {}", self.path.display());
    }

    /// Stop streaming and release every resource. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.teardown();
        self.set_state(SessionState::Closed);
        tracing::info!("Closed capture device {}", self.path.display());
    }

    fn teardown(&mut self) {
        if let Some(mut device) = self.device.take() {
            if self.streaming {
                if let Err(e) = device.stop_streaming() {
                    tracing::warn!("Failed to stop streaming on {}: {}", self.path.display(), e);
                }
            }
            device.unmap_buffer();
        }

        self.streaming = false;
        self.buffer_len = 0;
        self.geometry = None;
        self.gray = None;
        self.color = None;
        // another device may show up at the same path
        self.catalog.clear();
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            tracing::debug!("Session {}: {:?} -> {:?}", self.path.display(), self.state, state);
            self.state = state;
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    pub fn device_path(&self) -> &Path {
        &self.path
    }

    pub fn output_size(&self) -> Resolution {
        self.output
    }

    pub fn geometry(&self) -> Option<CaptureGeometry> {
        self.geometry
    }

    pub fn fit_mode(&self) -> Option<FitMode> {
        self.geometry.map(|g| g.fit_mode())
    }

    pub fn catalog(&self) -> &ResolutionCatalog {
        &self.catalog
    }

    /// Length of the mapped hardware buffer as reported by the driver
    pub fn hardware_buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub fn frames_captured(&self) -> u64 {
        self.frames
    }
}

impl<O: DeviceOpener> Drop for CaptureSession<O> {
    fn drop(&mut self) {
        self.close();
    }
}

fn allocate(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|e| CaptureError::BufferAllocationFailure(io::Error::new(io::ErrorKind::OutOfMemory, e)))?;
    buf.resize(len, 0);
    Ok(buf)
}
