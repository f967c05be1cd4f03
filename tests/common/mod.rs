#![allow(dead_code)]

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use v4l::FourCC;
use webcam_capture::{CaptureDevice, DeviceOpener, FrameSize, Resolution, CAPTURE_FOURCC};

/// Device operations in the order the session issued them
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(PathBuf),
    EnumFormats,
    EnumSizes,
    SetFormat(Resolution),
    Map,
    Queue,
    StreamOn,
    Dequeue,
    StreamOff,
    Unmap,
    Close,
}

/// Behaviour of the fake device, shared so tests can change it mid-session
#[derive(Debug, Clone)]
pub struct Script {
    pub formats: Vec<FourCC>,
    pub sizes: Vec<FrameSize>,
    /// Size the driver applies instead of the requested one
    pub echo: Option<Resolution>,
    pub fail_open: Option<i32>,
    pub fail_set_format: bool,
    pub fail_map: bool,
    pub fail_stream_on: bool,
    pub fail_dequeue: Option<i32>,
    pub buffer_len: Option<usize>,
    pub bytes_used: Option<usize>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            formats: vec![FourCC::new(b"MJPG"), CAPTURE_FOURCC],
            sizes: vec![
                FrameSize::Discrete(Resolution::new(160, 120)),
                FrameSize::Discrete(Resolution::new(320, 240)),
                FrameSize::Discrete(Resolution::new(640, 480)),
            ],
            echo: None,
            fail_open: None,
            fail_set_format: false,
            fail_map: false,
            fail_stream_on: false,
            fail_dequeue: None,
            buffer_len: None,
            bytes_used: None,
        }
    }
}

/// Luma the fake device writes for pixel (x, y); never zero
pub fn luma_at(x: u32, y: u32) -> u8 {
    (20 + (x + 3 * y) % 200) as u8
}

#[derive(Clone, Default)]
pub struct FakeOpener {
    pub script: Rc<RefCell<Script>>,
    pub log: Rc<RefCell<Vec<Call>>>,
}

impl FakeOpener {
    pub fn new(script: Script) -> Self {
        Self {
            script: Rc::new(RefCell::new(script)),
            log: Rc::default(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.borrow().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.log.borrow().iter().filter(|c| *c == call).count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl DeviceOpener for FakeOpener {
    type Device = FakeDevice;

    fn open(&self, path: &Path) -> io::Result<FakeDevice> {
        self.log.borrow_mut().push(Call::Open(path.to_path_buf()));
        if let Some(errno) = self.script.borrow().fail_open {
            return Err(io::Error::from_raw_os_error(errno));
        }

        Ok(FakeDevice {
            script: Rc::clone(&self.script),
            log: Rc::clone(&self.log),
            format: None,
            buffer: Vec::new(),
            mapped: false,
            queued: false,
            streaming: false,
        })
    }
}

pub struct FakeDevice {
    script: Rc<RefCell<Script>>,
    log: Rc<RefCell<Vec<Call>>>,
    format: Option<Resolution>,
    buffer: Vec<u8>,
    mapped: bool,
    queued: bool,
    streaming: bool,
}

impl FakeDevice {
    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }

    fn fill_frame(&mut self) {
        let Some(size) = self.format else { return };
        let mut offset = 0;
        for y in 0..size.height {
            for x in (0..size.width).step_by(2) {
                if offset + 4 > self.buffer.len() {
                    return;
                }
                self.buffer[offset..offset + 4].copy_from_slice(&[luma_at(x, y), 128, luma_at(x + 1, y), 128]);
                offset += 4;
            }
        }
    }
}

fn einval() -> io::Error {
    io::Error::from_raw_os_error(22)
}

impl CaptureDevice for FakeDevice {
    fn pixel_formats(&self) -> io::Result<Vec<FourCC>> {
        self.record(Call::EnumFormats);
        Ok(self.script.borrow().formats.clone())
    }

    fn frame_sizes(&self, _fourcc: FourCC) -> io::Result<Vec<FrameSize>> {
        self.record(Call::EnumSizes);
        Ok(self.script.borrow().sizes.clone())
    }

    fn set_format(&mut self, _fourcc: FourCC, size: Resolution) -> io::Result<Resolution> {
        self.record(Call::SetFormat(size));
        let script = self.script.borrow();
        if script.fail_set_format {
            return Err(einval());
        }
        let applied = script.echo.unwrap_or(size);
        drop(script);

        self.format = Some(applied);
        Ok(applied)
    }

    fn map_buffer(&mut self) -> io::Result<usize> {
        self.record(Call::Map);
        let script = self.script.borrow();
        if script.fail_map {
            return Err(io::Error::from_raw_os_error(12));
        }
        let size = self.format.ok_or_else(einval)?;
        let len = script.buffer_len.unwrap_or(size.pixels() * 2);
        drop(script);

        self.buffer = vec![0; len];
        self.mapped = true;
        Ok(len)
    }

    fn queue_buffer(&mut self) -> io::Result<()> {
        self.record(Call::Queue);
        if !self.mapped || self.queued {
            return Err(einval());
        }
        self.queued = true;
        Ok(())
    }

    fn start_streaming(&mut self) -> io::Result<()> {
        self.record(Call::StreamOn);
        if self.script.borrow().fail_stream_on {
            return Err(io::Error::from_raw_os_error(28));
        }
        self.streaming = true;
        Ok(())
    }

    fn dequeue_buffer(&mut self) -> io::Result<&[u8]> {
        self.record(Call::Dequeue);
        if let Some(errno) = self.script.borrow().fail_dequeue {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if !self.streaming || !self.queued {
            return Err(einval());
        }
        self.queued = false;
        self.fill_frame();

        let used = self.script.borrow().bytes_used.unwrap_or(self.buffer.len());
        Ok(&self.buffer[..used.min(self.buffer.len())])
    }

    fn stop_streaming(&mut self) -> io::Result<()> {
        self.record(Call::StreamOff);
        self.streaming = false;
        self.queued = false;
        Ok(())
    }

    fn unmap_buffer(&mut self) {
        self.record(Call::Unmap);
        self.mapped = false;
        self.buffer = Vec::new();
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.record(Call::Close);
    }
}
