use super::{CaptureDevice, DeviceOpener, FrameSize};
use crate::resolution::Resolution;
use std::io;
use std::path::{Path, PathBuf};
use v4l::buffer::Type;
use v4l::framesize::FrameSizeEnum;
use v4l::io::mmap::Stream;
use v4l::io::traits::{CaptureStream, Stream as _};
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

/// Opens `/dev/video*` nodes through the kernel V4L2 API
#[derive(Debug, Clone, Copy, Default)]
pub struct V4lOpener;

impl DeviceOpener for V4lOpener {
    type Device = V4lDevice;

    fn open(&self, path: &Path) -> io::Result<V4lDevice> {
        V4lDevice::open(path)
    }
}

pub struct V4lDevice {
    // dropped before `device` so the mapping goes away while the fd is still open
    stream: Option<Stream<'static>>,
    index: usize,
    device: Device,
    path: PathBuf,
}

impl V4lDevice {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        tracing::debug!("Opening V4L2 device {}", path.display());

        let device = Device::with_path(&path)?;

        Ok(Self {
            stream: None,
            index: 0,
            device,
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn stream(&mut self) -> io::Result<&mut Stream<'static>> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no buffer mapped"))
    }
}

impl CaptureDevice for V4lDevice {
    fn pixel_formats(&self) -> io::Result<Vec<FourCC>> {
        let formats = self.device.enum_formats()?;
        Ok(formats.into_iter().map(|desc| desc.fourcc).collect())
    }

    fn frame_sizes(&self, fourcc: FourCC) -> io::Result<Vec<FrameSize>> {
        let sizes = self.device.enum_framesizes(fourcc)?;

        Ok(sizes
            .into_iter()
            .map(|size| match size.size {
                FrameSizeEnum::Discrete(d) => FrameSize::Discrete(Resolution::new(d.width, d.height)),
                FrameSizeEnum::Stepwise(s) => FrameSize::Stepwise {
                    min: Resolution::new(s.min_width, s.min_height),
                    max: Resolution::new(s.max_width, s.max_height),
                },
            })
            .collect())
    }

    fn set_format(&mut self, fourcc: FourCC, size: Resolution) -> io::Result<Resolution> {
        let requested = Format::new(size.width, size.height, fourcc);
        let actual = self.device.set_format(&requested)?;

        if actual.fourcc != fourcc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("driver switched pixel format to {}", actual.fourcc),
            ));
        }

        Ok(Resolution::new(actual.width, actual.height))
    }

    fn map_buffer(&mut self) -> io::Result<usize> {
        let stream = Stream::with_buffers(&self.device, Type::VideoCapture, 1)?;
        let length = stream.get(0).map(|buf| buf.len()).unwrap_or(0);

        self.stream = Some(stream);
        self.index = 0;
        Ok(length)
    }

    fn queue_buffer(&mut self) -> io::Result<()> {
        let index = self.index;
        CaptureStream::queue(self.stream()?, index)
    }

    fn start_streaming(&mut self) -> io::Result<()> {
        self.stream()?.start()
    }

    fn dequeue_buffer(&mut self) -> io::Result<&[u8]> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no buffer mapped"))?;

        let index = CaptureStream::dequeue(stream)?;
        self.index = index;

        let bytes: &[u8] = stream
            .get(index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown buffer index"))?;
        let used = stream
            .get_meta(index)
            .map(|meta| meta.bytesused as usize)
            .filter(|&used| used > 0 && used <= bytes.len())
            .unwrap_or(bytes.len());

        Ok(&bytes[..used])
    }

    fn stop_streaming(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.stop(),
            None => Ok(()),
        }
    }

    fn unmap_buffer(&mut self) {
        self.stream = None;
    }
}
