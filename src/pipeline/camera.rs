use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::{Context, Result, anyhow};
use image::RgbaImage;

use crate::types::Frame;

/// An opened capture device. Lives on the tick thread.
pub trait FrameSource {
    /// Grabs the most recent image. Errors mean "no frame this tick".
    fn read(&mut self, tick: u64) -> Result<Frame>;

    /// Gives the device back. Must be safe to call more than once.
    fn release(&mut self);
}

/// Opens capture devices by index.
pub trait CameraBackend {
    fn open(&mut self, device_index: u32) -> Result<Box<dyn FrameSource>>;
}

impl CameraBackend for Box<dyn CameraBackend> {
    fn open(&mut self, device_index: u32) -> Result<Box<dyn FrameSource>> {
        (**self).open(device_index)
    }
}

#[cfg(feature = "camera-nokhwa")]
pub use native::{CameraDevice, NokhwaBackend, available_cameras};

#[cfg(feature = "camera-nokhwa")]
mod native {
    use anyhow::{Result, anyhow};
    use nokhwa::{
        Camera,
        pixel_format::RgbFormat,
        query,
        utils::{
            ApiBackend, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
            RequestedFormatType,
        },
    };

    use super::{CameraBackend, FrameSource};
    use crate::{
        pipeline::rgba_converter::{self, PixelLayout},
        types::Frame,
    };

    // Prefer pixel formats that are widely supported on macOS (the built-in cameras
    // often reject YUYV even though Nokhwa reports it).
    const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
        FrameFormat::RAWRGB,
        FrameFormat::RAWBGR,
        FrameFormat::GRAY,
        FrameFormat::YUYV,
        FrameFormat::NV12,
        FrameFormat::MJPEG,
    ];

    fn requested_formats() -> [RequestedFormat<'static>; 3] {
        [
            RequestedFormat::with_formats(
                RequestedFormatType::AbsoluteHighestFrameRate,
                PREFERRED_PIXEL_FORMATS,
            ),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
        ]
    }

    #[derive(Clone, Debug)]
    pub struct CameraDevice {
        pub index: CameraIndex,
        pub label: String,
    }

    pub fn available_cameras() -> Result<Vec<CameraDevice>> {
        let cameras = query(ApiBackend::Auto)?;
        Ok(cameras
            .into_iter()
            .map(|info: CameraInfo| CameraDevice {
                index: info.index().clone(),
                label: info.human_name(),
            })
            .collect())
    }

    fn build_camera(index: CameraIndex) -> Result<Camera> {
        let mut last_err = None;

        for requested in requested_formats() {
            match Camera::new(index.clone(), requested) {
                Ok(mut camera) => match camera.open_stream() {
                    Ok(()) => return Ok(camera),
                    Err(err) => last_err = Some(err.into()),
                },
                Err(err) => last_err = Some(err.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
    }

    fn layout_of(format: FrameFormat) -> PixelLayout {
        match format {
            FrameFormat::NV12 => PixelLayout::Nv12,
            FrameFormat::YUYV => PixelLayout::Yuyv,
            FrameFormat::MJPEG => PixelLayout::Mjpeg,
            FrameFormat::RAWRGB => PixelLayout::Rgb,
            FrameFormat::RAWBGR => PixelLayout::Bgr,
            FrameFormat::GRAY => PixelLayout::Gray,
        }
    }

    #[derive(Clone, Copy, Debug, Default)]
    pub struct NokhwaBackend;

    impl CameraBackend for NokhwaBackend {
        fn open(&mut self, device_index: u32) -> Result<Box<dyn FrameSource>> {
            let camera = build_camera(CameraIndex::Index(device_index))?;
            log::info!(
                "camera {device_index} open: {} @ {:?}",
                camera.info().human_name(),
                camera.camera_format()
            );
            Ok(Box::new(NokhwaSource {
                camera: Some(camera),
            }))
        }
    }

    struct NokhwaSource {
        camera: Option<Camera>,
    }

    impl FrameSource for NokhwaSource {
        fn read(&mut self, tick: u64) -> Result<Frame> {
            let camera = self
                .camera
                .as_mut()
                .ok_or_else(|| anyhow!("camera already released"))?;
            let buffer = camera.frame()?;
            let resolution = buffer.resolution();
            let (width, height) = (resolution.width_x, resolution.height_y);
            let rgba = rgba_converter::to_rgba(
                layout_of(buffer.source_frame_format()),
                buffer.buffer(),
                width,
                height,
            )?;
            Ok(Frame::new(rgba, width, height, tick))
        }

        fn release(&mut self) {
            if let Some(mut camera) = self.camera.take() {
                if let Err(err) = camera.stop_stream() {
                    log::warn!("failed to stop camera stream: {err:?}");
                }
                log::info!("camera released");
            }
        }
    }

    impl Drop for NokhwaSource {
        fn drop(&mut self) {
            self.release();
        }
    }
}

/// Replays a fixed set of images, looping forever. Useful without a camera.
#[derive(Clone, Debug)]
pub struct StillImageCamera {
    paths: Vec<PathBuf>,
}

impl StillImageCamera {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Every png/jpeg in `dir`, in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("failed to read image directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg")
                    })
            })
            .collect();
        paths.sort();
        Ok(Self::new(paths))
    }
}

impl CameraBackend for StillImageCamera {
    fn open(&mut self, _device_index: u32) -> Result<Box<dyn FrameSource>> {
        if self.paths.is_empty() {
            return Err(anyhow!("no images to replay"));
        }

        let images = self
            .paths
            .iter()
            .map(|path| {
                image::open(path)
                    .map(|img| img.to_rgba8())
                    .with_context(|| format!("failed to decode {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("replaying {} still images", images.len());
        Ok(Box::new(StillImageSource { images, next: 0 }))
    }
}

struct StillImageSource {
    images: Vec<RgbaImage>,
    next: usize,
}

impl FrameSource for StillImageSource {
    fn read(&mut self, tick: u64) -> Result<Frame> {
        let image = self
            .images
            .get(self.next)
            .ok_or_else(|| anyhow!("image source released"))?;
        self.next = (self.next + 1) % self.images.len();
        Ok(Frame::new(
            image.as_raw().clone(),
            image.width(),
            image.height(),
            tick,
        ))
    }

    fn release(&mut self) {
        self.images.clear();
        self.next = 0;
    }
}

/// Emits uniform gray frames. `fail_every` makes every n-th read fail.
#[derive(Clone, Debug)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    value: u8,
    fail_every: Option<u64>,
    fail_open: bool,
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicBool>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            value,
            fail_every: None,
            fail_open: false,
            opened: Arc::new(AtomicUsize::new(0)),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Number of times the device was opened.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Whether the last opened source has been released.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl CameraBackend for SyntheticCamera {
    fn open(&mut self, device_index: u32) -> Result<Box<dyn FrameSource>> {
        if self.fail_open {
            return Err(anyhow!("synthetic camera {device_index} unavailable"));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.released.store(false, Ordering::SeqCst);
        Ok(Box::new(SyntheticSource {
            camera: self.clone(),
            reads: 0,
        }))
    }
}

struct SyntheticSource {
    camera: SyntheticCamera,
    reads: u64,
}

impl FrameSource for SyntheticSource {
    fn read(&mut self, tick: u64) -> Result<Frame> {
        if self.camera.is_released() {
            return Err(anyhow!("synthetic camera released"));
        }
        self.reads += 1;
        if let Some(n) = self.camera.fail_every
            && self.reads % n == 0
        {
            return Err(anyhow!("synthetic read {} failed", self.reads));
        }
        Ok(Frame::filled(
            self.camera.width,
            self.camera.height,
            self.camera.value,
            tick,
        ))
    }

    fn release(&mut self) {
        self.camera.released.store(true, Ordering::SeqCst);
    }
}
