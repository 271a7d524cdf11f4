//! V4L2 capture through `rscam`

use super::{FrameSource, StreamInfo};
use crate::error::{FrameUnavailable, SourceError};
use crate::models::Frame;
use crate::utils::grayscale::yuyv_to_rgb;
use std::io;

const FORMAT_YUYV: &[u8; 4] = b"YUYV";
const FORMAT_MJPG: &[u8; 4] = b"MJPG";

/// Capture settings for [`CameraSource`]
#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Device node, e.g. `/dev/video0`
    pub device: String,
    /// Requested resolution
    pub resolution: (u32, u32),
    /// Requested frame rate
    pub fps: u32,
    /// Prefer MJPG over raw YUYV
    pub mjpg: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: "/dev/video0".into(),
            resolution: (640, 480),
            fps: 30,
            mjpg: false,
        }
    }
}

/// Live camera; the device handle is released on `stop` or drop
pub struct CameraSource {
    settings: CameraSettings,
    camera: Option<rscam::Camera>,
    paused: bool,
    seq: u64,
}

impl CameraSource {
    /// Camera that opens `settings.device` on start
    pub fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            camera: None,
            paused: false,
            seq: 0,
        }
    }
}

fn map_io(device: &str, err: io::Error) -> SourceError {
    let detail = format!("{device}: {err}");
    match err.kind() {
        io::ErrorKind::NotFound => SourceError::NoDevice(detail),
        io::ErrorKind::PermissionDenied => SourceError::PermissionDenied(detail),
        _ => SourceError::Unsupported(detail),
    }
}

fn map_start(device: &str, err: rscam::Error) -> SourceError {
    match err {
        rscam::Error::Io(io) => map_io(device, io),
        other => SourceError::Unsupported(format!("{device}: {other}")),
    }
}

impl FrameSource for CameraSource {
    fn start(&mut self) -> Result<StreamInfo, SourceError> {
        let device = self.settings.device.clone();
        let mut camera = rscam::Camera::new(&device).map_err(|e| map_io(&device, e))?;
        let format = if self.settings.mjpg { FORMAT_MJPG } else { FORMAT_YUYV };
        camera
            .start(&rscam::Config {
                interval: (1, self.settings.fps.max(1)),
                resolution: self.settings.resolution,
                format,
                ..Default::default()
            })
            .map_err(|e| map_start(&device, e))?;

        tracing::info!(device = %device, format = %String::from_utf8_lossy(format), "camera started");
        self.camera = Some(camera);
        self.paused = false;
        Ok(StreamInfo {
            width: self.settings.resolution.0,
            height: self.settings.resolution.1,
        })
    }

    fn current_frame(&mut self) -> Result<Frame, FrameUnavailable> {
        if self.paused {
            return Err(FrameUnavailable::Stopped);
        }
        let camera = self.camera.as_mut().ok_or(FrameUnavailable::Stopped)?;
        let captured = camera.capture().map_err(|err| {
            tracing::debug!(error = %err, "camera capture failed");
            FrameUnavailable::NotReady
        })?;
        let (width, height) = captured.resolution;
        if width == 0 || height == 0 {
            return Err(FrameUnavailable::NotReady);
        }

        self.seq += 1;
        let frame = if &captured.format == FORMAT_MJPG {
            let image = image::load_from_memory(&captured).map_err(|err| {
                tracing::debug!(error = %err, "dropping undecodable MJPG frame");
                FrameUnavailable::NotReady
            })?;
            Frame::from_image(&image, self.seq)
        } else {
            let rgb = yuyv_to_rgb(&captured, width as usize, height as usize);
            Frame::from_rgb(rgb, width, height, self.seq).ok_or(FrameUnavailable::NotReady)?
        };
        Ok(frame)
    }

    fn play(&mut self) {
        self.paused = false;
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop() {
                tracing::warn!(error = %err, "camera stop failed");
            }
            tracing::info!(device = %self.settings.device, "camera released");
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}
