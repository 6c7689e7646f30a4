//! HTTP snapshot camera: each `GET` on the snapshot URL returns one still image
//! (IP cameras, ESP32-CAM `/capture`, motion's `/current`).

use crate::error::{VisionError, VisionResult};
use guard_core::{Frame, FrameSource, GuardResult};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, info};

pub struct HttpSnapshotCamera {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpSnapshotCamera {
    /// Connect and grab one probe frame. A camera that cannot deliver now is a startup failure.
    pub fn open(url: impl Into<String>, timeout: Duration) -> VisionResult<Self> {
        let url = url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VisionError::Camera(e.to_string()))?;
        let camera = Self { url, client };
        let probe = camera.snapshot()?;
        info!(url = %camera.url, bytes = probe.data.len(), "📷 Camera opened");
        Ok(camera)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn snapshot(&self) -> VisionResult<Frame> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| VisionError::Camera(format!("{}: {}", self.url, e)))?;
        if !res.status().is_success() {
            return Err(VisionError::Camera(format!(
                "{} returned {}",
                self.url,
                res.status()
            )));
        }
        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let data = res
            .bytes()
            .map_err(|e| VisionError::Camera(format!("{}: {}", self.url, e)))?;
        if data.is_empty() {
            return Err(VisionError::Camera(format!("{} returned an empty frame", self.url)));
        }
        debug!(bytes = data.len(), %content_type, "Frame captured");
        Ok(Frame::new(data.to_vec(), content_type))
    }
}

impl FrameSource for HttpSnapshotCamera {
    fn read_frame(&mut self) -> GuardResult<Frame> {
        Ok(self.snapshot()?)
    }
}
