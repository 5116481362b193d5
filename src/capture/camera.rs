//! Camera capability and the webview-fed frame source
//! The live viewport is drawn by the frontend; it pushes still frames here

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::images::ImageBytes;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CaptureError {
    #[error("No active camera")]
    NoActiveCamera,
    #[error("Camera has not produced a frame yet")]
    NoFrame,
    #[error("Camera frame is empty")]
    EmptyFrame,
}

/// What a camera can do, nothing more
pub trait Camera: Send + Sync {
    /// Grab the current still frame
    fn capture(&self) -> Result<ImageBytes, CaptureError>;

    /// Width / height of the frames this camera produces
    fn aspect_ratio(&self) -> f64;
}

/// Which physical camera to request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front camera
    User,
    /// Back camera
    Environment,
}

impl Facing {
    /// Back camera on phones, except during local development where the
    /// page is usually opened on a laptop with only a front camera.
    pub fn preferred(is_mobile: bool, host: &str) -> Self {
        if is_mobile && !host.starts_with("localhost") {
            Facing::Environment
        } else {
            Facing::User
        }
    }
}

/// Stream request passed to the frontend viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoConstraints {
    pub facing: Facing,
    pub aspect_ratio: f64,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            facing: Facing::User,
            aspect_ratio: 1.0,
        }
    }
}

/// Camera whose frames are pushed by the frontend viewport
pub struct FrameFeed {
    constraints: VideoConstraints,
    latest: Mutex<Option<ImageBytes>>,
}

impl FrameFeed {
    pub fn new(constraints: VideoConstraints) -> Self {
        Self {
            constraints,
            latest: Mutex::new(None),
        }
    }

    pub fn constraints(&self) -> VideoConstraints {
        self.constraints
    }

    /// Replace the latest frame
    pub fn push_frame(&self, frame: ImageBytes) -> Result<(), CaptureError> {
        if frame.is_empty() {
            return Err(CaptureError::EmptyFrame);
        }
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
        Ok(())
    }
}

impl Camera for FrameFeed {
    fn capture(&self) -> Result<ImageBytes, CaptureError> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(CaptureError::NoFrame)
    }

    fn aspect_ratio(&self) -> f64 {
        self.constraints.aspect_ratio
    }
}

/// The currently open camera, if any. Managed by the desktop shell.
#[derive(Default)]
pub struct CameraState {
    feed: Mutex<Option<Arc<FrameFeed>>>,
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a feed with the given constraints, replacing any open one
    pub fn start(&self, constraints: VideoConstraints) -> Arc<FrameFeed> {
        let feed = Arc::new(FrameFeed::new(constraints));
        *self.lock() = Some(Arc::clone(&feed));
        log::info!(
            "Camera started: {:?}, aspect ratio {}",
            constraints.facing,
            constraints.aspect_ratio
        );
        feed
    }

    pub fn stop(&self) {
        if self.lock().take().is_some() {
            log::info!("Camera stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock().is_some()
    }

    pub fn push_frame(&self, frame: ImageBytes) -> Result<(), CaptureError> {
        let feed = self.lock().clone().ok_or(CaptureError::NoActiveCamera)?;
        feed.push_frame(frame)
    }

    /// The open camera behind the capability interface
    pub fn active(&self) -> Option<Arc<dyn Camera>> {
        self.lock().clone().map(|feed| feed as Arc<dyn Camera>)
    }

    pub fn capture(&self) -> Result<ImageBytes, CaptureError> {
        self.active().ok_or(CaptureError::NoActiveCamera)?.capture()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<FrameFeed>>> {
        self.feed.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_facing() {
        assert_eq!(Facing::preferred(true, "grow.example.com"), Facing::Environment);
        assert_eq!(Facing::preferred(true, "localhost:1420"), Facing::User);
        assert_eq!(Facing::preferred(false, "grow.example.com"), Facing::User);
    }

    #[test]
    fn test_constraints_serialize_camel_case() {
        let json = serde_json::to_value(VideoConstraints {
            facing: Facing::Environment,
            aspect_ratio: 1.5,
        })
        .unwrap();
        assert_eq!(json["facing"], "environment");
        assert_eq!(json["aspectRatio"], 1.5);
    }

    #[test]
    fn test_capture_without_camera() {
        let state = CameraState::new();
        assert_eq!(state.capture(), Err(CaptureError::NoActiveCamera));
        assert_eq!(
            state.push_frame(ImageBytes::new(vec![1])),
            Err(CaptureError::NoActiveCamera)
        );
    }

    #[test]
    fn test_capture_before_first_frame() {
        let state = CameraState::new();
        state.start(VideoConstraints::default());
        assert_eq!(state.capture(), Err(CaptureError::NoFrame));
    }

    #[test]
    fn test_capture_returns_latest_frame() {
        let state = CameraState::new();
        state.start(VideoConstraints::default());
        state.push_frame(ImageBytes::new(vec![1, 2])).unwrap();
        state.push_frame(ImageBytes::new(vec![3, 4])).unwrap();
        assert_eq!(state.capture().unwrap().as_bytes(), &[3, 4]);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let feed = FrameFeed::new(VideoConstraints::default());
        assert_eq!(feed.push_frame(ImageBytes::new(vec![])), Err(CaptureError::EmptyFrame));
    }

    #[test]
    fn test_stop_drops_frames() {
        let state = CameraState::new();
        state.start(VideoConstraints::default());
        state.push_frame(ImageBytes::new(vec![9])).unwrap();
        state.stop();
        assert!(!state.is_active());
        assert_eq!(state.capture(), Err(CaptureError::NoActiveCamera));
    }

    #[test]
    fn test_aspect_ratio_through_trait() {
        let state = CameraState::new();
        state.start(VideoConstraints {
            facing: Facing::Environment,
            aspect_ratio: 4.0 / 3.0,
        });
        let camera = state.active().unwrap();
        assert!((camera.aspect_ratio() - 4.0 / 3.0).abs() < f64::EPSILON);
    }
}
