// Capture module
// Camera capability plus the snap-a-picture flow

pub mod camera;

pub use camera::{Camera, CameraState, CaptureError, Facing, FrameFeed, VideoConstraints};

use crate::images::{prepare_blocking, ImageError, PipelineConfig};
use crate::state::Picture;

/// Capture a frame and turn it into a picture.
///
/// A capture request without an open camera (or before its first frame) is
/// ignored and yields `Ok(None)`. Pipeline failures are returned so the
/// caller can tell the user; nothing is appended in that case.
pub async fn snapshot(
    camera: Option<&dyn Camera>,
    config: &PipelineConfig,
) -> Result<Option<Picture>, ImageError> {
    let frame = match camera.map(|c| c.capture()) {
        Some(Ok(frame)) => frame,
        Some(Err(e)) => {
            log::debug!("Ignoring capture request: {}", e);
            return Ok(None);
        }
        None => {
            log::debug!("Ignoring capture request: {}", CaptureError::NoActiveCamera);
            return Ok(None);
        }
    };

    prepare_blocking(frame, config.clone()).await.map(Some)
}
