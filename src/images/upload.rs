// File uploads
// Reads picked image files fully into memory and runs each through the pipeline
use std::path::{Path, PathBuf};

use super::pipeline::{prepare_blocking, ImageBytes, ImageResult, PipelineConfig};
use crate::state::Picture;

/// Outcome for one uploaded file
#[derive(Debug)]
pub struct Upload {
    pub path: PathBuf,
    pub result: ImageResult<Picture>,
}

/// Read one image file
pub async fn read_image_file(path: &Path) -> ImageResult<ImageBytes> {
    let bytes = tokio::fs::read(path).await?;
    Ok(ImageBytes::new(bytes))
}

/// Process every file in order. A failing file does not affect the others.
pub async fn read_uploads<P: AsRef<Path>>(paths: &[P], config: &PipelineConfig) -> Vec<Upload> {
    let mut uploads = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let result = match read_image_file(path).await {
            Ok(bytes) => prepare_blocking(bytes, config.clone()).await,
            Err(e) => Err(e),
        };

        if let Err(ref e) = result {
            log::warn!("Skipping upload {}: {}", path.display(), e);
        }

        uploads.push(Upload {
            path: path.to_path_buf(),
            result,
        });
    }

    uploads
}
