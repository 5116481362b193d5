// Image module
// Turns captured frames and uploaded files into stored pictures

pub mod pipeline;
pub mod upload;

pub use pipeline::{
    decode_data_uri, encode, prepare, prepare_blocking, resize, to_picture, ImageBytes,
    ImageError, PipelineConfig,
};
pub use upload::{read_uploads, Upload};
