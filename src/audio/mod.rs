pub mod decoder;
pub mod filters;
pub mod resource;

pub use decoder::{FfmpegDecoder, PcmDecoder};
pub use filters::{FfmpegPipeline, FilterPipeline, FilterRequest};
pub use resource::{AudioResource, AudioStream, VolumeHandle};
