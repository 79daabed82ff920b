//! Batch drivers feeding frames through a [`FramePipeline`](crate::pipeline::FramePipeline).

pub mod images;
#[cfg(feature = "opencv")]
pub mod video;

pub use images::{ImageRunner, RunSummary};
#[cfg(feature = "opencv")]
pub use video::VideoRunner;
