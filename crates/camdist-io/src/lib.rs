#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// image read and write functions.
pub mod functional;

/// io error types.
pub mod error;
pub use error::IoError;

/// video frame sources and sinks.
pub mod video;
pub use video::{FrameSink, FrameSource, MemoryFrameSink, MemoryFrameSource};
