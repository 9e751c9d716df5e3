//! Races several image compression backends on the same input and keeps the
//! smallest result, falling back to the input when compression does not pay
//! off.
//!
//! ```no_run
//! use image_arbiter::{CompressOptions, Compressor, OutputKind};
//!
//! # async fn run(png: Vec<u8>) -> Result<(), image_arbiter::CompressError> {
//! let compressor = Compressor::default();
//! let options = CompressOptions::default().with_quality(0.7).with_output(OutputKind::Base64);
//! let stats = compressor.compress_with_stats(png, &options).await?;
//! println!("{}", stats.summary());
//! # Ok(())
//! # }
//! ```

pub mod arbitrate;
pub mod attempt;
pub mod backend;
pub mod compressor;
pub mod config;
pub mod error;
pub mod events;
pub mod format;
pub mod input;
pub mod materialize;
pub mod metadata;
pub mod race;
pub mod registry;
pub mod report;
pub mod resize;
pub mod selector;

pub use arbitrate::arbitrate;
pub use attempt::{ArbitrationResult, CompressionAttempt};
pub use backend::{Backend, BackendId};
pub use compressor::{compress, compress_with_stats, Compressed, Compressor};
pub use config::{CompressMode, CompressOptions, OutputKind, ToolConfig};
pub use error::{BackendError, CompressError};
pub use events::{EventSink, LogSink, NoopSink, RaceEvent};
pub use format::ContainerType;
pub use input::{FileSource, ImageSource, Input};
pub use materialize::{materialize, BlobDescriptor, FileDescriptor, Output};
pub use race::race;
pub use registry::Registry;
pub use report::{AllResults, BackendStat, CompressionStats, ResultItem};
pub use selector::select_backends;
