// Downloader module - media extraction, rendition catalog and download jobs

pub mod backends;
pub mod catalog;
pub mod config;
pub mod endpoints;
pub mod errors;
pub mod job;
pub mod models;
pub mod progress;
pub mod resolution;
pub mod session;
pub mod sse;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use backends::HttpBackend;
pub use catalog::{FormatCatalog, RenditionGroup};
pub use config::ClientConfig;
pub use endpoints::Endpoints;
pub use errors::{ArtifactError, ConfigError, ExtractionError, SessionError, TransportError};
pub use job::{CancelSignal, JobController, JobHandle};
pub use models::{DownloadJob, FailureReason, JobState, MediaMetadata, Rendition};
pub use progress::{parse_payload, ProgressEvent};
pub use resolution::{height_of, tier_of, QualityTier};
pub use session::Session;
pub use traits::{InfoExtractor, ProgressChannel, ProgressEmitter, ProgressTransport};
