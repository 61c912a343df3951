//! Client for a media-extraction service.
//!
//! Resolves a media URL into its renditions, groups them per container and
//! tracks server-side download jobs through a pushed progress stream.

pub mod downloader;

pub use downloader::{
    ClientConfig, DownloadJob, ExtractionError, FailureReason, FormatCatalog, HttpBackend,
    JobState, MediaMetadata, QualityTier, Rendition, RenditionGroup, Session, SessionError,
};
