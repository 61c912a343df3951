// Backend trait definitions

use async_trait::async_trait;
use tokio::sync::watch;

use super::errors::{ExtractionError, TransportError};
use super::models::{DownloadJob, MediaMetadata};

/// Resolves a media URL into metadata
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    /// Name of the extractor (for logging)
    fn name(&self) -> &'static str;

    /// Extract metadata. Renditions in the result are ranked.
    ///
    /// An empty URL fails with [`ExtractionError::EmptyUrl`] before any request.
    async fn extract(&self, url: &str) -> Result<MediaMetadata, ExtractionError>;
}

/// Opens server-pushed progress channels
#[async_trait]
pub trait ProgressTransport: Send + Sync {
    async fn open(
        &self,
        media_url: &str,
        format_id: &str,
    ) -> Result<Box<dyn ProgressChannel>, TransportError>;
}

/// One open progress channel, yielding payloads in arrival order
#[async_trait]
pub trait ProgressChannel: Send {
    /// Next payload; `None` once the channel has ended
    async fn next_payload(&mut self) -> Option<Result<String, TransportError>>;

    /// Release the underlying connection
    fn close(&mut self);
}

/// Publishes job snapshots to readers
pub struct ProgressEmitter {
    sender: watch::Sender<DownloadJob>,
}

impl ProgressEmitter {
    pub fn new(initial: DownloadJob) -> (Self, watch::Receiver<DownloadJob>) {
        let (sender, receiver) = watch::channel(initial);
        (Self { sender }, receiver)
    }

    pub fn emit(&self, job: &DownloadJob) {
        // keeps the latest value even when no reader is subscribed
        self.sender.send_replace(job.clone());
    }
}
