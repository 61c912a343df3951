// Session coordinator
//
// Owns everything one screen needs: the URL being typed, the last
// extraction, the rendition picked for preview and the active download.
// Catalog and job controller are stateless collaborators it invokes; the
// job itself is only ever read from here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};
use url::Url;

use super::backends::HttpBackend;
use super::catalog::FormatCatalog;
use super::config::ClientConfig;
use super::endpoints::Endpoints;
use super::errors::{ConfigError, ExtractionError, SessionError};
use super::job::JobHandle;
use super::models::{DownloadJob, FailureReason, JobState, MediaMetadata, Rendition};
use super::traits::{InfoExtractor, ProgressTransport};

/// Metadata together with the URL it was resolved from
struct Extraction {
    media_url: String,
    metadata: MediaMetadata,
    catalog: FormatCatalog,
}

pub struct Session {
    extractor: Arc<dyn InfoExtractor>,
    transport: Arc<dyn ProgressTransport>,
    endpoints: Endpoints,
    inactivity_timeout: Duration,
    url: String,
    extraction: Option<Extraction>,
    selected: Option<Rendition>,
    job: Option<JobHandle>,
}

impl Session {
    pub fn new(
        extractor: Arc<dyn InfoExtractor>,
        transport: Arc<dyn ProgressTransport>,
        config: &ClientConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            extractor,
            transport,
            endpoints: config.endpoints()?,
            inactivity_timeout: config.inactivity_timeout,
            url: String::new(),
            extraction: None,
            selected: None,
            job: None,
        })
    }

    /// Session backed by the HTTP backend for both extraction and progress
    pub fn with_http(config: &ClientConfig) -> Result<Self, ConfigError> {
        let backend = Arc::new(HttpBackend::new(config)?);
        Self::new(backend.clone(), backend, config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn metadata(&self) -> Option<&MediaMetadata> {
        self.extraction.as_ref().map(|e| &e.metadata)
    }

    /// URL the current metadata was extracted from
    pub fn media_url(&self) -> Option<&str> {
        self.extraction.as_ref().map(|e| e.media_url.as_str())
    }

    /// Grouped renditions; empty when nothing is extracted
    pub fn catalog(&self) -> FormatCatalog {
        self.extraction
            .as_ref()
            .map(|e| e.catalog.clone())
            .unwrap_or_default()
    }

    pub fn selected(&self) -> Option<&Rendition> {
        self.selected.as_ref()
    }

    /// Snapshot of the current download, if any
    pub fn job(&self) -> Option<DownloadJob> {
        self.job.as_ref().map(JobHandle::snapshot)
    }

    pub fn job_updates(&self) -> Option<watch::Receiver<DownloadJob>> {
        self.job.as_ref().map(JobHandle::subscribe)
    }

    /// Resolve the current URL.
    ///
    /// An empty URL is a no-op (`Ok(None)`). On success the previous
    /// metadata, selection and download are discarded; on failure the
    /// session is left without metadata and the error is returned once.
    pub async fn run_extraction(&mut self) -> Result<Option<&MediaMetadata>, ExtractionError> {
        let url = self.url.trim().to_string();

        let result = self.extractor.extract(&url).await;
        if matches!(&result, Err(e) if e.is_input_error()) {
            return Ok(None);
        }

        self.clear_selection();
        self.discard_job(FailureReason::Superseded).await;

        match result {
            Ok(metadata) => {
                info!(
                    url = %url,
                    extractor = self.extractor.name(),
                    renditions = metadata.renditions.len(),
                    "extraction finished"
                );
                let catalog = FormatCatalog::build(&metadata.renditions);
                let extraction = self.extraction.insert(Extraction {
                    media_url: url,
                    metadata,
                    catalog,
                });
                Ok(Some(&extraction.metadata))
            }
            Err(e) => {
                warn!(url = %url, error = %e, "extraction failed");
                self.extraction = None;
                Err(e)
            }
        }
    }

    /// Pick the preview target. Downloads are left alone.
    pub fn select_rendition(&mut self, format_id: &str) -> Result<&Rendition, SessionError> {
        let rendition = self.find_rendition(format_id)?.clone();
        Ok(self.selected.insert(rendition))
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Start a download for `format_id`.
    ///
    /// A running download for another rendition is superseded: its channel
    /// is closed before the new one opens. A second request for the
    /// rendition already running is rejected.
    pub async fn start_download(
        &mut self,
        format_id: &str,
    ) -> Result<watch::Receiver<DownloadJob>, SessionError> {
        self.find_rendition(format_id)?;
        let media_url = self
            .media_url()
            .ok_or(SessionError::NoMetadata)?
            .to_string();

        if let Some(active) = &self.job {
            if !active.is_finished() && active.format_id() == format_id {
                return Err(SessionError::AlreadyRunning(format_id.to_string()));
            }
        }
        self.discard_job(FailureReason::Superseded).await;

        info!(url = %media_url, format_id = %format_id, "starting download");
        let handle = JobHandle::spawn(
            Arc::clone(&self.transport),
            &media_url,
            format_id,
            self.inactivity_timeout,
        );
        let updates = handle.subscribe();
        self.job = Some(handle);
        Ok(updates)
    }

    pub fn cancel_download(&self) {
        if let Some(job) = &self.job {
            job.cancel();
        }
    }

    /// Wait until the current download is terminal
    pub async fn wait_for_download(&self) -> Option<DownloadJob> {
        match &self.job {
            Some(job) => Some(job.finished().await),
            None => None,
        }
    }

    /// Inline playback target for a rendition of the extracted media
    pub fn stream_location(&self, format_id: &str) -> Option<Url> {
        self.media_url()
            .map(|media_url| self.endpoints.stream(media_url, format_id))
    }

    /// Playback target for the selected rendition
    pub fn preview_location(&self) -> Option<Url> {
        let selected = self.selected.as_ref()?;
        self.stream_location(&selected.format_id)
    }

    /// Retrieval target for a finished server-side job
    pub fn final_artifact_location(&self, job_id: &str) -> Url {
        self.endpoints.artifact(job_id)
    }

    /// Retrieval target of the current download once it completed
    pub fn artifact_location(&self) -> Option<Url> {
        let job = self.job()?;
        match (&job.state, &job.result_job_id) {
            (JobState::Completed, Some(job_id)) => Some(self.final_artifact_location(job_id)),
            _ => None,
        }
    }

    fn find_rendition(&self, format_id: &str) -> Result<&Rendition, SessionError> {
        let metadata = self.metadata().ok_or(SessionError::NoMetadata)?;
        metadata
            .rendition(format_id)
            .ok_or_else(|| SessionError::UnknownFormat(format_id.to_string()))
    }

    async fn discard_job(&mut self, reason: FailureReason) {
        if let Some(job) = self.job.take() {
            if !job.is_finished() {
                info!(format_id = %job.format_id(), reason = ?reason, "stopping active download");
            }
            job.stop(reason);
            job.join().await;
        }
    }
}
