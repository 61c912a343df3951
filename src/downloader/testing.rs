// Scripted collaborators for unit tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::errors::{ExtractionError, TransportError};
use super::models::{MediaMetadata, Rendition};
use super::traits::{InfoExtractor, ProgressChannel, ProgressTransport};

/// One scripted channel behaviour
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Payload(&'static str),
    Fail(TransportError),
    /// Never yields again
    Hang,
}

pub(crate) fn payloads(items: &[&'static str]) -> Vec<Step> {
    items.iter().map(|p| Step::Payload(*p)).collect()
}

pub(crate) struct ScriptedChannel {
    steps: VecDeque<Step>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedChannel {
    pub(crate) fn new(steps: Vec<Step>, closes: Arc<AtomicUsize>) -> Self {
        Self {
            steps: steps.into(),
            closes,
        }
    }
}

#[async_trait]
impl ProgressChannel for ScriptedChannel {
    async fn next_payload(&mut self) -> Option<Result<String, TransportError>> {
        match self.steps.pop_front() {
            Some(Step::Payload(p)) => Some(Ok(p.to_string())),
            Some(Step::Fail(e)) => Some(Err(e)),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                None
            }
            None => None,
        }
    }

    fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out scripted channels per format id; unknown formats fail to open
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    scripts: Mutex<HashMap<String, Vec<Step>>>,
    opened: Mutex<Vec<(String, String)>>,
    closes: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(self, format_id: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(format_id.to_string(), steps);
        self
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub(crate) fn opened(&self) -> Vec<(String, String)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressTransport for ScriptedTransport {
    async fn open(
        &self,
        media_url: &str,
        format_id: &str,
    ) -> Result<Box<dyn ProgressChannel>, TransportError> {
        self.opened
            .lock()
            .unwrap()
            .push((media_url.to_string(), format_id.to_string()));

        let steps = self.scripts.lock().unwrap().remove(format_id);
        match steps {
            Some(steps) => Ok(Box::new(ScriptedChannel::new(steps, Arc::clone(&self.closes)))),
            None => Err(TransportError::Status(404)),
        }
    }
}

/// Returns canned metadata (or a malformed-payload error) and counts calls
pub(crate) struct CannedExtractor {
    metadata: Option<MediaMetadata>,
    calls: AtomicUsize,
}

impl CannedExtractor {
    pub(crate) fn returning(metadata: MediaMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            metadata: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InfoExtractor for CannedExtractor {
    fn name(&self) -> &'static str {
        "canned"
    }

    async fn extract(&self, url: &str) -> Result<MediaMetadata, ExtractionError> {
        if url.trim().is_empty() {
            return Err(ExtractionError::EmptyUrl);
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metadata
            .clone()
            .ok_or_else(|| ExtractionError::malformed(url, "missing field `title`"))
    }
}

pub(crate) fn rendition(format_id: &str, resolution: &str, container: &str) -> Rendition {
    Rendition {
        label: format!("{} {}", resolution, container.to_uppercase()),
        resolution: resolution.to_string(),
        container: container.to_string(),
        format_id: format_id.to_string(),
        fps: None,
        size_bytes: None,
    }
}

/// The three-rendition clip used across session tests
pub(crate) fn sample_metadata() -> MediaMetadata {
    MediaMetadata {
        title: "Sample".to_string(),
        thumbnail_url: None,
        duration_seconds: Some(30),
        renditions: vec![
            rendition("f1", "1920x1080", "mp4"),
            rendition("f2", "1280x720", "mp4"),
            rendition("f3", "1920x1080", "webm"),
        ],
    }
}
