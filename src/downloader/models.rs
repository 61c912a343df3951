// Common data models for the media client

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::catalog;
use super::resolution::{height_of, tier_of, QualityTier};

/// Metadata resolved for one media URL.
///
/// Replaced wholesale by the next extraction; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub duration_seconds: Option<u64>,
    /// Ranked by descending height
    pub renditions: Vec<Rendition>,
}

impl MediaMetadata {
    /// Strict conversion of the `/extract` payload; renditions come out ranked.
    pub fn from_response(response: ExtractResponse) -> Result<Self, String> {
        let mut seen = HashSet::new();
        let mut renditions = Vec::with_capacity(response.download_options.len());

        for option in response.download_options {
            if option.format_id.is_empty() {
                return Err("download option without format_id".to_string());
            }
            if !seen.insert(option.format_id.clone()) {
                return Err(format!("duplicate format_id '{}'", option.format_id));
            }
            renditions.push(Rendition::from(option));
        }

        let duration_seconds = match response.duration {
            Some(d) if !d.is_finite() || d < 0.0 => {
                return Err(format!("invalid duration {}", d));
            }
            Some(d) => Some(d.round() as u64),
            None => None,
        };

        Ok(Self {
            title: response.title,
            thumbnail_url: response.thumbnail.filter(|t| !t.is_empty()),
            duration_seconds,
            renditions: catalog::rank(&renditions),
        })
    }

    pub fn rendition(&self, format_id: &str) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.format_id == format_id)
    }
}

/// One downloadable encoding of the media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    /// Display label (e.g., "1920x1080 MP4")
    pub label: String,
    /// "WxH"
    pub resolution: String,
    /// mp4, webm, ...
    pub container: String,
    /// Correlation key for stream, progress and download requests
    pub format_id: String,
    pub fps: Option<f64>,
    pub size_bytes: Option<u64>,
}

impl Rendition {
    pub fn height(&self) -> i64 {
        height_of(Some(&self.resolution))
    }

    pub fn tier(&self) -> QualityTier {
        tier_of(self.height())
    }

    /// Human readable size (e.g., "12.5 MB"), if the server reported one
    pub fn size_label(&self) -> Option<String> {
        self.size_bytes.map(|b| {
            let mb = b as f64 / 1_048_576.0;
            if mb >= 1024.0 {
                format!("{:.1} GB", mb / 1024.0)
            } else {
                format!("{:.1} MB", mb)
            }
        })
    }
}

impl From<DownloadOptionPayload> for Rendition {
    fn from(option: DownloadOptionPayload) -> Self {
        Self {
            label: option.label,
            resolution: option.resolution,
            container: option.ext,
            format_id: option.format_id,
            fps: option.fps,
            size_bytes: option.filesize,
        }
    }
}

/// Body of `POST /extract`
#[derive(Debug, Clone, Serialize)]
pub struct ExtractRequest<'a> {
    pub url: &'a str,
}

/// Response of `POST /extract`. Unknown fields (`id`, raw `formats`) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractResponse {
    pub title: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    pub download_options: Vec<DownloadOptionPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadOptionPayload {
    pub label: String,
    pub resolution: String,
    pub ext: String,
    pub format_id: String,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
}

/// Why a job ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The server sent an `error` payload
    ServerError { detail: Option<String> },
    /// The progress channel failed or ended without a terminal payload
    ConnectionLost,
    /// No payload arrived within the inactivity window
    InactivityTimeout,
    /// A download for another rendition replaced this one
    Superseded,
    /// The user cancelled the job
    Cancelled,
}

impl FailureReason {
    /// Message for the presentation layer
    pub fn user_message(&self) -> String {
        match self {
            Self::ServerError { detail: Some(detail) } => {
                format!("The server failed to prepare the download: {}", detail)
            }
            Self::ServerError { detail: None } => {
                "The server failed to prepare the download".to_string()
            }
            Self::ConnectionLost => "Connection lost".to_string(),
            Self::InactivityTimeout => {
                "The server stopped reporting progress".to_string()
            }
            Self::Superseded => "Replaced by another download".to_string(),
            Self::Cancelled => "Download cancelled".to_string(),
        }
    }
}

/// Lifecycle of a download job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Connecting,
    InProgress,
    Completed,
    Failed { reason: FailureReason },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// One download attempt, owned by its job controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub format_id: String,
    pub state: JobState,
    /// Last reported percentage, as sent by the server
    pub progress_percent: f64,
    /// Server-side job id, set on completion
    pub result_job_id: Option<String>,
}

impl DownloadJob {
    pub fn new(format_id: impl Into<String>) -> Self {
        Self {
            format_id: format_id.into(),
            state: JobState::Idle,
            progress_percent: 0.0,
            result_job_id: None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.state {
            JobState::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}
