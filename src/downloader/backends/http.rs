// HTTP backend - talks to the extraction service
//
//   POST /extract                        metadata (JSON)
//   GET  /download/progress?url=&format_id=  progress (server-sent events)
//   GET  /download/{job_id}              finished artifact

use async_trait::async_trait;
use futures_util::stream::{BoxStream, Stream};
use futures_util::StreamExt;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_DISPOSITION};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::downloader::config::ClientConfig;
use crate::downloader::endpoints::Endpoints;
use crate::downloader::errors::{ArtifactError, ConfigError, ExtractionError, TransportError};
use crate::downloader::models::{ExtractRequest, ExtractResponse, MediaMetadata};
use crate::downloader::sse::EventDecoder;
use crate::downloader::traits::{InfoExtractor, ProgressChannel, ProgressTransport};

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct HttpBackend {
    client: reqwest::Client,
    endpoints: Endpoints,
    request_timeout: Duration,
    output_dir: PathBuf,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        // No whole-request timeout here: it would cut long progress streams.
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(USER_AGENT);

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|source| {
                ConfigError::InvalidProxy {
                    value: proxy_url.to_string(),
                    source,
                }
            })?;
            debug!(proxy = %proxy_url, "using proxy");
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build().map_err(ConfigError::Client)?,
            endpoints: config.endpoints()?,
            request_timeout: config.request_timeout,
            output_dir: config.output_dir.clone(),
        })
    }

    /// Save the artifact of a finished job into the configured output directory
    pub async fn save_artifact(&self, job_id: &str) -> Result<PathBuf, ArtifactError> {
        self.save_artifact_to(job_id, &self.output_dir).await
    }

    /// Stream `GET /download/{job_id}` into `dir`.
    ///
    /// The file is named after the server's Content-Disposition, falling back
    /// to the job id. Existing files are never overwritten: a taken name gets
    /// a ` (n)` suffix. On failure nothing is left in `dir`.
    pub async fn save_artifact_to(
        &self,
        job_id: &str,
        dir: &Path,
    ) -> Result<PathBuf, ArtifactError> {
        let transport = |source| ArtifactError::Transport {
            job_id: job_id.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.endpoints.artifact(job_id))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArtifactError::Status {
                job_id: job_id.to_string(),
                status: status.as_u16(),
            });
        }

        let file_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .and_then(|name| safe_file_name(&name))
            .unwrap_or_else(|| job_id.replace(&['/', '\\'][..], "_"));

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| io_error(dir, source))?;
        let path = reserve_path(dir, &file_name)
            .await
            .map_err(|source| io_error(&dir.join(&file_name), source))?;

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(transport));
        let written = commit_stream(body, &path).await?;

        info!(job_id = %job_id, path = %path.display(), bytes = written, "artifact saved");
        Ok(path)
    }
}

fn io_error(path: &Path, source: std::io::Error) -> ArtifactError {
    ArtifactError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Claim `dir/file_name` by creating it empty, or the first free
/// `stem (n).ext` when the name is taken
async fn reserve_path(dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let extension = name.extension().map(|e| e.to_string_lossy().into_owned());

    let mut attempt: u32 = 0;
    loop {
        let candidate = match (attempt, &extension) {
            (0, _) => file_name.to_string(),
            (n, Some(ext)) => format!("{} ({}).{}", stem, n, ext),
            (n, None) => format!("{} ({})", stem, n),
        };
        let path = dir.join(candidate);

        let created = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match created {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e),
        }
    }
}

/// Write `body` to a `.part` sibling of the reserved `target`, then move it
/// into place. Both files are removed if anything fails.
async fn commit_stream<S, B>(body: S, target: &Path) -> Result<u64, ArtifactError>
where
    S: Stream<Item = Result<B, ArtifactError>>,
    B: AsRef<[u8]>,
{
    futures_util::pin_mut!(body);

    let mut part_name = target.file_name().unwrap_or_default().to_os_string();
    part_name.push(".part");
    let part = target.with_file_name(part_name);

    let written: Result<u64, ArtifactError> = async {
        let mut file = tokio::fs::File::create(&part)
            .await
            .map_err(|source| io_error(&part, source))?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            let bytes = chunk.as_ref();
            file.write_all(bytes)
                .await
                .map_err(|source| io_error(&part, source))?;
            written += bytes.len() as u64;
        }
        file.flush().await.map_err(|source| io_error(&part, source))?;
        Ok(written)
    }
    .await;

    let result = match written {
        Ok(written) => tokio::fs::rename(&part, target)
            .await
            .map(|_| written)
            .map_err(|source| io_error(target, source)),
        Err(e) => Err(e),
    };

    if result.is_err() {
        let _ = tokio::fs::remove_file(&part).await;
        let _ = tokio::fs::remove_file(target).await;
    }
    result
}

#[async_trait]
impl InfoExtractor for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn extract(&self, url: &str) -> Result<MediaMetadata, ExtractionError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ExtractionError::EmptyUrl);
        }

        debug!(url = %url, "requesting extraction");
        let response = self
            .client
            .post(self.endpoints.extract())
            .timeout(self.request_timeout)
            .json(&ExtractRequest { url })
            .send()
            .await
            .map_err(|e| ExtractionError::transport(url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::transport(url, e))?;

        if !status.is_success() {
            return Err(ExtractionError::rejected(
                url,
                status.as_u16(),
                &server_detail(&body),
            ));
        }

        let payload: ExtractResponse = serde_json::from_str(&body)
            .map_err(|e| ExtractionError::malformed(url, e.to_string()))?;

        MediaMetadata::from_response(payload)
            .map_err(|reason| ExtractionError::malformed(url, reason))
    }
}

#[async_trait]
impl ProgressTransport for HttpBackend {
    async fn open(
        &self,
        media_url: &str,
        format_id: &str,
    ) -> Result<Box<dyn ProgressChannel>, TransportError> {
        let target = self.endpoints.progress(media_url, format_id);
        debug!(target = %target, "opening progress stream");

        let response = self
            .client
            .get(target)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        Ok(Box::new(SseChannel::new(response)))
    }
}

/// Progress channel over a streaming HTTP response
pub struct SseChannel {
    body: Option<BoxStream<'static, reqwest::Result<Vec<u8>>>>,
    decoder: EventDecoder,
    pending: VecDeque<String>,
}

impl SseChannel {
    pub fn new(response: reqwest::Response) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Self {
            body: Some(body),
            decoder: EventDecoder::new(),
            pending: VecDeque::new(),
        }
    }
}

#[async_trait]
impl ProgressChannel for SseChannel {
    async fn next_payload(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            if let Some(payload) = self.pending.pop_front() {
                return Some(Ok(payload));
            }

            let body = self.body.as_mut()?;
            match body.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.feed(&chunk)),
                Some(Err(e)) => return Some(Err(TransportError::Stream(e.to_string()))),
                None => return None,
            }
        }
    }

    fn close(&mut self) {
        // dropping the body releases the connection
        self.body = None;
        self.pending.clear();
    }
}

/// `detail` of a FastAPI error body, or the (shortened) raw body
fn server_detail(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        match &json["detail"] {
            serde_json::Value::String(detail) => return detail.clone(),
            serde_json::Value::Null => {}
            other => return other.to_string(),
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no details".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

fn filename_from_disposition(header: &str) -> Option<String> {
    lazy_static::lazy_static! {
        static ref QUOTED_RE: Regex = Regex::new(r#"(?i)\bfilename="([^"]+)""#).unwrap();
        static ref BARE_RE: Regex = Regex::new(r"(?i)\bfilename=([^;\s]+)").unwrap();
    }

    QUOTED_RE
        .captures(header)
        .or_else(|| BARE_RE.captures(header))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Last path component only, never `..` or empty
fn safe_file_name(name: &str) -> Option<String> {
    let name = name.rsplit(&['/', '\\'][..]).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}
