// Request targets on the extraction backend
//
// Pure URL composition; nothing here performs I/O.

use url::Url;

use super::errors::ConfigError;

/// Backend routes resolved against a base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    pub fn parse(base_url: &str) -> Result<Self, ConfigError> {
        let mut base = Url::parse(base_url.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
            value: base_url.to_string(),
            source,
        })?;

        if base.cannot_be_a_base() {
            return Err(ConfigError::OpaqueBaseUrl(base_url.to_string()));
        }
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base })
    }

    /// `POST /extract`
    pub fn extract(&self) -> Url {
        self.route(&["extract"])
    }

    /// `GET /stream?url=&format_id=` - inline playback
    pub fn stream(&self, media_url: &str, format_id: &str) -> Url {
        let mut url = self.route(&["stream"]);
        url.query_pairs_mut()
            .append_pair("url", media_url)
            .append_pair("format_id", format_id);
        url
    }

    /// `GET /download/progress?url=&format_id=` - server-pushed progress
    pub fn progress(&self, media_url: &str, format_id: &str) -> Url {
        let mut url = self.route(&["download", "progress"]);
        url.query_pairs_mut()
            .append_pair("url", media_url)
            .append_pair("format_id", format_id);
        url
    }

    /// `GET /download/{job_id}` - finished artifact
    pub fn artifact(&self, job_id: &str) -> Url {
        self.route(&["download", job_id])
    }

    fn route(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in parse()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}
