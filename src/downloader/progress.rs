// Progress payload grammar
//
// The backend pushes one short text payload per event:
//   started            job accepted
//   47.5               percentage
//   done:<job id>      finished, artifact retrievable under <job id>
//   error[...]         failed server-side, optional detail
// Parsing is kept apart from the job state machine.

use regex::Regex;

/// One decoded progress payload
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started,
    Progress(f64),
    Done { job_id: String },
    Error { detail: Option<String> },
    /// Anything outside the grammar; logged and ignored by the controller
    Unrecognized(String),
}

/// Parse a single payload.
///
/// Numbers are taken as-is: no clamping, no monotonicity check.
pub fn parse_payload(payload: &str) -> ProgressEvent {
    lazy_static::lazy_static! {
        static ref PERCENT_RE: Regex = Regex::new(r"^\d+(?:\.\d+)?$").unwrap();
    }

    let payload = payload.trim();

    if payload == "started" {
        return ProgressEvent::Started;
    }

    if let Some(job_id) = payload.strip_prefix("done:") {
        let job_id = job_id.trim();
        if job_id.is_empty() {
            return ProgressEvent::Unrecognized(payload.to_string());
        }
        return ProgressEvent::Done {
            job_id: job_id.to_string(),
        };
    }

    if let Some(rest) = payload.strip_prefix("error") {
        let detail = rest.trim_start_matches(':').trim();
        return ProgressEvent::Error {
            detail: (!detail.is_empty()).then(|| detail.to_string()),
        };
    }

    if PERCENT_RE.is_match(payload) {
        if let Ok(percent) = payload.parse::<f64>() {
            return ProgressEvent::Progress(percent);
        }
    }

    ProgressEvent::Unrecognized(payload.to_string())
}
