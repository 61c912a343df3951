// Download job controller
//
// Drives one DownloadJob to a terminal state from the server-pushed
// progress payloads:
//
//   Idle -> Connecting -> InProgress -> ... -> Completed
//                 \            \
//                  `------------`--> Failed (error payload, lost channel,
//                                    inactivity, supersession, cancel)
//
// Terminal states accept nothing further. The channel is closed exactly
// once, whichever way the job ends.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::models::{DownloadJob, FailureReason, JobState};
use super::progress::{parse_payload, ProgressEvent};
use super::traits::{ProgressChannel, ProgressEmitter, ProgressTransport};

/// One-shot stop request carrying the reason the job should report
#[derive(Debug, Default)]
pub struct CancelSignal {
    reason: OnceLock<FailureReason>,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// First trigger wins; returns false if already triggered
    pub fn trigger(&self, reason: FailureReason) -> bool {
        if self.reason.set(reason).is_ok() {
            self.notify.notify_one();
            true
        } else {
            false
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.reason.get().is_some()
    }

    pub async fn triggered(&self) -> FailureReason {
        loop {
            if let Some(reason) = self.reason.get() {
                return reason.clone();
            }
            self.notify.notified().await;
        }
    }
}

/// State machine for a single download attempt
pub struct JobController {
    job: DownloadJob,
    emitter: ProgressEmitter,
    inactivity_timeout: Duration,
}

impl JobController {
    pub fn new(
        format_id: &str,
        inactivity_timeout: Duration,
    ) -> (Self, watch::Receiver<DownloadJob>) {
        let job = DownloadJob::new(format_id);
        let (emitter, updates) = ProgressEmitter::new(job.clone());
        (
            Self {
                job,
                emitter,
                inactivity_timeout,
            },
            updates,
        )
    }

    pub fn job(&self) -> &DownloadJob {
        &self.job
    }

    pub fn into_job(self) -> DownloadJob {
        self.job
    }

    /// Start requested: Idle -> Connecting
    pub fn begin(&mut self) -> bool {
        if self.job.state != JobState::Idle {
            return false;
        }
        self.transition(JobState::Connecting);
        true
    }

    /// Parse and apply one raw payload
    pub fn handle_payload(&mut self, payload: &str) -> bool {
        self.apply(parse_payload(payload))
    }

    /// Apply one event; returns whether the job changed
    pub fn apply(&mut self, event: ProgressEvent) -> bool {
        if self.job.state.is_terminal() {
            debug!(
                format_id = %self.job.format_id,
                event = ?event,
                "ignoring payload after termination"
            );
            return false;
        }

        match event {
            ProgressEvent::Started => {
                if self.job.state == JobState::InProgress {
                    debug!(format_id = %self.job.format_id, "duplicate started payload");
                    return false;
                }
                self.job.progress_percent = 0.0;
                self.transition(JobState::InProgress);
            }
            ProgressEvent::Progress(percent) => {
                // taken as reported, even when it goes backwards
                self.job.progress_percent = percent;
                self.transition(JobState::InProgress);
            }
            ProgressEvent::Done { job_id } => {
                self.job.result_job_id = Some(job_id);
                self.transition(JobState::Completed);
            }
            ProgressEvent::Error { detail } => {
                self.transition(JobState::Failed {
                    reason: FailureReason::ServerError { detail },
                });
            }
            ProgressEvent::Unrecognized(payload) => {
                warn!(
                    format_id = %self.job.format_id,
                    payload = %payload,
                    "unrecognized progress payload"
                );
                return false;
            }
        }
        true
    }

    /// Move to Failed unless already terminal
    pub fn fail(&mut self, reason: FailureReason) -> bool {
        if self.job.state.is_terminal() {
            return false;
        }
        self.transition(JobState::Failed { reason });
        true
    }

    fn transition(&mut self, state: JobState) {
        match &state {
            JobState::Completed => info!(
                format_id = %self.job.format_id,
                job_id = ?self.job.result_job_id,
                "download job completed"
            ),
            JobState::Failed { reason } => warn!(
                format_id = %self.job.format_id,
                reason = ?reason,
                "download job failed"
            ),
            _ => debug!(
                format_id = %self.job.format_id,
                state = ?state,
                percent = self.job.progress_percent,
                "download job progress"
            ),
        }
        self.job.state = state;
        self.emitter.emit(&self.job);
    }

    /// Open the progress channel and drive the job to a terminal state
    pub async fn run<T>(
        mut self,
        transport: &T,
        media_url: &str,
        cancel: &CancelSignal,
    ) -> DownloadJob
    where
        T: ProgressTransport + ?Sized,
    {
        self.begin();
        let format_id = self.job.format_id.clone();
        let window = self.inactivity_timeout;

        let opened = tokio::select! {
            biased;
            reason = cancel.triggered() => {
                self.fail(reason);
                return self.into_job();
            }
            opened = tokio::time::timeout(window, transport.open(media_url, &format_id)) => opened,
        };

        let mut channel = match opened {
            Ok(Ok(channel)) => channel,
            Ok(Err(e)) => {
                warn!(format_id = %format_id, error = %e, "failed to open progress stream");
                self.fail(FailureReason::ConnectionLost);
                return self.into_job();
            }
            Err(_) => {
                warn!(format_id = %format_id, "timed out opening progress stream");
                self.fail(FailureReason::InactivityTimeout);
                return self.into_job();
            }
        };

        self.drive(channel.as_mut(), cancel).await;
        self.into_job()
    }

    /// Consume payloads until terminal, then close the channel
    pub async fn drive(&mut self, channel: &mut dyn ProgressChannel, cancel: &CancelSignal) {
        let window = self.inactivity_timeout;

        while !self.job.state.is_terminal() {
            let next = tokio::select! {
                biased;
                reason = cancel.triggered() => {
                    self.fail(reason);
                    break;
                }
                next = tokio::time::timeout(window, channel.next_payload()) => next,
            };

            match next {
                Ok(Some(Ok(payload))) => {
                    self.handle_payload(&payload);
                }
                Ok(Some(Err(e))) => {
                    warn!(format_id = %self.job.format_id, error = %e, "progress stream failed");
                    self.fail(FailureReason::ConnectionLost);
                }
                Ok(None) => {
                    warn!(
                        format_id = %self.job.format_id,
                        "progress stream ended before completion"
                    );
                    self.fail(FailureReason::ConnectionLost);
                }
                Err(_) => {
                    warn!(
                        format_id = %self.job.format_id,
                        timeout_secs = window.as_secs_f64(),
                        "no progress payload within inactivity window"
                    );
                    self.fail(FailureReason::InactivityTimeout);
                }
            }
        }

        channel.close();
        debug!(format_id = %self.job.format_id, "progress stream closed");
    }
}

/// Read side of a spawned job
pub struct JobHandle {
    format_id: String,
    updates: watch::Receiver<DownloadJob>,
    cancel: Arc<CancelSignal>,
    /// Taken by `join`
    task: Option<JoinHandle<DownloadJob>>,
}

impl JobHandle {
    /// Run a controller for `format_id` on the current runtime
    pub fn spawn<T>(
        transport: Arc<T>,
        media_url: &str,
        format_id: &str,
        inactivity_timeout: Duration,
    ) -> Self
    where
        T: ProgressTransport + ?Sized + 'static,
    {
        let (controller, updates) = JobController::new(format_id, inactivity_timeout);
        let cancel = Arc::new(CancelSignal::new());

        let task_cancel = Arc::clone(&cancel);
        let media_url = media_url.to_string();
        let task = tokio::spawn(async move {
            controller
                .run(transport.as_ref(), &media_url, &task_cancel)
                .await
        });

        Self {
            format_id: format_id.to_string(),
            updates,
            cancel,
            task: Some(task),
        }
    }

    pub fn format_id(&self) -> &str {
        &self.format_id
    }

    /// Latest published state
    pub fn snapshot(&self) -> DownloadJob {
        self.updates.borrow().clone()
    }

    /// Receiver for live updates
    pub fn subscribe(&self) -> watch::Receiver<DownloadJob> {
        self.updates.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.updates.borrow().state.is_terminal()
    }

    /// User cancellation; also valid before the server sent `started`
    pub fn cancel(&self) {
        self.stop(FailureReason::Cancelled);
    }

    pub(crate) fn stop(&self, reason: FailureReason) {
        if !self.is_finished() && self.cancel.trigger(reason) {
            debug!(format_id = %self.format_id, "stop requested");
        }
    }

    /// Wait for the terminal state without giving up the handle
    pub async fn finished(&self) -> DownloadJob {
        let mut updates = self.updates.clone();
        let result = updates
            .wait_for(|job| job.state.is_terminal())
            .await
            .map(|job| (*job).clone());

        match result {
            Ok(job) => job,
            // controller task is gone; report what it last published
            Err(_) => self.snapshot(),
        }
    }

    /// Wait for the controller task to exit, channel closed
    pub async fn join(mut self) -> DownloadJob {
        let Some(task) = self.task.take() else {
            return self.snapshot();
        };

        match task.await {
            Ok(job) => job,
            Err(e) => {
                warn!(format_id = %self.format_id, error = %e, "job task aborted");
                let mut job = self.updates.borrow().clone();
                if !job.state.is_terminal() {
                    job.state = JobState::Failed {
                        reason: FailureReason::ConnectionLost,
                    };
                }
                job
            }
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        // the controller task is detached; without this it keeps the channel open
        self.stop(FailureReason::Cancelled);
    }
}
