//! Background execution of scrape jobs.
//!
//! A job runs on its own Tokio task: fetch, parse, select, align. The task
//! writes exactly one [`Outcome`] into a oneshot channel and never touches
//! the caller otherwise. The caller keeps a [`JobHandle`] and either polls
//! it without blocking or awaits it under its own timeout.
//!
//! Parsing and extraction are CPU-bound and the parsed tree is not `Send`,
//! so that part runs on the blocking pool. A panic there is caught by the
//! join handle and reported as an extraction failure like any other error.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot::{self, error::TryRecvError};
use uuid::Uuid;

use crate::engine;
use crate::error::{AppError, ErrorKind};
use crate::job::{Job, JobState};
use crate::models::{Outcome, RowSet};
use crate::traits::{Fetcher, HtmlParser};

/// Events emitted while a job runs, for monitoring/logging.
#[derive(Debug, Clone)]
pub enum JobEvent<'a> {
    Submitted {
        job_id: Uuid,
        url: &'a str,
        columns: usize,
    },
    Fetched {
        job_id: Uuid,
        final_url: &'a str,
        bytes: usize,
    },
    ColumnsMatched {
        job_id: Uuid,
        counts: &'a [usize],
    },
    /// Column match counts differed; trailing rows were dropped.
    RowsTruncated {
        job_id: Uuid,
        kept: usize,
        counts: &'a [usize],
    },
    Completed {
        job_id: Uuid,
        rows: usize,
    },
    Failed {
        job_id: Uuid,
        kind: ErrorKind,
        error: &'a str,
    },
    /// The caller dropped its handle before the outcome was ready.
    Discarded {
        job_id: Uuid,
    },
}

impl JobEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            JobEvent::Submitted { .. } => "submitted",
            JobEvent::Fetched { .. } => "fetched",
            JobEvent::ColumnsMatched { .. } => "columns_matched",
            JobEvent::RowsTruncated { .. } => "rows_truncated",
            JobEvent::Completed { .. } => "completed",
            JobEvent::Failed { .. } => "failed",
            JobEvent::Discarded { .. } => "discarded",
        }
    }
}

/// Trait for receiving job events (decoupled logging).
pub trait JobReporter: Send + Sync {
    fn report(&self, event: JobEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingJobReporter;

impl JobReporter for TracingJobReporter {
    fn report(&self, event: JobEvent<'_>) {
        match event {
            JobEvent::Submitted {
                job_id,
                url,
                columns,
            } => {
                tracing::info!(%job_id, %url, %columns, "Job submitted");
            }
            JobEvent::Fetched {
                job_id,
                final_url,
                bytes,
            } => {
                tracing::info!(%job_id, %final_url, %bytes, "Fetched page");
            }
            JobEvent::ColumnsMatched { job_id, counts } => {
                tracing::debug!(%job_id, ?counts, "Columns matched");
            }
            JobEvent::RowsTruncated {
                job_id,
                kept,
                counts,
            } => {
                tracing::warn!(
                    %job_id,
                    %kept,
                    ?counts,
                    "Column match counts differ, rows truncated to the shortest column"
                );
            }
            JobEvent::Completed { job_id, rows } => {
                tracing::info!(%job_id, %rows, "Job completed");
            }
            JobEvent::Failed {
                job_id,
                kind,
                error,
            } => {
                tracing::warn!(%job_id, %kind, %error, "Job failed");
            }
            JobEvent::Discarded { job_id } => {
                tracing::debug!(%job_id, "Caller went away, outcome discarded");
            }
        }
    }
}

/// Run one job to completion: fetch, parse, select, align.
///
/// Never returns an error; every failure becomes an [`Outcome::Failure`].
/// Fetch failures are reported as [`ErrorKind::Network`], everything else as
/// [`ErrorKind::Extraction`]. There is no retry.
pub async fn execute<F, P, R>(fetcher: &F, parser: &P, job: Arc<Job>, reporter: &R) -> Outcome
where
    F: Fetcher,
    P: HtmlParser + 'static,
    R: JobReporter,
{
    let job_id = job.id();

    // 1. Fetch
    let fetched = match fetcher.fetch(job.url()).await {
        Ok(page) => page,
        Err(e) => return fail(job_id, &e, reporter),
    };
    reporter.report(JobEvent::Fetched {
        job_id,
        final_url: &fetched.final_url,
        bytes: fetched.body.len(),
    });

    // 2 & 3. Parse + extract, off the async workers
    let parser = parser.clone();
    let task_job = Arc::clone(&job);
    let extracted = tokio::task::spawn_blocking(move || {
        let page = parser.parse(&fetched.body);
        let match_lists = engine::select(&page, task_job.rules())?;
        let counts: Vec<usize> = match_lists.iter().map(Vec::len).collect();
        let rows = engine::align_and_extract(&match_lists, task_job.rules(), &fetched.final_url)?;
        Ok::<(RowSet, Vec<usize>), AppError>((rows, counts))
    })
    .await;

    match extracted {
        Ok(Ok((rows, counts))) => {
            reporter.report(JobEvent::ColumnsMatched {
                job_id,
                counts: &counts,
            });
            if let Some(kept) = engine::truncation(&counts) {
                reporter.report(JobEvent::RowsTruncated {
                    job_id,
                    kept,
                    counts: &counts,
                });
            }
            reporter.report(JobEvent::Completed {
                job_id,
                rows: rows.len(),
            });
            Outcome::success(rows)
        }
        Ok(Err(e)) => fail(job_id, &e, reporter),
        Err(join_err) => {
            let detail = if join_err.is_panic() {
                format!("extraction panicked: {}", panic_message(join_err.into_panic()))
            } else {
                format!("extraction task failed: {join_err}")
            };
            fail(job_id, &AppError::ExtractionError(detail), reporter)
        }
    }
}

fn fail<R: JobReporter>(job_id: Uuid, err: &AppError, reporter: &R) -> Outcome {
    let kind = if err.is_network() {
        ErrorKind::Network
    } else {
        ErrorKind::Extraction
    };
    let message = err.to_string();
    reporter.report(JobEvent::Failed {
        job_id,
        kind,
        error: &message,
    });
    Outcome::failure(kind, message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Caller-side end of one running job.
///
/// Holds the receiving half of the single-slot channel. Dropping the handle
/// abandons the job: the task still runs to completion and its outcome is
/// discarded.
#[derive(Debug)]
pub struct JobHandle {
    job_id: Uuid,
    url: String,
    started_at: DateTime<Utc>,
    state: JobState,
    receiver: oneshot::Receiver<Outcome>,
}

impl JobHandle {
    /// Spawn `job` on the current Tokio runtime.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<F, P, R>(fetcher: F, parser: P, job: Job, reporter: R) -> Self
    where
        F: Fetcher + 'static,
        P: HtmlParser + 'static,
        R: JobReporter + 'static,
    {
        let job_id = job.id();
        let url = job.url().to_string();
        reporter.report(JobEvent::Submitted {
            job_id,
            url: &url,
            columns: job.rules().len(),
        });

        let (sender, receiver) = oneshot::channel();
        let job = Arc::new(job);
        tokio::spawn(async move {
            let outcome = execute(&fetcher, &parser, job, &reporter).await;
            if sender.send(outcome).is_err() {
                reporter.report(JobEvent::Discarded { job_id });
            }
        });

        Self {
            job_id,
            url,
            started_at: Utc::now(),
            state: JobState::Running,
            receiver,
        }
    }

    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Non-blocking check for the outcome.
    ///
    /// Returns `None` while the job is running, the outcome exactly once when
    /// it is ready, and `None` on every call after that.
    pub fn poll(&mut self) -> Option<Outcome> {
        if self.state.is_terminal() {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(outcome) => Some(self.finish(outcome)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(self.finish(lost_outcome())),
        }
    }

    /// Wait for the outcome. Returns `None` if it was already consumed.
    ///
    /// Imposes no timeout; wrap in `tokio::time::timeout` if needed. Safe to
    /// cancel and call again.
    pub async fn wait(&mut self) -> Option<Outcome> {
        if self.state.is_terminal() {
            return None;
        }
        let outcome = (&mut self.receiver).await.unwrap_or_else(|_| lost_outcome());
        Some(self.finish(outcome))
    }

    fn finish(&mut self, outcome: Outcome) -> Outcome {
        self.state = if outcome.is_success() {
            JobState::Completed
        } else {
            JobState::Failed
        };
        let elapsed_ms = (Utc::now() - self.started_at).num_milliseconds();
        tracing::debug!(job_id = %self.job_id, state = %self.state, %elapsed_ms, "Outcome received");
        outcome
    }
}

/// Stand-in outcome when the task ended without sending one (runtime shutdown).
fn lost_outcome() -> Outcome {
    Outcome::failure(
        ErrorKind::Extraction,
        "background task ended without producing an outcome",
    )
}

/// Runs at most one job at a time and tracks its state.
///
/// `Idle → Running → {Completed | Failed}`. Submitting while a job is
/// `Running` is rejected; once the outcome has been received the next
/// submission replaces it.
pub struct JobRunner<F, P, R = TracingJobReporter> {
    fetcher: F,
    parser: P,
    reporter: R,
    active: Option<JobHandle>,
}

impl<F, P> JobRunner<F, P, TracingJobReporter>
where
    F: Fetcher + 'static,
    P: HtmlParser + 'static,
{
    pub fn new(fetcher: F, parser: P) -> Self {
        Self::with_reporter(fetcher, parser, TracingJobReporter)
    }
}

impl<F, P, R> JobRunner<F, P, R>
where
    F: Fetcher + 'static,
    P: HtmlParser + 'static,
    R: JobReporter + Clone + 'static,
{
    pub fn with_reporter(fetcher: F, parser: P, reporter: R) -> Self {
        Self {
            fetcher,
            parser,
            reporter,
            active: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.active
            .as_ref()
            .map_or(JobState::Idle, JobHandle::state)
    }

    pub fn active_job(&self) -> Option<Uuid> {
        self.active.as_ref().map(JobHandle::job_id)
    }

    /// Start `job` in the background.
    ///
    /// Fails with [`AppError::JobInProgress`] while the previous job's outcome
    /// has not been received yet. Must be called from within a Tokio runtime.
    pub fn submit(&mut self, job: Job) -> Result<Uuid, AppError> {
        if self.state() == JobState::Running {
            return Err(AppError::JobInProgress);
        }
        let handle = JobHandle::spawn(
            self.fetcher.clone(),
            self.parser.clone(),
            job,
            self.reporter.clone(),
        );
        let job_id = handle.job_id();
        self.active = Some(handle);
        Ok(job_id)
    }

    /// Non-blocking poll of the active job; see [`JobHandle::poll`].
    pub fn poll(&mut self) -> Option<Outcome> {
        self.active.as_mut().and_then(JobHandle::poll)
    }

    /// Wait for the active job; see [`JobHandle::wait`].
    pub async fn wait(&mut self) -> Option<Outcome> {
        match self.active.as_mut() {
            Some(handle) => handle.wait().await,
            None => None,
        }
    }

    /// Detach the active job and return the runner to `Idle`.
    ///
    /// The job keeps running; dropping the returned handle discards its outcome.
    pub fn abandon(&mut self) -> Option<JobHandle> {
        self.active.take()
    }
}
