//! Fan-out executor
//!
//! Runs independent generation tasks on a fixed-size worker pool and waits
//! for all of them. A failing task never cancels its siblings: every task ends
//! up either in `results` or in `failures`, so for N tasks
//! `results.len() + failures.len() == N`.
//!
//! Workers pull from a shared queue. Each task runs in its own spawned tokio
//! task so a panic is reported as that task's failure rather than tearing
//! down the worker. Once the cancellation token fires, running tasks are
//! aborted and queued ones are drained as [`GenerationError::Cancelled`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::generator::GenerationError;

type TaskFuture<R> = Pin<Box<dyn Future<Output = Result<R, GenerationError>> + Send>>;

/// One labelled unit of fan-out work
pub struct FanOutTask<R> {
    pub label: String,
    future: TaskFuture<R>,
}

impl<R> FanOutTask<R> {
    pub fn new<F>(label: impl Into<String>, future: F) -> Self
    where
        F: Future<Output = Result<R, GenerationError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            future: Box::pin(future),
        }
    }
}

/// A task that did not produce a result
#[derive(Debug)]
pub struct TaskFailure {
    pub label: String,
    pub error: GenerationError,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label, self.error)
    }
}

/// One or more fan-out tasks failed
#[derive(Debug, Error)]
#[error("{} of {total} tasks failed: {}", .failures.len(), join_failures(.failures))]
pub struct AggregateError {
    pub total: usize,
    pub failures: Vec<TaskFailure>,
}

impl AggregateError {
    /// True when every failure is a cancellation
    pub fn is_cancelled(&self) -> bool {
        !self.failures.is_empty() && self.failures.iter().all(|f| f.error.is_cancelled())
    }
}

fn join_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of a fan-out run
///
/// Neither list follows the input order.
#[derive(Debug)]
pub struct FanOutReport<R> {
    pub results: Vec<R>,
    pub failures: Vec<TaskFailure>,
}

impl<R> FanOutReport<R> {
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// All results, or an [`AggregateError`] if any task failed
    pub fn into_result(self) -> Result<Vec<R>, AggregateError> {
        if self.failures.is_empty() {
            return Ok(self.results);
        }
        Err(AggregateError {
            total: self.total(),
            failures: self.failures,
        })
    }
}

/// Bounded worker pool for fan-out/fan-in
#[derive(Debug, Clone, Copy)]
pub struct FanOutExecutor {
    workers: usize,
}

impl FanOutExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every task and waits for all of them
    pub async fn run<R>(&self, tasks: Vec<FanOutTask<R>>, cancel: &CancellationToken) -> FanOutReport<R>
    where
        R: Send + 'static,
    {
        let total = tasks.len();
        let mut report = FanOutReport {
            results: Vec::with_capacity(total),
            failures: Vec::new(),
        };
        if total == 0 {
            return report;
        }

        let queue = Arc::new(Mutex::new(tasks.into_iter()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();

        for worker in 0..self.workers.min(total) {
            let queue = queue.clone();
            let tx = tx.clone();
            let cancel = cancel.clone();
            workers.spawn(async move {
                loop {
                    let Some(task) = queue.lock().next() else {
                        break;
                    };
                    let label = task.label;
                    let outcome = if cancel.is_cancelled() {
                        Err(GenerationError::Cancelled)
                    } else {
                        debug!(worker, task = %label, "Running task");
                        run_isolated(task.future, &cancel).await
                    };
                    if tx.send((label, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(tx);

        while let Some((label, outcome)) = rx.recv().await {
            match outcome {
                Ok(value) => report.results.push(value),
                Err(error) => {
                    warn!(task = %label, "Task failed: {}", error);
                    report.failures.push(TaskFailure { label, error });
                }
            }
        }

        while workers.join_next().await.is_some() {}

        debug!(
            total,
            succeeded = report.results.len(),
            failed = report.failures.len(),
            "Fan-out finished"
        );
        report
    }
}

/// Runs one task in its own tokio task, turning panics and cancellation into errors
async fn run_isolated<R>(future: TaskFuture<R>, cancel: &CancellationToken) -> Result<R, GenerationError>
where
    R: Send + 'static,
{
    let mut handle = tokio::spawn(future);

    tokio::select! {
        joined = &mut handle => match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => Err(GenerationError::Aborted(panic_message(e.into_panic()))),
            Err(e) => Err(GenerationError::Aborted(e.to_string())),
        },
        _ = cancel.cancelled() => {
            handle.abort();
            Err(GenerationError::Cancelled)
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}
