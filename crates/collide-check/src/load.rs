use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::case::{Captures, TestCase};
use crate::checker::Checker;
use crate::errors::TransportError;
use crate::report::{format_millis, serialize_millis};
use crate::transport::{RawResponse, Transport};
use crate::validation::BaseUrl;

/// One worker's result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSample {
    pub worker: usize,
    pub status: Option<u16>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LoadSample {
    /// Got a 2xx response
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|status| (200..300).contains(&status))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadSummary {
    pub case: String,
    pub workers: usize,
    pub samples: Vec<LoadSample>,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(rename = "min_ms", serialize_with = "serialize_optional_millis")]
    pub min: Option<Duration>,
    #[serde(rename = "avg_ms", serialize_with = "serialize_optional_millis")]
    pub avg: Option<Duration>,
    #[serde(rename = "max_ms", serialize_with = "serialize_optional_millis")]
    pub max: Option<Duration>,
}

impl LoadSummary {
    /// Timing covers every sample that produced a response, whatever its
    /// status. Samples without a response only count as failures.
    pub fn from_samples(case: impl Into<String>, samples: Vec<LoadSample>) -> Self {
        let succeeded = samples.iter().filter(|sample| sample.succeeded()).count();
        let timed: Vec<Duration> = samples
            .iter()
            .filter(|sample| sample.status.is_some())
            .map(|sample| sample.elapsed)
            .collect();

        let avg = match timed.len() {
            0 => None,
            count => Some(timed.iter().sum::<Duration>() / count as u32),
        };

        Self {
            case: case.into(),
            workers: samples.len(),
            failed: samples.len() - succeeded,
            succeeded,
            min: timed.iter().min().copied(),
            avg,
            max: timed.iter().max().copied(),
            samples,
        }
    }
}

impl fmt::Display for LoadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " Load probe `{}`: {} workers, {} ok, {} failed",
            self.case, self.workers, self.succeeded, self.failed
        )?;

        if let (Some(min), Some(avg), Some(max)) = (self.min, self.avg, self.max) {
            write!(
                f,
                "\n   min {} / avg {} / max {}",
                format_millis(min),
                format_millis(avg),
                format_millis(max)
            )?;
        }

        for sample in self.samples.iter().filter(|sample| !sample.succeeded()) {
            match (&sample.error, sample.status) {
                (Some(error), _) => write!(f, "\n   worker {}: {error}", sample.worker)?,
                (None, Some(status)) => write!(f, "\n   worker {}: HTTP {status}", sample.worker)?,
                (None, None) => write!(f, "\n   worker {}: no response", sample.worker)?,
            }
        }

        Ok(())
    }
}

/// A worker's response, and the wall time until it gave up when there is none
type WorkerResult = (Result<RawResponse, TransportError>, Duration);

/// Sends the same request from several workers at once
#[derive(Clone)]
pub struct LoadProbe {
    base_url: BaseUrl,
    transport: Arc<dyn Transport>,
}

impl LoadProbe {
    pub fn new(checker: &Checker) -> Self {
        Self {
            base_url: checker.base_url().clone(),
            transport: checker.transport(),
        }
    }

    #[instrument(skip_all, fields(case = %case.name, workers = workers))]
    pub async fn run(&self, case: &TestCase, workers: usize) -> LoadSummary {
        let request = match case.prepare(&self.base_url, &Captures::default()) {
            Ok(request) => Arc::new(request),
            Err(err) => {
                warn!(error = %err, "Load probe request could not be prepared");
                let samples = (0..workers)
                    .map(|worker| LoadSample {
                        worker,
                        status: None,
                        elapsed: Duration::ZERO,
                        error: Some(err.to_string()),
                    })
                    .collect();
                return LoadSummary::from_samples(case.name.clone(), samples);
            }
        };

        let handles: Vec<JoinHandle<WorkerResult>> = (0..workers)
            .map(|_| {
                let transport = Arc::clone(&self.transport);
                let request = Arc::clone(&request);
                tokio::spawn(async move {
                    let started = Instant::now();
                    let result = transport.execute(&request).await;
                    (result, started.elapsed())
                })
            })
            .collect();

        // Each worker owns one slot; the summary is built only after every
        // handle has been awaited.
        let mut slots: Vec<Option<LoadSample>> = vec![None; workers];
        for (worker, handle) in handles.into_iter().enumerate() {
            let sample = match handle.await {
                Ok((Ok(response), _)) => LoadSample {
                    worker,
                    status: Some(response.status.as_u16()),
                    elapsed: response.elapsed,
                    error: None,
                },
                Ok((Err(err), elapsed)) => LoadSample {
                    worker,
                    status: None,
                    elapsed,
                    error: Some(err.to_string()),
                },
                Err(join_err) => LoadSample {
                    worker,
                    status: None,
                    elapsed: Duration::ZERO,
                    error: Some(format!("worker did not finish: {join_err}")),
                },
            };
            slots[worker] = Some(sample);
        }

        let samples = slots.into_iter().flatten().collect();
        let summary = LoadSummary::from_samples(case.name.clone(), samples);
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            avg_ms = summary.avg.map(|avg| avg.as_secs_f64() * 1000.0),
            "Load probe finished"
        );
        summary
    }
}

fn serialize_optional_millis<S: serde::Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => serialize_millis(duration, serializer),
        None => serializer.serialize_none(),
    }
}
