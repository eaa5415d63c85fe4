use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::case::{Captures, TestCase};
use crate::config::HarnessConfig;
use crate::errors::{HarnessError, PrepareError};
use crate::expectation::{Judgement, Observation};
use crate::report::{Outcome, Report, Verdict};
use crate::transport::{HttpTransport, Transport};
use crate::validation::BaseUrl;

/// Runs test cases against one collaborator
#[derive(Clone)]
pub struct Checker {
    base_url: BaseUrl,
    transport: Arc<dyn Transport>,
}

impl Checker {
    pub fn new(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(
            config.base_url.clone(),
            Arc::new(transport),
        ))
    }

    pub fn with_transport(base_url: BaseUrl, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url,
            transport,
        }
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Execute every case in order. Produces exactly one verdict per case and
    /// never stops early.
    pub async fn run(&self, cases: &[TestCase]) -> Report {
        info!(base_url = %self.base_url, cases = cases.len(), "Starting contract run");

        let mut report = Report::new(self.base_url.to_string());
        let mut captures = Captures::default();

        for case in cases {
            let verdict = self.run_case(case, &mut captures).await;
            report.push(verdict);
        }

        info!(
            passed = report.summary.passed,
            warnings = report.summary.warnings,
            failed = report.summary.failed,
            transport_errors = report.summary.transport_errors,
            protocol_mismatches = report.summary.protocol_mismatches,
            harness_errors = report.summary.harness_errors,
            skipped = report.summary.skipped,
            "Contract run finished"
        );
        report
    }

    #[instrument(skip_all, fields(case = %case.name, endpoint = case.endpoint.name))]
    pub async fn run_case(&self, case: &TestCase, captures: &mut Captures) -> Verdict {
        if let Some(name) = case
            .expectation
            .required_captures()
            .into_iter()
            .find(|name| captures.get(name).is_none())
        {
            let reason = PrepareError::MissingCapture(name.to_string());
            info!(%reason, "Skipping case");
            return Verdict::skipped(case, reason.to_string());
        }

        let request = match case.prepare(&self.base_url, captures) {
            Ok(request) => request,
            Err(err @ PrepareError::MissingCapture(_)) => {
                info!(reason = %err, "Skipping case");
                return Verdict::skipped(case, err.to_string());
            }
            Err(err) => {
                error!(error = %err, "Could not prepare request");
                return Verdict::harness_error(case, err.to_string());
            }
        };

        debug!(method = %request.method, url = %request.url, "Sending request");
        let started = Instant::now();
        let response = match self.transport.execute(&request).await {
            Ok(response) => response,
            Err(err) => {
                let elapsed = started.elapsed();
                warn!(error = %err, elapsed_ms = elapsed.as_millis() as u64, "Transport error");
                return Verdict::transport_error(case, &request, &err, elapsed);
            }
        };

        let observation = Observation::from_raw(response);
        debug!(
            status = observation.status.as_u16(),
            elapsed_ms = observation.elapsed.as_millis() as u64,
            "Received response"
        );

        let evaluated = panic::catch_unwind(AssertUnwindSafe(|| {
            case.expectation.evaluate(&observation, captures)
        }));
        let judgement = match evaluated {
            Ok(judgement) => judgement,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "Expectation panicked");
                return Verdict::observed(
                    case,
                    &request,
                    observation,
                    Outcome::HarnessError,
                    format!("expectation panicked: {message}"),
                );
            }
        };

        match &judgement {
            Judgement::Pass(detail) => debug!(%detail, "Case passed"),
            Judgement::Warn(detail) => warn!(%detail, "Case passed with a warning"),
            Judgement::Fail(detail) => warn!(%detail, "Case failed"),
            Judgement::Mismatch(detail) => warn!(%detail, "Response did not match protocol"),
        }

        if judgement.is_pass() {
            store_captures(case, &observation, captures);
        }

        let outcome = Outcome::from(&judgement);
        let detail = match judgement {
            Judgement::Pass(detail)
            | Judgement::Warn(detail)
            | Judgement::Fail(detail)
            | Judgement::Mismatch(detail) => detail,
        };
        Verdict::observed(case, &request, observation, outcome, detail)
    }
}

/// Build a checker from `config` and run `cases` with it
pub async fn run(config: &HarnessConfig, cases: &[TestCase]) -> Result<Report, HarnessError> {
    let checker = Checker::new(config)?;
    Ok(checker.run(cases).await)
}

fn store_captures(case: &TestCase, observation: &Observation, captures: &mut Captures) {
    for capture in &case.captures {
        match observation
            .body
            .json()
            .and_then(|body| body.pointer(&capture.pointer))
        {
            Some(value) => {
                debug!(name = %capture.name, %value, "Captured value");
                captures.insert(capture.name.clone(), value.clone());
            }
            None => warn!(
                name = %capture.name,
                pointer = %capture.pointer,
                "Capture pointer matched nothing"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
