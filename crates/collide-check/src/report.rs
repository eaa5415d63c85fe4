use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::case::TestCase;
use crate::errors::TransportError;
use crate::expectation::{Judgement, Observation, ResponseBody};
use crate::load::LoadSummary;
use crate::transport::PreparedRequest;

const RULE: &str = "============================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Warning,
    Failed,
    TransportError,
    ProtocolMismatch,
    HarnessError,
    Skipped,
}

impl Outcome {
    /// Outcomes that make the whole run unsuccessful
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Outcome::Failed
                | Outcome::TransportError
                | Outcome::ProtocolMismatch
                | Outcome::HarnessError
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Passed => "PASS",
            Outcome::Warning => "WARN",
            Outcome::Failed => "FAIL",
            Outcome::TransportError => "NET",
            Outcome::ProtocolMismatch => "BODY",
            Outcome::HarnessError => "BUG",
            Outcome::Skipped => "SKIP",
        }
    }
}

impl From<&Judgement> for Outcome {
    fn from(judgement: &Judgement) -> Self {
        match judgement {
            Judgement::Pass(_) => Outcome::Passed,
            Judgement::Warn(_) => Outcome::Warning,
            Judgement::Fail(_) => Outcome::Failed,
            Judgement::Mismatch(_) => Outcome::ProtocolMismatch,
        }
    }
}

/// Recorded outcome of one test case
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub case: String,
    pub method: String,
    pub url: String,
    pub expectation: String,
    pub status: Option<u16>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    pub outcome: Outcome,
    pub detail: String,
}

impl Verdict {
    pub(crate) fn skipped(case: &TestCase, detail: String) -> Self {
        Self {
            case: case.name.clone(),
            method: case.endpoint.method.to_string(),
            url: case.request_target(),
            expectation: case.expectation.describe(),
            status: None,
            elapsed: Duration::ZERO,
            body: None,
            raw_body: None,
            outcome: Outcome::Skipped,
            detail,
        }
    }

    pub(crate) fn harness_error(case: &TestCase, detail: String) -> Self {
        Self {
            outcome: Outcome::HarnessError,
            ..Self::skipped(case, detail)
        }
    }

    pub(crate) fn transport_error(
        case: &TestCase,
        request: &PreparedRequest,
        error: &TransportError,
        elapsed: Duration,
    ) -> Self {
        Self {
            url: request.url.to_string(),
            elapsed,
            outcome: Outcome::TransportError,
            ..Self::skipped(case, error.to_string())
        }
    }

    pub(crate) fn observed(
        case: &TestCase,
        request: &PreparedRequest,
        observation: Observation,
        outcome: Outcome,
        detail: String,
    ) -> Self {
        let (body, raw_body) = match observation.body {
            ResponseBody::Json(value) => (Some(value), None),
            ResponseBody::Text(text) => (None, Some(text)),
            ResponseBody::Empty => (None, None),
        };

        Self {
            url: request.url.to_string(),
            status: Some(observation.status.as_u16()),
            elapsed: observation.elapsed,
            body,
            raw_body,
            outcome,
            ..Self::skipped(case, detail)
        }
    }
}

/// Count of verdicts per outcome
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    pub transport_errors: usize,
    pub protocol_mismatches: usize,
    pub harness_errors: usize,
    pub skipped: usize,
}

impl Summary {
    fn record(&mut self, outcome: Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Warning => self.warnings += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::TransportError => self.transport_errors += 1,
            Outcome::ProtocolMismatch => self.protocol_mismatches += 1,
            Outcome::HarnessError => self.harness_errors += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cases: {} passed, {} warnings, {} failed, {} transport errors, \
             {} protocol mismatches, {} harness errors, {} skipped",
            self.total,
            self.passed,
            self.warnings,
            self.failed,
            self.transport_errors,
            self.protocol_mismatches,
            self.harness_errors,
            self.skipped
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub verdicts: Vec<Verdict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadSummary>,
    pub summary: Summary,
}

impl Report {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            started_at: Utc::now(),
            verdicts: Vec::new(),
            load: None,
            summary: Summary::default(),
        }
    }

    pub fn push(&mut self, verdict: Verdict) {
        self.summary.record(verdict.outcome);
        self.verdicts.push(verdict);
    }

    pub fn verdict(&self, case: &str) -> Option<&Verdict> {
        self.verdicts.iter().find(|verdict| verdict.case == case)
    }

    /// No failing verdict and no failed load sample
    pub fn is_success(&self) -> bool {
        !self
            .verdicts
            .iter()
            .any(|verdict| verdict.outcome.is_failure())
            && self.load.as_ref().is_none_or(|load| load.failed == 0)
    }

    /// 0 on success, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Human-readable rendering of a report
pub fn render_report(report: &Report, verbose: bool) -> String {
    Rendered { report, verbose }.to_string()
}

pub fn render_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

struct Rendered<'a> {
    report: &'a Report,
    verbose: bool,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;

        writeln!(f, "{RULE}")?;
        writeln!(
            f,
            " Contract run against {} ({})",
            report.base_url,
            report.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        writeln!(f, "{RULE}")?;

        for verdict in &report.verdicts {
            writeln!(f, "[{}] {}", verdict.outcome.label(), verdict.case)?;
            writeln!(f, "       {} {}", verdict.method, verdict.url)?;
            writeln!(f, "       expect: {}", verdict.expectation)?;
            if let Some(status) = verdict.status {
                writeln!(
                    f,
                    "       HTTP {status} in {}",
                    format_millis(verdict.elapsed)
                )?;
            }
            writeln!(f, "       {}", verdict.detail)?;

            if self.verbose {
                if let Some(body) = &verdict.body {
                    let pretty = serde_json::to_string_pretty(body).map_err(|_| fmt::Error)?;
                    for line in pretty.lines() {
                        writeln!(f, "         {line}")?;
                    }
                } else if let Some(raw) = &verdict.raw_body {
                    writeln!(f, "         {raw}")?;
                }
            }
        }

        if let Some(load) = &report.load {
            writeln!(f, "{RULE}")?;
            writeln!(f, "{load}")?;
        }

        writeln!(f, "{RULE}")?;
        writeln!(f, " {}", report.summary)?;
        writeln!(
            f,
            " Result: {}",
            if report.is_success() { "OK" } else { "FAILED" }
        )?;
        writeln!(f, "{RULE}")
    }
}

pub(crate) fn format_millis(duration: Duration) -> String {
    format!("{:.1} ms", duration.as_secs_f64() * 1000.0)
}

pub(crate) fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}
