pub mod case;
pub mod checker;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod errors;
pub mod expectation;
pub mod load;
pub mod report;
pub mod suites;
pub mod transport;
pub mod validation;

pub use case::{Captures, TestCase};
pub use checker::{Checker, run};
pub use config::HarnessConfig;
pub use errors::{CaseError, HarnessError, TransportError};
pub use expectation::{Expectation, Judgement, Observation};
pub use load::{LoadProbe, LoadSummary};
pub use report::{Outcome, Report, Verdict, render_json, render_report};
