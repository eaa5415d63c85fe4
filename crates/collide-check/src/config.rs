use std::time::Duration;

use crate::errors::HarnessError;
use crate::validation::{BaseUrl, validate_base_url};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_LOAD_WORKERS: usize = 5;

/// Settings for one run. Built once, then only read.
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub base_url: BaseUrl,
    pub timeout: Duration,
    pub load_workers: usize,
}

impl HarnessConfig {
    pub fn new(base_url: &str) -> Result<Self, HarnessError> {
        Ok(Self {
            base_url: validate_base_url(base_url)?,
            timeout: DEFAULT_TIMEOUT,
            load_workers: DEFAULT_LOAD_WORKERS,
        })
    }

    /// A zero timeout would fail every request before it is sent
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, HarnessError> {
        if timeout.is_zero() {
            return Err(HarnessError::ZeroTimeout);
        }
        self.timeout = timeout;
        Ok(self)
    }

    /// At least one worker always runs
    pub fn with_load_workers(mut self, workers: usize) -> Self {
        self.load_workers = workers.max(1);
        self
    }
}
