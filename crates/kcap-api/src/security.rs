//! Input validation for the capture front-ends.
//!
//! REST and relay front-ends share the orchestration core and differ only
//! in what they accept: the relay checks submitted URLs against a
//! configurable regex allow-list before any job is created.

use regex::Regex;

use crate::error::{ApiError, ApiResult};

/// Compiled allow-list of permitted capture URL patterns.
#[derive(Debug)]
pub struct UrlAllowList {
    patterns: Vec<Regex>,
}

impl UrlAllowList {
    /// Compile an allow-list from configured patterns.
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// A URL is allowed when any pattern matches it.
    pub fn is_allowed(&self, url: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(url))
    }
}

/// Reject list/delete filter values that would break a label selector.
pub fn ensure_label_safe(field: &str, value: &str) -> ApiResult<()> {
    if kcap_models::request::is_label_safe(value) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "{} must consist of alphanumeric characters, '-', '_' or '.', \
             and must start and end with an alphanumeric character",
            field
        )))
    }
}
