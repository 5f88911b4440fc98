//! Ordered candidate fallback.
//!
//! Upstream series ids get renamed or discontinued, so each indicator carries
//! a list of candidates. They are tried once each, in order; the first success
//! wins. Failures are logged and collected, and only surface (as
//! [`FetchError::Exhausted`]) when every candidate has failed.

use super::provider::FetchError;
use std::fmt::Display;
use tracing::warn;

/// Run `attempts` in order and return the first `Ok`.
pub fn first_success<T, L, F, I>(column: &str, attempts: I) -> Result<T, FetchError>
where
    I: IntoIterator<Item = (L, F)>,
    L: Display,
    F: FnOnce() -> Result<T, FetchError>,
{
    let mut failures = Vec::new();
    for (label, attempt) in attempts {
        match attempt() {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(column, candidate = %label, error = %e, "candidate failed, trying next");
                failures.push((label.to_string(), e.to_string()));
            }
        }
    }
    Err(FetchError::Exhausted {
        column: column.to_string(),
        failures,
    })
}
