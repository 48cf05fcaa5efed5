//! Per-call-site failure policies.
//!
//! Every outbound call returns a `Result`; the call site picks exactly one
//! [`CallPolicy`] for it, so no forge call is left implicitly unguarded.

use tracing::warn;

use crate::error::Result;

/// What a call site does with a failed outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPolicy {
    /// Abort the whole operation with the error.
    Propagate,
    /// Log and continue as if the call returned nothing.
    DegradeToEmpty,
    /// Log and drop this single entry, keep the rest.
    SkipEntry,
}

impl CallPolicy {
    /// Apply the policy to `result`.
    ///
    /// `Ok(Some(v))` on success, `Ok(None)` when the failure was absorbed,
    /// `Err` when the policy is [`CallPolicy::Propagate`].
    pub fn apply<T>(self, site: &'static str, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => match self {
                CallPolicy::Propagate => Err(err),
                CallPolicy::DegradeToEmpty => {
                    warn!(event = "forge.degraded", site = site, error = %err);
                    Ok(None)
                }
                CallPolicy::SkipEntry => {
                    warn!(event = "forge.entry_skipped", site = site, error = %err);
                    Ok(None)
                }
            },
        }
    }
}
