//! The validator and observer hooks the executor calls around every send.

use std::time::Duration;

/// An external syntactic parser consulted before a statement is sent.
/// Kept as a trait object so the SQL generator's grammar stays a pluggable
/// concern, as the interface names it.
pub trait Validator: Send + Sync {
    fn validate(&self, sql: &str) -> Result<(), String>;
}

/// Accepts everything; used when no validator is configured.
pub struct AcceptAllValidator;

impl Validator for AcceptAllValidator {
    fn validate(&self, _sql: &str) -> Result<(), String> {
        Ok(())
    }
}

/// A stats hook invoked after every send attempt, valid or not.
pub trait Observer: Send + Sync {
    fn observe(&self, sql: &str, valid: bool, duration: Duration, error: Option<&str>);
}

/// Does nothing; used when no observer is configured.
pub struct NullObserver;

impl Observer for NullObserver {
    fn observe(&self, _sql: &str, _valid: bool, _duration: Duration, _error: Option<&str>) {}
}
