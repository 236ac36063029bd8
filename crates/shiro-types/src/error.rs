//! Shared error type for the boundaries between components.
//!
//! Each crate defines its own narrower `thiserror` enum for its internal
//! failure modes (`ConfigError`, `DeltaError`, ...) and converts into
//! `ShiroError` only at the seam where a caller outside that crate needs
//! a single type to match on, rather than funnelling every failure
//! through one enum.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShiroError {
    #[error("whitelisted SQL rejected: {0}")]
    WhitelistRejected(String),

    #[error("server returned an error: {message} (code {code})")]
    ServerError { code: u16, message: String },

    #[error("executor infrastructure failure: {0}")]
    Infra(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShiroError {
    /// Best-effort classification used for the `error_reason`/`bug_hint`
    /// annotations described in the error-handling design: a short,
    /// human-facing tag derived from the error text, not a new type.
    pub fn error_reason(&self) -> &'static str {
        match self {
            ShiroError::WhitelistRejected(_) => "whitelist_rejected",
            ShiroError::ServerError { .. } => "server_error",
            ShiroError::Infra(_) => "infra_error",
            ShiroError::Config(_) => "config_error",
            ShiroError::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reason_is_stable_per_variant() {
        let e = ShiroError::ServerError {
            code: 1054,
            message: "Unknown column".into(),
        };
        assert_eq!(e.error_reason(), "server_error");
    }

    #[test]
    fn display_includes_message() {
        let e = ShiroError::WhitelistRejected("DROP TABLE".into());
        assert!(e.to_string().contains("DROP TABLE"));
    }
}
