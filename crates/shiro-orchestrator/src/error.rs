//! The orchestrator's own error surface, distinct from the lower-level
//! `ExecutorError`/`ConfigError`/`ReportError` it wraps: setup failures the
//! run loop cannot recover from and must abort on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("config error: {0}")]
    Config(#[from] shiro_config::ConfigError),

    #[error("executor error acquiring initial connection: {0}")]
    Executor(#[from] shiro_executor::ExecutorError),

    #[error("schema error: {0}")]
    Schema(#[from] shiro_types::schema::SchemaError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
