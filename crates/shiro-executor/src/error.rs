use crate::classify::ErrorClass;
use thiserror::Error;

/// The executor-level error surface: a statement was rejected before
/// sending (validator), the server reported an error, or the connection
/// infrastructure itself failed.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("validator rejected statement: {0}")]
    ValidatorRejected(String),

    #[error("server error ({code:?}): {message}")]
    Server { code: Option<u16>, message: String },

    #[error("infrastructure error: {0}")]
    Infra(String),
}

impl ExecutorError {
    pub fn from_server(code: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        match crate::classify::classify(code, &message) {
            ErrorClass::Whitelisted | ErrorClass::Server => ExecutorError::Server { code, message },
            ErrorClass::Infra => ExecutorError::Infra(message),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ExecutorError::ValidatorRejected(_) => ErrorClass::Whitelisted,
            ExecutorError::Server { code, message } => {
                crate::classify::classify(*code, message)
            }
            ExecutorError::Infra(_) => ErrorClass::Infra,
        }
    }

    pub fn is_whitelisted(&self) -> bool {
        matches!(self.class(), ErrorClass::Whitelisted)
    }
}

impl From<ExecutorError> for shiro_types::ShiroError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::ValidatorRejected(msg) => shiro_types::ShiroError::WhitelistRejected(msg),
            ExecutorError::Server { code, message } => shiro_types::ShiroError::ServerError {
                code: code.unwrap_or(0),
                message,
            },
            ExecutorError::Infra(msg) => shiro_types::ShiroError::Infra(msg),
        }
    }
}
