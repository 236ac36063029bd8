//! A scriptable in-memory [`Executor`]/[`Connection`] pair for tests, used
//! by every crate that needs to drive oracle/plan-cache logic without a
//! live MySQL-wire server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use shiro_types::Value;

use crate::error::ExecutorError;
use crate::executor::{Connection, Executor, Row};

/// One scripted response to the next matching statement/query/scalar
/// call, consumed in FIFO order regardless of the SQL text — callers are
/// expected to script responses in the exact order their code issues
/// calls.
#[derive(Debug, Clone)]
pub enum StubResponse {
    Statement(Result<u64, StubError>),
    Query(Result<Vec<Row>, StubError>),
    Scalar(Result<Option<Value>, StubError>),
}

#[derive(Debug, Clone)]
pub struct StubError {
    pub code: Option<u16>,
    pub message: String,
}

impl From<StubError> for ExecutorError {
    fn from(err: StubError) -> Self {
        ExecutorError::from_server(err.code, err.message)
    }
}

#[derive(Default)]
struct Script {
    responses: VecDeque<StubResponse>,
    calls: Vec<String>,
}

/// An [`Executor`] whose single [`Connection`] replays a pre-loaded
/// sequence of responses.
#[derive(Clone)]
pub struct StubExecutor {
    script: Arc<Mutex<Script>>,
}

impl Default for StubExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl StubExecutor {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
        }
    }

    pub fn push(&self, response: StubResponse) -> &Self {
        self.script.lock().unwrap().responses.push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.script.lock().unwrap().calls.clone()
    }
}

#[async_trait]
impl Executor for StubExecutor {
    async fn acquire(&self, _cancel: &CancellationToken) -> Result<Box<dyn Connection>, ExecutorError> {
        Ok(Box::new(StubConnection {
            script: self.script.clone(),
        }))
    }
}

struct StubConnection {
    script: Arc<Mutex<Script>>,
}

impl StubConnection {
    fn next(&self, sql: &str) -> StubResponse {
        let mut script = self.script.lock().unwrap();
        script.calls.push(sql.to_string());
        script
            .responses
            .pop_front()
            .unwrap_or(StubResponse::Statement(Ok(0)))
    }
}

#[async_trait]
impl Connection for StubConnection {
    async fn exec_statement(&mut self, sql: &str, _cancel: &CancellationToken) -> Result<u64, ExecutorError> {
        match self.next(sql) {
            StubResponse::Statement(res) => res.map_err(Into::into),
            _ => Ok(0),
        }
    }

    async fn exec_query(&mut self, sql: &str, _cancel: &CancellationToken) -> Result<Vec<Row>, ExecutorError> {
        match self.next(sql) {
            StubResponse::Query(res) => res.map_err(Into::into),
            _ => Ok(Vec::new()),
        }
    }

    async fn exec_scalar(&mut self, sql: &str, _cancel: &CancellationToken) -> Result<Option<Value>, ExecutorError> {
        match self.next(sql) {
            StubResponse::Scalar(res) => res.map_err(Into::into),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_responses_in_fifo_order() {
        let stub = StubExecutor::new();
        stub.push(StubResponse::Scalar(Ok(Some(Value::Int(1)))));
        stub.push(StubResponse::Statement(Ok(3)));

        let cancel = CancellationToken::new();
        let mut conn = stub.acquire(&cancel).await.unwrap();
        let scalar = conn.exec_scalar("SELECT 1", &cancel).await.unwrap();
        assert_eq!(scalar, Some(Value::Int(1)));
        let affected = conn.exec_statement("INSERT ...", &cancel).await.unwrap();
        assert_eq!(affected, 3);
        assert_eq!(stub.calls(), vec!["SELECT 1", "INSERT ..."]);
    }

    #[tokio::test]
    async fn scripted_errors_are_classified() {
        let stub = StubExecutor::new();
        stub.push(StubResponse::Statement(Err(StubError {
            code: Some(1064),
            message: "syntax error".to_string(),
        })));
        let cancel = CancellationToken::new();
        let mut conn = stub.acquire(&cancel).await.unwrap();
        let err = conn.exec_statement("BAD SQL", &cancel).await.unwrap_err();
        assert!(err.is_whitelisted());
    }
}
