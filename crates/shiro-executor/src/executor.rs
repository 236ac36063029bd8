//! The pooled connection interface: acquire a dedicated connection bound
//! to the run context, then execute a statement / query / scalar against
//! it, each respecting a cancellable context.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Pool};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use shiro_types::Value;

use crate::convert::from_mysql_value;
use crate::error::ExecutorError;
use crate::hooks::{Observer, Validator};

pub type Row = Vec<Value>;

/// A dedicated connection bound to the run context, carrying its own
/// validator/observer pair so every send on it is checked and counted the
/// same way regardless of which oracle is driving it.
#[async_trait]
pub trait Connection: Send {
    async fn exec_statement(&mut self, sql: &str, cancel: &CancellationToken) -> Result<u64, ExecutorError>;
    async fn exec_query(&mut self, sql: &str, cancel: &CancellationToken) -> Result<Vec<Row>, ExecutorError>;
    async fn exec_scalar(&mut self, sql: &str, cancel: &CancellationToken) -> Result<Option<Value>, ExecutorError>;
}

#[async_trait]
pub trait Executor: Send + Sync {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<Box<dyn Connection>, ExecutorError>;
}

/// Maps a `mysql_async` error onto the three-way classification: server
/// errors keep their code, everything else (I/O, driver, URL parsing) is
/// treated as an infrastructure failure.
fn map_mysql_err(err: mysql_async::Error) -> ExecutorError {
    match err {
        mysql_async::Error::Server(server_err) => {
            ExecutorError::from_server(Some(server_err.code), server_err.message)
        }
        other => ExecutorError::Infra(other.to_string()),
    }
}

/// A pooled executor backed by a live `mysql_async::Pool`. Every call a
/// connection it hands out makes is bounded by `statement_timeout`, a
/// per-statement child deadline separate from (and usually shorter than)
/// `cancel`, which only fires on a run-wide shutdown.
pub struct MySqlExecutor {
    pool: Pool,
    validator: Arc<dyn Validator>,
    observer: Arc<dyn Observer>,
    statement_timeout: Duration,
}

impl MySqlExecutor {
    pub fn new(
        dsn: &str,
        validator: Arc<dyn Validator>,
        observer: Arc<dyn Observer>,
        statement_timeout_ms: u64,
    ) -> Self {
        Self {
            pool: Pool::new(dsn),
            validator,
            observer,
            statement_timeout: Duration::from_millis(statement_timeout_ms),
        }
    }

    pub async fn close(self) -> Result<(), ExecutorError> {
        self.pool.disconnect().await.map_err(map_mysql_err)
    }
}

#[async_trait]
impl Executor for MySqlExecutor {
    async fn acquire(&self, cancel: &CancellationToken) -> Result<Box<dyn Connection>, ExecutorError> {
        let conn = tokio::select! {
            res = self.pool.get_conn() => res.map_err(map_mysql_err)?,
            () = cancel.cancelled() => return Err(ExecutorError::Infra("cancelled".to_string())),
        };
        Ok(Box::new(MySqlConnection {
            conn,
            validator: self.validator.clone(),
            observer: self.observer.clone(),
            statement_timeout: self.statement_timeout,
        }))
    }
}

struct MySqlConnection {
    conn: Conn,
    validator: Arc<dyn Validator>,
    observer: Arc<dyn Observer>,
    statement_timeout: Duration,
}

impl MySqlConnection {
    fn pre_send(&self, sql: &str) -> Result<(), ExecutorError> {
        self.validator
            .validate(sql)
            .map_err(ExecutorError::ValidatorRejected)
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    async fn exec_statement(&mut self, sql: &str, cancel: &CancellationToken) -> Result<u64, ExecutorError> {
        self.pre_send(sql)?;
        let start = Instant::now();
        let result = tokio::select! {
            res = self.conn.query_drop(sql) => res,
            () = cancel.cancelled() => {
                self.observer.observe(sql, true, start.elapsed(), Some("cancelled"));
                return Err(ExecutorError::Infra("cancelled".to_string()));
            }
            () = tokio::time::sleep(self.statement_timeout) => {
                self.observer.observe(sql, true, start.elapsed(), Some("statement timed out"));
                return Err(ExecutorError::Infra("statement timed out".to_string()));
            }
        };
        match result {
            Ok(()) => {
                let affected = self.conn.affected_rows();
                self.observer.observe(sql, true, start.elapsed(), None);
                debug!(sql, affected, "exec_statement ok");
                Ok(affected)
            }
            Err(err) => {
                let exec_err = map_mysql_err(err);
                self.observer
                    .observe(sql, true, start.elapsed(), Some(&exec_err.to_string()));
                Err(exec_err)
            }
        }
    }

    async fn exec_query(&mut self, sql: &str, cancel: &CancellationToken) -> Result<Vec<Row>, ExecutorError> {
        self.pre_send(sql)?;
        let start = Instant::now();
        let result = tokio::select! {
            res = self.conn.query::<mysql_async::Row, _>(sql) => res,
            () = cancel.cancelled() => {
                self.observer.observe(sql, true, start.elapsed(), Some("cancelled"));
                return Err(ExecutorError::Infra("cancelled".to_string()));
            }
            () = tokio::time::sleep(self.statement_timeout) => {
                self.observer.observe(sql, true, start.elapsed(), Some("statement timed out"));
                return Err(ExecutorError::Infra("statement timed out".to_string()));
            }
        };
        match result {
            Ok(rows) => {
                self.observer.observe(sql, true, start.elapsed(), None);
                Ok(rows.into_iter().map(row_to_values).collect())
            }
            Err(err) => {
                let exec_err = map_mysql_err(err);
                self.observer
                    .observe(sql, true, start.elapsed(), Some(&exec_err.to_string()));
                Err(exec_err)
            }
        }
    }

    async fn exec_scalar(&mut self, sql: &str, cancel: &CancellationToken) -> Result<Option<Value>, ExecutorError> {
        let rows = self.exec_query(sql, cancel).await?;
        Ok(rows.into_iter().next().and_then(|mut row| {
            if row.is_empty() {
                None
            } else {
                Some(row.remove(0))
            }
        }))
    }
}

fn row_to_values(row: mysql_async::Row) -> Row {
    row.unwrap().into_iter().map(from_mysql_value).collect()
}
