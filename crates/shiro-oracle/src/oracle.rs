//! The oracle contract: a stable short name plus a `Run` operation.

use async_trait::async_trait;

use shiro_types::OracleResult;

use crate::context::OracleContext;

/// An oracle is stateless across calls beyond parameters supplied at
/// construction (§4.2): all mutable state it needs for one run lives in the
/// [`OracleContext`] it's handed.
#[async_trait]
pub trait Oracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut OracleContext<'_>) -> OracleResult;
}
