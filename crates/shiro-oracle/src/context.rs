//! The parameters an [`Oracle`](crate::oracle::Oracle) receives on each run.

use tokio_util::sync::CancellationToken;

use shiro_executor::Connection;
use shiro_types::SchemaState;

use crate::generator::{FeatureBias, Generator};

/// Bundles the executor connection, the generator, the current schema and
/// the cancellation token an oracle needs, per §4.2's `Run(ctx, exec, gen,
/// state)` signature. Held as a short-lived borrow for the duration of one
/// oracle invocation.
pub struct OracleContext<'a> {
    pub conn: &'a mut dyn Connection,
    pub generator: &'a mut dyn Generator,
    pub schema: &'a SchemaState,
    pub bias: FeatureBias,
    pub cancel: &'a CancellationToken,
    pub round_scale: u32,
}
