//! Schema rotation (§4.7 "Rotation"): once a generation has run its
//! course the working database is retired and a freshly named sibling
//! (`<base>_<db_seq>`) takes over, so long-running campaigns don't grow a
//! single schema without bound.

use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use shiro_executor::{Connection, ExecutorError};
use shiro_types::SchemaState;

use crate::state::Shared;

const MAX_ROTATION_ATTEMPTS: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Creates `<base>_<db_seq + 1>`, switches the connection to it, drops the
/// database it replaces, and resets the `gen_mu`-guarded state to match.
/// Retries transient failures with exponential backoff; gives up and
/// returns the last error after [`MAX_ROTATION_ATTEMPTS`].
pub async fn rotate(
    shared: &Shared,
    conn: &mut dyn Connection,
    base_database: &str,
    cancel: &CancellationToken,
) -> Result<String, ExecutorError> {
    let prev_seq = shared.lock_gen().db_seq;
    let next_seq = prev_seq + 1;
    let new_name = format!("{base_database}_{next_seq}");
    let old_name =
        if prev_seq == 0 { base_database.to_string() } else { format!("{base_database}_{prev_seq}") };

    let mut attempt = 0;
    loop {
        match switch_database(conn, &new_name, cancel).await {
            Ok(()) => break,
            Err(err) => {
                attempt += 1;
                if attempt >= MAX_ROTATION_ATTEMPTS {
                    return Err(err);
                }
                sleep(BASE_BACKOFF * 2u32.pow(attempt - 1)).await;
            }
        }
    }

    // Best-effort: a stale database left behind on failure is cleaned up
    // by whichever worker rotates next, not a fatal condition here.
    let _ = conn.exec_statement(&format!("DROP DATABASE IF EXISTS `{old_name}`"), cancel).await;

    shared.lock_gen().reset_for_rotation(
        SchemaState::new(new_name.clone()),
        next_seq,
        shared.config.max_insert_statements as usize,
    );
    shared.lock_stats().counters.rotations += 1;

    Ok(new_name)
}

async fn switch_database(conn: &mut dyn Connection, name: &str, cancel: &CancellationToken) -> Result<(), ExecutorError> {
    conn.exec_statement(&format!("CREATE DATABASE IF NOT EXISTS `{name}`"), cancel).await?;
    conn.exec_statement(&format!("USE `{name}`"), cancel).await?;
    Ok(())
}
