//! Load-time normalization rules applied after YAML deserialization.

use crate::error::ConfigError;
use crate::model::ShiroConfig;

/// Applies the documented normalization rules in place:
///
/// - when TQS is enabled, DSG is forced on, the DML action weight becomes
///   0 and the Query action weight is raised to at least 1;
/// - when Views is on, the DDL action weight is raised to at least 1,
///   otherwise it is forced to 0;
/// - `plan_cache_prob`/`non_prepared_plan_cache_prob` default to 50 when
///   `<= 0`;
/// - `features.join_count` is capped at `max_join_tables`;
/// - the database name is injected into the DSN path when present.
pub fn normalize(config: &mut ShiroConfig) -> Result<(), ConfigError> {
    if config.workers == 0 {
        return Err(ConfigError::Invalid("workers must be > 0".to_string()));
    }

    if config.tqs.enabled {
        config.features.dsg = true;
        config.weights.actions.dml = 0;
        if config.weights.actions.query < 1 {
            config.weights.actions.query = 1;
        }
    }

    if config.features.views {
        if config.weights.actions.ddl < 1 {
            config.weights.actions.ddl = 1;
        }
    } else {
        config.weights.actions.ddl = 0;
    }

    if config.plan_cache_prob <= 0 {
        config.plan_cache_prob = 50;
    }
    if config.non_prepared_plan_cache_prob <= 0 {
        config.non_prepared_plan_cache_prob = 50;
    }

    if config.weights.features.join_count > config.max_join_tables {
        config.weights.features.join_count = config.max_join_tables;
    }

    if !config.database.is_empty() && !config.dsn.contains(&config.database) {
        config.dsn = inject_database(&config.dsn, &config.database);
    }

    Ok(())
}

/// Appends `/<database>` to a `host:port` style DSN that carries no path
/// component yet. Leaves DSNs that already have a path (e.g. a previous
/// normalization pass, or a user-specified one) untouched.
fn inject_database(dsn: &str, database: &str) -> String {
    if dsn.contains('/') {
        dsn.to_string()
    } else {
        format!("{dsn}/{database}")
    }
}
