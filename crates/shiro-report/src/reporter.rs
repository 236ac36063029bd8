//! Ties case directory allocation, artifact writing, and upload together
//! (§4.7: "on a captured failure, a case directory is allocated, the
//! schema, recent inserts, the failing statements, and a summary are
//! written to it").

use std::path::{Path, PathBuf};

use shiro_types::OracleResult;
use thiserror::Error;

use crate::case_dir;
use crate::ring::InsertRing;
use crate::summary::{Summary, SummaryContext};
use crate::upload::{NoopPlanReplayerFetcher, NoopUploader, PlanReplayerFetcher, Uploader};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error writing case artifacts: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize summary: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The artifacts produced for one captured case, and where they landed.
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub case_dir: PathBuf,
    pub summary: Summary,
}

/// Writes case artifacts under a configured output root and optionally
/// uploads them / fetches a plan-replayer bundle.
pub struct Reporter {
    root: PathBuf,
    uploader: Box<dyn Uploader>,
    plan_replayer: Box<dyn PlanReplayerFetcher>,
}

impl Reporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            uploader: Box::new(NoopUploader),
            plan_replayer: Box::new(NoopPlanReplayerFetcher),
        }
    }

    pub fn with_uploader(mut self, uploader: impl Uploader + 'static) -> Self {
        self.uploader = Box::new(uploader);
        self
    }

    pub fn with_plan_replayer(mut self, fetcher: impl PlanReplayerFetcher + 'static) -> Self {
        self.plan_replayer = Box::new(fetcher);
        self
    }

    /// Allocates a case directory, writes `schema.sql`, `inserts.sql`,
    /// `case.sql`, and `summary.json`, then best-effort fetches a
    /// plan-replayer bundle and uploads the finished directory.
    pub async fn report(
        &self,
        schema_sql: &str,
        inserts: &InsertRing,
        result: &OracleResult,
        mut ctx: SummaryContext,
    ) -> Result<CaseReport, ReportError> {
        let dir = case_dir::allocate(&self.root)?;
        std::fs::write(dir.join("schema.sql"), wrap_with_fk_checks_disabled(schema_sql))?;
        std::fs::write(dir.join("inserts.sql"), render_statements(&inserts.snapshot()))?;
        std::fs::write(dir.join("case.sql"), render_statements(&result.statements))?;

        if let Some(path) = self.plan_replayer.fetch(&dir).await? {
            ctx.plan_replayer_path = Some(path);
        }

        ctx.case_dir = dir.display().to_string();
        let summary = Summary::from_result(result, ctx);
        std::fs::write(dir.join("summary.json"), summary.to_json_pretty()?)?;

        if let Some(location) = self.uploader.upload(&dir).await? {
            let mut summary = summary;
            summary.upload_location = Some(location.clone());
            std::fs::write(dir.join("summary.json"), summary.to_json_pretty()?)?;
            tracing::info!(case_dir = %dir.display(), location, "case uploaded");
            return Ok(CaseReport { case_dir: dir, summary });
        }

        tracing::info!(case_dir = %dir.display(), "case artifacts written");
        Ok(CaseReport { case_dir: dir, summary })
    }

    pub fn min_dir(case_dir: &Path) -> PathBuf {
        case_dir.join("min")
    }
}

/// Schema DDL can create tables in an order that temporarily violates a
/// forward-referencing foreign key; disabling checks around the replay
/// lets the statements apply in declaration order regardless.
fn wrap_with_fk_checks_disabled(sql: &str) -> String {
    format!("SET FOREIGN_KEY_CHECKS=0;\n{}\nSET FOREIGN_KEY_CHECKS=1;\n", sql.trim_end())
}

fn render_statements(statements: &[String]) -> String {
    let mut out = String::new();
    for stmt in statements {
        out.push_str(stmt.trim_end().trim_end_matches(';'));
        out.push_str(";\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_writes_all_artifacts_and_a_min_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let reporter = Reporter::new(tmp.path());
        let mut inserts = InsertRing::new(4);
        inserts.push("INSERT INTO t0 VALUES (1)");

        let result = OracleResult::mismatch("NoREC", vec!["SELECT * FROM t0".into()], "1", "2");
        let ctx = SummaryContext {
            seed: 42,
            ..Default::default()
        };

        let report = reporter
            .report("CREATE TABLE t0 (c0 INT);", &inserts, &result, ctx)
            .await
            .unwrap();

        assert!(report.case_dir.join("schema.sql").is_file());
        assert!(report.case_dir.join("inserts.sql").is_file());
        assert!(report.case_dir.join("case.sql").is_file());
        assert!(report.case_dir.join("summary.json").is_file());
        assert!(report.case_dir.join("min").is_dir());
        assert_eq!(report.summary.seed, 42);
        assert!(report.summary.upload_location.is_none());
    }

    #[tokio::test]
    async fn render_statements_strips_and_reterminates_semicolons() {
        let out = render_statements(&["SELECT 1;".to_string(), "SELECT 2".to_string()]);
        assert_eq!(out, "SELECT 1;\nSELECT 2;\n");
    }
}
