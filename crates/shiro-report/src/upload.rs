//! Case artifact upload and plan-replayer retrieval, modeled as traits so
//! the concrete object-storage backend stays out of this crate (§1 scopes
//! the storage backend itself out; `shiro-config`'s `S3Config` only carries
//! the dial-in parameters for whichever implementation the embedder wires
//! up).

use std::path::Path;

use async_trait::async_trait;

/// Uploads a finished case directory somewhere durable and reports back a
/// location string to stash in `summary.json`'s `upload_location` field.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, case_dir: &Path) -> std::io::Result<Option<String>>;
}

/// Does nothing and reports no location. The default when no object store
/// is configured (§4.7: upload is best-effort and never blocks a capture).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopUploader;

#[async_trait]
impl Uploader for NoopUploader {
    async fn upload(&self, _case_dir: &Path) -> std::io::Result<Option<String>> {
        Ok(None)
    }
}

/// Fetches a `plan_replayer.zip` (or equivalent bundle) for a captured
/// case from the SUT, writing it into the case directory.
#[async_trait]
pub trait PlanReplayerFetcher: Send + Sync {
    async fn fetch(&self, case_dir: &Path) -> std::io::Result<Option<String>>;
}

/// Does nothing and reports no path. The default when `plan_replayer` is
/// disabled in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPlanReplayerFetcher;

#[async_trait]
impl PlanReplayerFetcher for NoopPlanReplayerFetcher {
    async fn fetch(&self, _case_dir: &Path) -> std::io::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_uploader_reports_no_location() {
        let dir = tempfile::tempdir().unwrap();
        let loc = NoopUploader.upload(dir.path()).await.unwrap();
        assert!(loc.is_none());
    }

    #[tokio::test]
    async fn noop_plan_replayer_fetcher_reports_no_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = NoopPlanReplayerFetcher.fetch(dir.path()).await.unwrap();
        assert!(path.is_none());
    }
}
