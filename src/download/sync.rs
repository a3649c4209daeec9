// ─── Sync Engine ───
// Decides fetch/skip/replace per artifact and performs the transfers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use md5::Md5;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProgressHandler;
use crate::download::set::{Artifact, Category, DownloadSet, HashKind};
use crate::error::{UpdaterError, UpdaterResult};

const NETWORK_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Transferred,
    Skipped,
}

/// Tally of one category drain. Failures are logged, not fatal: siblings
/// in the same category keep going.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub transferred: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn merge(&mut self, other: SyncReport) {
        self.transferred += other.transferred;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

pub struct SyncEngine {
    client: reqwest::Client,
    concurrency: usize,
    progress: Arc<dyn ProgressHandler>,
    cancel: CancellationToken,
}

impl SyncEngine {
    pub fn new(
        client: reqwest::Client,
        concurrency: usize,
        progress: Arc<dyn ProgressHandler>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client,
            concurrency,
            progress,
            cancel,
        }
    }

    /// Drain one category of the set on a bounded pool. Transfer errors
    /// are logged and counted; cancellation aborts the drain.
    pub async fn sync_category(
        &self,
        set: &DownloadSet,
        category: Category,
    ) -> UpdaterResult<SyncReport> {
        let artifacts = set.artifacts(category);
        if artifacts.is_empty() {
            return Ok(SyncReport::default());
        }
        info!("Syncing {} artifacts ({:?})", artifacts.len(), category);

        let results: Vec<_> = stream::iter(artifacts.iter())
            .map(|artifact| async move {
                (artifact, self.sync_artifact(artifact, Some(set)).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SyncReport::default();
        let mut cancelled = false;
        for (artifact, result) in results {
            match result {
                Ok(SyncOutcome::Transferred) => report.transferred += 1,
                Ok(SyncOutcome::Skipped) => report.skipped += 1,
                Err(UpdaterError::Cancelled) => cancelled = true,
                Err(e) => {
                    warn!("Failed to sync {}: {}", artifact.url, e);
                    report.failed += 1;
                }
            }
        }
        if cancelled {
            return Err(UpdaterError::Cancelled);
        }
        Ok(report)
    }

    /// Sync a single artifact: absent → fetch; present → verify size and
    /// hash, replacing on mismatch. When `set` is given, a completed
    /// transfer is recorded against its byte counters and reported.
    pub async fn sync_artifact(
        &self,
        artifact: &Artifact,
        set: Option<&DownloadSet>,
    ) -> UpdaterResult<SyncOutcome> {
        if self.cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }

        if file_exists(&artifact.dest).await {
            if !artifact.verify_existing {
                debug!("Keeping {} (install-only)", artifact.file_name());
                return Ok(SyncOutcome::Skipped);
            }
            if matches_expected(
                &artifact.dest,
                artifact.size,
                artifact.hash.as_deref(),
                artifact.hash_kind,
            )
            .await
            {
                return Ok(SyncOutcome::Skipped);
            }
            debug!("Replacing stale {}", artifact.file_name());
            tokio::fs::remove_file(&artifact.dest)
                .await
                .map_err(|e| UpdaterError::io(&artifact.dest, e))?;
        }

        match self.transfer_retrying(artifact).await {
            Ok(()) => {}
            // Integrity failure gets one more full attempt before it
            // surfaces like any other failed transfer.
            Err(UpdaterError::HashMismatch { .. }) => {
                debug!("Integrity failure for {}, refetching once", artifact.url);
                self.transfer_retrying(artifact).await?;
            }
            Err(e) => return Err(e),
        }

        if let Some(set) = set {
            let downloaded = set.record_downloaded(artifact.size);
            self.progress.on_bytes(downloaded, set.total_bytes());
        }
        Ok(SyncOutcome::Transferred)
    }

    /// Transfer with bounded backoff on transient network errors.
    async fn transfer_retrying(&self, artifact: &Artifact) -> UpdaterResult<()> {
        let mut delay = RETRY_BASE_DELAY;
        let mut last_err = None;
        for attempt in 1..=NETWORK_ATTEMPTS {
            if self.cancel.is_cancelled() {
                return Err(UpdaterError::Cancelled);
            }
            match self.transfer_once(artifact).await {
                Ok(()) => return Ok(()),
                Err(
                    e @ (UpdaterError::Http(_)
                    | UpdaterError::DownloadFailed { .. }
                    | UpdaterError::Io { .. }),
                ) => {
                    debug!(
                        "Transfer attempt {}/{} failed for {}: {}",
                        attempt, NETWORK_ATTEMPTS, artifact.url, e
                    );
                    last_err = Some(e);
                    if attempt < NETWORK_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("at least one attempt ran"))
    }

    /// One GET, streamed to a `.part` sibling, hashed on the fly and
    /// atomically renamed into place once verified.
    async fn transfer_once(&self, artifact: &Artifact) -> UpdaterResult<()> {
        if let Some(parent) = artifact.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdaterError::io(parent, e))?;
        }

        let resp = self.client.get(&artifact.url).send().await?;
        if !resp.status().is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: artifact.url.clone(),
                status: resp.status().as_u16(),
            });
        }

        let part = part_path(&artifact.dest);
        let mut hasher = artifact
            .hash
            .as_deref()
            .filter(|h| !h.contains('-'))
            .map(|_| Hasher::new(artifact.hash_kind));

        {
            let mut file = tokio::fs::File::create(&part)
                .await
                .map_err(|e| UpdaterError::io(&part, e))?;
            let mut body = resp.bytes_stream();
            while let Some(chunk) = body.next().await {
                let chunk = chunk?;
                if let Some(h) = hasher.as_mut() {
                    h.update(&chunk);
                }
                file.write_all(&chunk)
                    .await
                    .map_err(|e| UpdaterError::io(&part, e))?;
            }
            file.flush().await.map_err(|e| UpdaterError::io(&part, e))?;
            // Handle dropped before rename; required on Windows.
        }

        if let (Some(hasher), Some(expected)) = (hasher, artifact.hash.as_deref()) {
            let actual = hasher.finish();
            if actual != expected {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(UpdaterError::HashMismatch {
                    path: artifact.dest.clone(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&part, &artifact.dest)
            .await
            .map_err(|e| UpdaterError::io(&artifact.dest, e))?;
        debug!("Downloaded {} -> {:?}", artifact.url, artifact.dest);
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    dest.with_extension("part")
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Does an on-disk file satisfy the expected size and hash?
///
/// A hash carrying a literal `-` is a non-content identifier from certain
/// registry lookups; it is accepted without byte comparison. An expected
/// size of zero means the producer did not know the size (loader install
/// profiles omit it) and only the hash is consulted.
pub async fn matches_expected(path: &Path, size: u64, hash: Option<&str>, kind: HashKind) -> bool {
    let Ok(meta) = tokio::fs::metadata(path).await else {
        return false;
    };
    if size > 0 && meta.len() != size {
        return false;
    }
    match hash {
        None => true,
        Some(h) if h.contains('-') => true,
        Some(h) => match file_hash(path, kind).await {
            Ok(actual) => actual == h,
            Err(_) => false,
        },
    }
}

pub async fn file_hash(path: &Path, kind: HashKind) -> UpdaterResult<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| UpdaterError::io(path, e))?;
    Ok(hash_bytes(&bytes, kind))
}

pub fn hash_bytes(bytes: &[u8], kind: HashKind) -> String {
    let mut hasher = Hasher::new(kind);
    hasher.update(bytes);
    hasher.finish()
}

enum Hasher {
    Sha1(Sha1),
    Md5(Md5),
}

impl Hasher {
    fn new(kind: HashKind) -> Self {
        match kind {
            HashKind::Sha1 => Hasher::Sha1(Sha1::new()),
            HashKind::Md5 => Hasher::Md5(Md5::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Sha1(h) => h.update(data),
            Hasher::Md5(h) => h.update(data),
        }
    }

    fn finish(self) -> String {
        match self {
            Hasher::Sha1(h) => hex::encode(h.finalize()),
            Hasher::Md5(h) => hex::encode(h.finalize()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NoopProgress;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &[u8] = b"hello world";
    const BODY_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";
    const BODY_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    fn engine() -> SyncEngine {
        SyncEngine::new(
            reqwest::Client::new(),
            4,
            Arc::new(NoopProgress),
            CancellationToken::new(),
        )
    }

    async fn mount_body(server: &MockServer, route: &str, expect: u64) {
        Mock::given(method("GET"))
            .and(path(route.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .expect(expect)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn second_pass_performs_zero_transfers() {
        let server = MockServer::start().await;
        mount_body(&server, "/lib.jar", 1).await;
        let dir = tempfile::tempdir().unwrap();

        let mut set = DownloadSet::new();
        set.push(Artifact::sha1(
            Category::Libraries,
            format!("{}/lib.jar", server.uri()),
            dir.path().join("lib.jar"),
            BODY.len() as u64,
            BODY_SHA1,
        ));
        set.init();

        let engine = engine();
        let first = engine.sync_category(&set, Category::Libraries).await.unwrap();
        assert_eq!((first.transferred, first.skipped, first.failed), (1, 0, 0));

        let second = engine.sync_category(&set, Category::Libraries).await.unwrap();
        assert_eq!((second.transferred, second.skipped, second.failed), (0, 1, 0));
        // expect(1) on the mock verifies no second request happened.
    }

    #[tokio::test]
    async fn stale_file_is_replaced() {
        let server = MockServer::start().await;
        mount_body(&server, "/mod.jar", 1).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("mod.jar");
        // Same length, different bytes.
        tokio::fs::write(&dest, b"hello wOrld").await.unwrap();

        let artifact = Artifact::sha1(
            Category::Mods,
            format!("{}/mod.jar", server.uri()),
            &dest,
            BODY.len() as u64,
            BODY_SHA1,
        );
        let outcome = engine().sync_artifact(&artifact, None).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Transferred);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), BODY);
    }

    #[tokio::test]
    async fn dash_bearing_hash_is_never_refetched() {
        let server = MockServer::start().await;
        // Any request at all fails the test.
        mount_body(&server, "/registry.jar", 0).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("registry.jar");
        tokio::fs::write(&dest, b"hello wOrld").await.unwrap();

        let artifact = Artifact::md5(
            Category::RegistryMods,
            format!("{}/registry.jar", server.uri()),
            &dest,
            11,
            "abc-123",
        );
        let outcome = engine().sync_artifact(&artifact, None).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
    }

    #[tokio::test]
    async fn install_only_artifacts_keep_existing_files() {
        let server = MockServer::start().await;
        mount_body(&server, "/config.toml", 0).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("config.toml");
        tokio::fs::write(&dest, b"locally edited, wrong size").await.unwrap();

        let artifact = Artifact::sha1(
            Category::ExternalFiles,
            format!("{}/config.toml", server.uri()),
            &dest,
            BODY.len() as u64,
            BODY_SHA1,
        )
        .install_only();
        let outcome = engine().sync_artifact(&artifact, None).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Skipped);
        assert_eq!(
            tokio::fs::read(&dest).await.unwrap(),
            b"locally edited, wrong size"
        );
    }

    #[tokio::test]
    async fn corrupt_server_body_fails_after_integrity_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/lib.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"corrupted!!"))
            .expect(2)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lib.jar");

        let artifact = Artifact::sha1(
            Category::Libraries,
            format!("{}/lib.jar", server.uri()),
            &dest,
            11,
            BODY_SHA1,
        );
        let err = engine().sync_artifact(&artifact, None).await.unwrap_err();
        assert!(matches!(err, UpdaterError::HashMismatch { .. }));
        assert!(!dest.exists());
    }

    struct RecordingProgress(Mutex<Vec<(u64, u64)>>);

    impl ProgressHandler for RecordingProgress {
        fn on_bytes(&self, downloaded: u64, total: u64) {
            self.0.lock().unwrap().push((downloaded, total));
        }
    }

    #[tokio::test]
    async fn byte_accounting_reaches_total_exactly() {
        let server = MockServer::start().await;
        mount_body(&server, "/a.jar", 1).await;
        mount_body(&server, "/b.jar", 1).await;
        let dir = tempfile::tempdir().unwrap();

        let mut set = DownloadSet::new();
        for name in ["a.jar", "b.jar"] {
            set.push(Artifact::sha1(
                Category::Libraries,
                format!("{}/{}", server.uri(), name),
                dir.path().join(name),
                BODY.len() as u64,
                BODY_SHA1,
            ));
        }
        set.init();
        assert_eq!(set.total_bytes(), 22);

        let progress = Arc::new(RecordingProgress(Mutex::new(Vec::new())));
        let engine = SyncEngine::new(
            reqwest::Client::new(),
            2,
            progress.clone(),
            CancellationToken::new(),
        );
        engine.sync_category(&set, Category::Libraries).await.unwrap();

        assert_eq!(set.downloaded_bytes(), set.total_bytes());
        let calls = progress.0.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|&(_, total)| total == 22));
        assert_eq!(calls.last().unwrap().0, 22);
    }

    #[tokio::test]
    async fn md5_artifacts_verify_with_md5() {
        let server = MockServer::start().await;
        mount_body(&server, "/m.jar", 1).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("m.jar");

        let artifact = Artifact::md5(
            Category::RegistryMods,
            format!("{}/m.jar", server.uri()),
            &dest,
            BODY.len() as u64,
            BODY_MD5,
        );
        let outcome = engine().sync_artifact(&artifact, None).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Transferred);
        assert!(matches_expected(&dest, 11, Some(BODY_MD5), HashKind::Md5).await);
    }

    #[tokio::test]
    async fn zero_expected_size_defers_to_hash_alone() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("profile-lib.jar");
        tokio::fs::write(&dest, BODY).await.unwrap();

        assert!(matches_expected(&dest, 0, Some(BODY_SHA1), HashKind::Sha1).await);
        assert!(!matches_expected(&dest, 0, Some("0000"), HashKind::Sha1).await);
        assert!(matches_expected(&dest, 0, None, HashKind::Sha1).await);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_any_request() {
        let server = MockServer::start().await;
        mount_body(&server, "/late.jar", 0).await;
        let dir = tempfile::tempdir().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let engine = SyncEngine::new(
            reqwest::Client::new(),
            2,
            Arc::new(NoopProgress),
            cancel,
        );
        let artifact = Artifact::sha1(
            Category::Libraries,
            format!("{}/late.jar", server.uri()),
            dir.path().join("late.jar"),
            11,
            BODY_SHA1,
        );
        let err = engine.sync_artifact(&artifact, None).await.unwrap_err();
        assert!(matches!(err, UpdaterError::Cancelled));
    }
}
