use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// Progress bucket an artifact is accounted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Libraries,
    Assets,
    ExternalFiles,
    Mods,
    RegistryMods,
    LoaderExtra,
}

pub const ALL_CATEGORIES: [Category; 6] = [
    Category::Libraries,
    Category::Assets,
    Category::ExternalFiles,
    Category::Mods,
    Category::RegistryMods,
    Category::LoaderExtra,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    Sha1,
    Md5,
}

/// One fetchable unit. Expected fields never change after creation.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub category: Category,
    pub url: String,
    /// Absolute destination path.
    pub dest: PathBuf,
    /// Expected byte size. Zero means unknown; size verification is skipped.
    pub size: u64,
    /// Expected content hash (hex). `None` skips content verification.
    pub hash: Option<String>,
    pub hash_kind: HashKind,
    /// `false` marks install-only artifacts: an existing file is never
    /// re-verified or replaced.
    pub verify_existing: bool,
}

impl Artifact {
    pub fn sha1(
        category: Category,
        url: impl Into<String>,
        dest: impl Into<PathBuf>,
        size: u64,
        sha1: impl Into<String>,
    ) -> Self {
        Self {
            category,
            url: url.into(),
            dest: dest.into(),
            size,
            hash: Some(sha1.into()),
            hash_kind: HashKind::Sha1,
            verify_existing: true,
        }
    }

    pub fn md5(
        category: Category,
        url: impl Into<String>,
        dest: impl Into<PathBuf>,
        size: u64,
        md5: impl Into<String>,
    ) -> Self {
        Self {
            hash_kind: HashKind::Md5,
            ..Self::sha1(category, url, dest, size, md5)
        }
    }

    /// No content hash; only presence and size are checked.
    pub fn unchecked(
        category: Category,
        url: impl Into<String>,
        dest: impl Into<PathBuf>,
        size: u64,
    ) -> Self {
        Self {
            category,
            url: url.into(),
            dest: dest.into(),
            size,
            hash: None,
            hash_kind: HashKind::Sha1,
            verify_existing: true,
        }
    }

    pub fn install_only(mut self) -> Self {
        self.verify_existing = false;
        self
    }

    /// File name of the destination, used in logs and reconciliation.
    pub fn file_name(&self) -> String {
        self.dest
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// The mutable collection of pending artifacts for one run, plus the
/// aggregate byte counters every producer and download worker shares.
///
/// Owned by the pipeline, passed by reference; never global state.
#[derive(Debug, Default)]
pub struct DownloadSet {
    queues: HashMap<Category, Vec<Artifact>>,
    /// Content hashes already queued in the asset category.
    asset_hashes: HashSet<String>,
    total_bytes: u64,
    downloaded_bytes: AtomicU64,
    initialized: bool,
}

impl DownloadSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an artifact. Producers run before `init()`; anything pushed
    /// later is still synced but no longer counted in the total.
    pub fn push(&mut self, artifact: Artifact) {
        if self.initialized {
            warn!(
                "Artifact {} queued after init(); totals will not include it",
                artifact.file_name()
            );
        }
        self.queues.entry(artifact.category).or_default().push(artifact);
    }

    /// Queue an asset object, deduplicating by content hash: two logical
    /// references sharing a hash collapse into one artifact and count
    /// once. Returns whether the artifact was actually queued.
    pub fn push_asset(&mut self, artifact: Artifact) -> bool {
        let Some(hash) = artifact.hash.clone() else {
            self.push(artifact);
            return true;
        };
        if !self.asset_hashes.insert(hash) {
            return false;
        }
        self.push(artifact);
        true
    }

    /// Compute the aggregate expected byte total across every category
    /// and reset the downloaded counter. Idempotent; the total is never
    /// recomputed once sync has started.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.total_bytes = self
            .queues
            .values()
            .flatten()
            .map(|artifact| artifact.size)
            .sum();
        self.downloaded_bytes.store(0, Ordering::SeqCst);
        self.initialized = true;
    }

    pub fn artifacts(&self, category: Category) -> &[Artifact] {
        self.queues.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, category: Category) -> usize {
        self.artifacts(category).len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.values().all(Vec::is_empty)
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::SeqCst)
    }

    /// Record one completed transfer; safe under concurrent workers.
    /// Returns the new cumulative count.
    pub fn record_downloaded(&self, bytes: u64) -> u64 {
        self.downloaded_bytes.fetch_add(bytes, Ordering::SeqCst) + bytes
    }

    /// Release queued artifacts at the end of a run.
    pub fn clear(&mut self) {
        self.queues.clear();
        self.asset_hashes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(hash: &str, size: u64) -> Artifact {
        Artifact::sha1(
            Category::Assets,
            format!("https://example.com/{hash}"),
            format!("/tmp/assets/objects/{}/{hash}", &hash[..2]),
            size,
            hash,
        )
    }

    #[test]
    fn init_sums_every_category_once() {
        let mut set = DownloadSet::new();
        set.push(Artifact::sha1(Category::Libraries, "u", "/tmp/a", 100, "aa"));
        set.push(Artifact::sha1(Category::Mods, "u", "/tmp/b", 50, "bb"));
        set.push(Artifact::unchecked(Category::ExternalFiles, "u", "/tmp/c", 7));
        set.init();
        assert_eq!(set.total_bytes(), 157);
        assert_eq!(set.downloaded_bytes(), 0);

        // Second call is a no-op even if somebody queues more.
        set.push(Artifact::sha1(Category::Mods, "u", "/tmp/d", 999, "cc"));
        set.init();
        assert_eq!(set.total_bytes(), 157);
    }

    #[test]
    fn shared_hash_assets_collapse_and_count_once() {
        let mut set = DownloadSet::new();
        let h = "19a772561ec3bd6efbd6d4ed6f64b381a23ba294";
        assert!(set.push_asset(asset(h, 58679)));
        assert!(!set.push_asset(asset(h, 58679)));
        assert!(set.push_asset(asset("ffa772561ec3bd6efbd6d4ed6f64b381a23ba294", 10)));
        set.init();
        assert_eq!(set.len(Category::Assets), 2);
        assert_eq!(set.total_bytes(), 58689);
    }

    #[test]
    fn record_downloaded_accumulates_atomically() {
        let mut set = DownloadSet::new();
        set.push(Artifact::sha1(Category::Libraries, "u", "/tmp/a", 10, "aa"));
        set.push(Artifact::sha1(Category::Libraries, "u", "/tmp/b", 20, "bb"));
        set.init();
        assert_eq!(set.record_downloaded(10), 10);
        assert_eq!(set.record_downloaded(20), 30);
        assert_eq!(set.downloaded_bytes(), set.total_bytes());
    }

    #[test]
    fn clear_releases_queues() {
        let mut set = DownloadSet::new();
        set.push(Artifact::sha1(Category::Libraries, "u", "/tmp/a", 10, "aa"));
        set.init();
        set.clear();
        assert!(set.is_empty());
        // Totals from the finished run stay readable after clear.
        assert_eq!(set.total_bytes(), 10);
    }
}
