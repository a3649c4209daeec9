// ─── Version Manifest ───
// Resolves a version identifier against the remote master index and
// produces the immutable per-run manifest the pipeline works from.

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{UpdaterError, UpdaterResult};
use crate::version::version_file::{RemoteFile, VersionDocument};

pub const DEFAULT_VERSION_INDEX: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Which version of the game to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionTarget {
    /// A literal version id, e.g. `"1.20.4"`.
    Id(String),
    /// The index's recorded latest stable release.
    LatestRelease,
    /// The index's recorded latest snapshot.
    LatestSnapshot,
}

/// Flavour tag recorded on the resolved manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionKind {
    Vanilla,
    ForgeCompatible,
    Mcp,
}

/// One side (client or server) of an MCP mapping override. Raw strings on
/// purpose: validation happens at resolve time so a bad override can fall
/// back to the document's own descriptor instead of failing the run.
#[derive(Debug, Clone, Default)]
pub struct McpSide {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

impl McpSide {
    fn validated(&self, which: &str) -> Option<RemoteFile> {
        if self.url.is_empty() || self.sha1.is_empty() || self.size == 0 {
            warn!(
                "Invalid MCP {} override (empty url/sha1 or zero size), using the version document's descriptor",
                which
            );
            return None;
        }
        Some(RemoteFile {
            url: self.url.clone(),
            sha1: self.sha1.clone(),
            size: self.size,
        })
    }
}

/// Replacement client/server descriptors for MCP-mapped installs.
#[derive(Debug, Clone, Default)]
pub struct McpOverride {
    pub client: Option<McpSide>,
    pub server: Option<McpSide>,
}

/// Everything needed to resolve one version.
#[derive(Debug, Clone)]
pub struct VersionSpec {
    pub target: VersionTarget,
    pub mcp: Option<McpOverride>,
    /// Master index location; overridable for mirrors.
    pub index_url: String,
}

impl VersionSpec {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            target: VersionTarget::Id(id.into()),
            mcp: None,
            index_url: DEFAULT_VERSION_INDEX.to_string(),
        }
    }

    pub fn latest_release() -> Self {
        Self {
            target: VersionTarget::LatestRelease,
            mcp: None,
            index_url: DEFAULT_VERSION_INDEX.to_string(),
        }
    }

    pub fn latest_snapshot() -> Self {
        Self {
            target: VersionTarget::LatestSnapshot,
            mcp: None,
            index_url: DEFAULT_VERSION_INDEX.to_string(),
        }
    }

    pub fn with_mcp(mut self, mcp: McpOverride) -> Self {
        self.mcp = Some(mcp);
        self
    }
}

// ─── Master index wire format ───

#[derive(Debug, Deserialize)]
pub struct VersionIndex {
    pub latest: LatestPointers,
    pub versions: Vec<IndexEntry>,
}

#[derive(Debug, Deserialize)]
pub struct LatestPointers {
    pub release: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionIndex {
    pub async fn fetch(client: &reqwest::Client, url: &str) -> UpdaterResult<Self> {
        let resp = client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let index: VersionIndex = resp.json().await?;
        info!("Loaded {} versions from the master index", index.versions.len());
        Ok(index)
    }

    pub fn find(&self, id: &str) -> Option<&IndexEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

// ─── Resolved manifest ───

/// Fully resolved version description. Immutable once built; the pipeline
/// only reads from it.
#[derive(Debug)]
pub struct VersionManifest {
    pub name: String,
    pub kind: VersionKind,
    pub document: VersionDocument,
    /// Raw per-version JSON, persisted as `<name>.json` in the install root.
    pub raw: String,
}

/// Turn a [`VersionSpec`] into a [`VersionManifest`]: fetch the index,
/// substitute the latest pointer when asked, fetch the matching version
/// document and apply any MCP override to its client/server descriptors.
pub async fn resolve(
    client: &reqwest::Client,
    spec: &VersionSpec,
    modded: bool,
) -> UpdaterResult<VersionManifest> {
    let index = VersionIndex::fetch(client, &spec.index_url).await?;

    let id: &str = match &spec.target {
        VersionTarget::Id(id) => id,
        VersionTarget::LatestRelease => &index.latest.release,
        VersionTarget::LatestSnapshot => &index.latest.snapshot,
    };

    let entry = index
        .find(id)
        .ok_or_else(|| UpdaterError::VersionNotFound(id.to_string()))?;

    let resp = client.get(&entry.url).send().await?;
    if !resp.status().is_success() {
        return Err(UpdaterError::DownloadFailed {
            url: entry.url.clone(),
            status: resp.status().as_u16(),
        });
    }
    let raw = resp.text().await?;
    let mut document: VersionDocument = serde_json::from_str(&raw)?;

    let kind = if spec.mcp.is_some() {
        VersionKind::Mcp
    } else if modded {
        VersionKind::ForgeCompatible
    } else {
        VersionKind::Vanilla
    };

    if let Some(mcp) = &spec.mcp {
        let downloads = document.downloads.get_or_insert_with(Default::default);
        if let Some(side) = &mcp.client {
            if let Some(file) = side.validated("client") {
                downloads.client = Some(file);
            }
        }
        if let Some(side) = &mcp.server {
            if let Some(file) = side.validated("server") {
                downloads.server = Some(file);
            }
        }
    }

    info!("Resolved version {} ({} libraries)", id, document.libraries.len());

    Ok(VersionManifest {
        name: id.to_string(),
        kind,
        document,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_index_with_latest_pointers() {
        let json = r#"{
            "latest": {"release": "1.20.4", "snapshot": "24w14a"},
            "versions": [
                {"id": "24w14a", "type": "snapshot", "url": "https://example.com/24w14a.json"},
                {"id": "1.20.4", "type": "release", "url": "https://example.com/1.20.4.json", "sha1": "abc123"}
            ]
        }"#;
        let index: VersionIndex = serde_json::from_str(json).unwrap();
        assert_eq!(index.latest.release, "1.20.4");
        assert_eq!(index.latest.snapshot, "24w14a");
        assert_eq!(index.find("1.20.4").unwrap().version_type, "release");
        assert!(index.find("1.8.9").is_none());
    }

    #[test]
    fn mcp_side_validation_rejects_empty_and_zero() {
        assert!(McpSide::default().validated("client").is_none());
        assert!(McpSide {
            url: "https://example.com/client.jar".into(),
            sha1: "".into(),
            size: 10,
        }
        .validated("client")
        .is_none());
        assert!(McpSide {
            url: "https://example.com/client.jar".into(),
            sha1: "da39a3ee5e6b4b0d3255bfef95601890afd80709".into(),
            size: 0,
        }
        .validated("client")
        .is_none());

        let ok = McpSide {
            url: "https://example.com/client.jar".into(),
            sha1: "da39a3ee5e6b4b0d3255bfef95601890afd80709".into(),
            size: 4523,
        }
        .validated("client")
        .unwrap();
        assert_eq!(ok.size, 4523);
    }
}
