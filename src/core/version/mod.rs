pub mod manifest;
pub mod version_file;

#[allow(unused_imports)]
pub use manifest::{VersionEntry, VersionManifest};
#[allow(unused_imports)]
pub use version_file::{
    Arguments, AssetIndexInfo, DownloadArtifact, LibDownloadArtifact, LibraryDownloads,
    LibraryEntry, LibraryRule, OsRule, RuleAction, VersionDownloads, VersionJson,
};
