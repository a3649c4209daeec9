pub mod assets;
pub mod manifest;
pub mod version_file;

pub use assets::{AssetIndex, AssetObject};
pub use manifest::{
    resolve, McpOverride, McpSide, VersionIndex, VersionKind, VersionManifest, VersionSpec,
    VersionTarget,
};
pub use version_file::{
    current_arch_token, current_os_name, AssetIndexRef, LibraryArtifact, LibraryEntry,
    LibraryRule, OsRule, RemoteFile, RuleAction, VersionDocument,
};
