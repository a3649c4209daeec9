// ─── Version Document ───
// Parses a per-version JSON document and evaluates per-library OS rules
// and native classifier selection.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{UpdaterError, UpdaterResult};

/// A remote file descriptor: client jar, server jar, asset index.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteFile {
    pub url: String,
    pub size: u64,
    pub sha1: String,
}

/// Asset index descriptor from the version document.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndexRef {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    pub size: u64,
    pub sha1: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct VersionDownloads {
    pub client: Option<RemoteFile>,
    pub server: Option<RemoteFile>,
}

/// The fully parsed per-version document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    pub id: Option<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub asset_index: Option<AssetIndexRef>,
}

impl VersionDocument {
    /// Persist the raw document as `<version_id>.json` under the install
    /// root, the descriptor later runs use for `is_already_installed`
    /// style checks.
    pub async fn save_raw(raw: &str, install_dir: &Path, version_id: &str) -> UpdaterResult<()> {
        tokio::fs::create_dir_all(install_dir)
            .await
            .map_err(|e| UpdaterError::io(install_dir, e))?;
        let path = install_dir.join(format!("{version_id}.json"));
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| UpdaterError::io(path, e))
    }
}

// ─── Library entries ───

#[derive(Debug, Deserialize)]
pub struct LibraryEntry {
    pub name: String,
    #[serde(default)]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default)]
    pub rules: Option<Vec<LibraryRule>>,
}

#[derive(Debug, Deserialize)]
pub struct LibraryDownloads {
    pub artifact: Option<LibraryArtifact>,
    #[serde(default)]
    pub classifiers: Option<HashMap<String, LibraryArtifact>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibraryArtifact {
    pub path: String,
    pub sha1: String,
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct LibraryRule {
    pub action: RuleAction,
    #[serde(default)]
    pub os: Option<OsRule>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Deserialize)]
pub struct OsRule {
    #[serde(default)]
    pub name: Option<String>,
}

impl LibraryEntry {
    /// Evaluate inclusion for the given OS name ("windows"/"osx"/"linux").
    ///
    /// Semantics, deliberately matching the historical behavior rather
    /// than Mojang's documentation: no rule list means always included;
    /// otherwise walk the rules in order, last matching rule wins. An
    /// `allow` with an OS scope contributes `true` on match and `false`
    /// on mismatch; a `disallow` with an OS scope contributes `false` on
    /// match and nothing on mismatch; an unscoped rule always
    /// contributes its action.
    pub fn allowed_on(&self, os: &str) -> bool {
        let Some(rules) = &self.rules else {
            return true;
        };

        let mut allowed = true;
        for rule in rules {
            let scope = rule.os.as_ref().and_then(|o| o.name.as_deref());
            match (&rule.action, scope) {
                (RuleAction::Allow, None) => allowed = true,
                (RuleAction::Allow, Some(name)) => allowed = name == os,
                (RuleAction::Disallow, None) => allowed = false,
                (RuleAction::Disallow, Some(name)) => {
                    if name == os {
                        allowed = false;
                    }
                }
            }
        }
        allowed
    }

    pub fn allowed_for_current_os(&self) -> bool {
        self.allowed_on(current_os_name())
    }

    /// Select the native classifier artifact for `os`/`arch`.
    ///
    /// `natives-<os>-<arch>` wins over the generic `natives-<os>` when
    /// both exist. Classifier artifacts whose path carries one of the
    /// known-broken bundled native versions are never selected, on any
    /// platform.
    pub fn native_classifier_on(&self, os: &str, arch: &str) -> Option<&LibraryArtifact> {
        let classifiers = self.downloads.as_ref()?.classifiers.as_ref()?;

        let specific = format!("natives-{os}-{arch}");
        let generic = format!("natives-{os}");
        let chosen = [specific.as_str(), generic.as_str()]
            .into_iter()
            .filter_map(|key| classifiers.get(key))
            .find(|artifact| !is_broken_native(&artifact.path) && !is_broken_native(&artifact.url));
        chosen
    }

    pub fn native_classifier_for_current_os(&self) -> Option<&LibraryArtifact> {
        self.native_classifier_on(current_os_name(), current_arch_token())
    }
}

/// Two bundled native-library versions ship unusable binaries; their
/// artifacts are excluded outright wherever they appear.
fn is_broken_native(path: &str) -> bool {
    (path.contains("-3.2.1-") && path.contains("lwjgl"))
        || (path.contains("-2.9.2-") && path.contains("nightly"))
}

/// OS name as the wire format spells it.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

/// Architecture token used in native classifier keys.
pub fn current_arch_token() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x64"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library(value: serde_json::Value) -> LibraryEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn no_rules_means_allowed_everywhere() {
        let lib = library(serde_json::json!({"name": "test:lib:1.0"}));
        for os in ["windows", "osx", "linux"] {
            assert!(lib.allowed_on(os));
        }
    }

    #[test]
    fn allow_scoped_to_osx_excludes_other_platforms() {
        let lib = library(serde_json::json!({
            "name": "ca.weblite:java-objc-bridge:1.1",
            "rules": [{"action": "allow", "os": {"name": "osx"}}]
        }));
        assert!(lib.allowed_on("osx"));
        assert!(!lib.allowed_on("windows"));
        assert!(!lib.allowed_on("linux"));
    }

    #[test]
    fn disallow_scoped_is_noop_elsewhere() {
        let lib = library(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.3",
            "rules": [
                {"action": "allow"},
                {"action": "disallow", "os": {"name": "osx"}}
            ]
        }));
        assert!(!lib.allowed_on("osx"));
        assert!(lib.allowed_on("windows"));
        assert!(lib.allowed_on("linux"));
    }

    #[test]
    fn last_matching_rule_wins() {
        let lib = library(serde_json::json!({
            "name": "test:lib:1.0",
            "rules": [
                {"action": "disallow", "os": {"name": "linux"}},
                {"action": "allow", "os": {"name": "linux"}}
            ]
        }));
        assert!(lib.allowed_on("linux"));
    }

    fn natives_entry() -> LibraryEntry {
        library(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.3",
            "downloads": {
                "classifiers": {
                    "natives-windows": {
                        "path": "org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-windows.jar",
                        "sha1": "aa", "size": 10, "url": "https://example.com/generic.jar"
                    },
                    "natives-windows-x64": {
                        "path": "org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-windows-x64.jar",
                        "sha1": "bb", "size": 11, "url": "https://example.com/x64.jar"
                    }
                }
            }
        }))
    }

    #[test]
    fn arch_specific_classifier_preferred() {
        let lib = natives_entry();
        let chosen = lib.native_classifier_on("windows", "x64").unwrap();
        assert!(chosen.path.ends_with("natives-windows-x64.jar"));
    }

    #[test]
    fn generic_classifier_used_when_arch_missing() {
        let lib = natives_entry();
        let chosen = lib.native_classifier_on("windows", "arm64").unwrap();
        assert!(chosen.path.ends_with("natives-windows.jar"));
    }

    #[test]
    fn broken_arch_classifier_falls_back_to_generic() {
        let lib = library(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.3.3",
            "downloads": {
                "classifiers": {
                    "natives-linux": {
                        "path": "org/lwjgl/lwjgl/3.3.3/lwjgl-3.3.3-natives-linux.jar",
                        "sha1": "aa", "size": 10, "url": "https://example.com/generic.jar"
                    },
                    "natives-linux-x64": {
                        "path": "org/lwjgl/lwjgl-3.2.1-natives-linux-x64.jar",
                        "sha1": "bb", "size": 11, "url": "https://example.com/x64.jar"
                    }
                }
            }
        }));
        let chosen = lib.native_classifier_on("linux", "x64").unwrap();
        assert!(chosen.path.ends_with("3.3.3-natives-linux.jar"));
    }

    #[test]
    fn broken_bundled_versions_never_selected() {
        let lib = library(serde_json::json!({
            "name": "org.lwjgl:lwjgl:3.2.1",
            "downloads": {
                "classifiers": {
                    "natives-linux": {
                        "path": "org/lwjgl/lwjgl/3.2.1/lwjgl-3.2.1-natives-linux.jar",
                        "sha1": "cc", "size": 12, "url": "https://example.com/lwjgl-3.2.1-natives-linux.jar"
                    }
                }
            }
        }));
        assert!(lib.native_classifier_on("linux", "x64").is_none());

        let nightly = library(serde_json::json!({
            "name": "org.lwjgl.lwjgl:lwjgl-platform:2.9.2-nightly-20140822",
            "downloads": {
                "classifiers": {
                    "natives-linux": {
                        "path": "lwjgl-platform-2.9.2-nightly-20140822-natives-linux.jar",
                        "sha1": "dd", "size": 13, "url": "https://example.com/nightly.jar"
                    }
                }
            }
        }));
        assert!(nightly.native_classifier_on("linux", "x64").is_none());
    }

    #[test]
    fn document_parses_downloads_and_asset_index() {
        let doc: VersionDocument = serde_json::from_value(serde_json::json!({
            "id": "1.20.4",
            "libraries": [{"name": "a:b:1.0"}],
            "downloads": {
                "client": {"url": "https://example.com/client.jar", "size": 1, "sha1": "aa"},
                "server": {"url": "https://example.com/server.jar", "size": 2, "sha1": "bb"}
            },
            "assetIndex": {"id": "12", "url": "https://example.com/12.json", "size": 3, "sha1": "cc"}
        }))
        .unwrap();
        assert_eq!(doc.libraries.len(), 1);
        assert_eq!(doc.downloads.unwrap().server.unwrap().size, 2);
        assert_eq!(doc.asset_index.unwrap().id.as_deref(), Some("12"));
    }
}
