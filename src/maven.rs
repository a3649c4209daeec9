use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{UpdaterError, UpdaterResult};

/// Well-known repositories the loader families publish to.
pub const MOJANG_LIBRARIES: &str = "https://libraries.minecraft.net";
pub const FORGE_MAVEN: &str = "https://maven.minecraftforge.net";
pub const NEOFORGE_MAVEN: &str = "https://maven.neoforged.net/releases";
pub const FABRIC_MAVEN: &str = "https://maven.fabricmc.net";
pub const QUILT_MAVEN: &str = "https://maven.quiltmc.org/repository/release";

/// A parsed Maven coordinate.
///
/// Supported forms:
///   `groupId:artifactId:version`
///   `groupId:artifactId:version:classifier`
///   `groupId:artifactId:version[:classifier]@packaging`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// Packaging / file extension, `"jar"` unless overridden with `@`.
    pub packaging: String,
}

impl MavenArtifact {
    pub fn parse(coord: &str) -> UpdaterResult<Self> {
        let (coord_part, packaging) = match coord.rfind('@') {
            Some(idx) => (&coord[..idx], &coord[idx + 1..]),
            None => (coord, "jar"),
        };

        let parts: Vec<&str> = coord_part.split(':').collect();
        let (group_id, artifact_id, version, classifier) = match parts.as_slice() {
            [g, a, v] => (g, a, v, None),
            [g, a, v, c] => (g, a, v, Some(c.to_string())),
            _ => return Err(UpdaterError::InvalidMavenCoordinate(coord.to_string())),
        };
        if group_id.is_empty() || artifact_id.is_empty() || version.is_empty() {
            return Err(UpdaterError::InvalidMavenCoordinate(coord.to_string()));
        }

        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.to_string(),
            classifier,
            packaging: packaging.to_string(),
        })
    }

    fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// `artifactId-version[-classifier].packaging`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        }
    }

    /// Full URL under `repo_base`:
    /// `<repo>/<group_path>/<artifact_id>/<version>/<filename>`
    pub fn url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            repo_base.trim_end_matches('/'),
            self.group_path(),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }

    /// URL of the `.sha1` sidecar some repositories publish next to the
    /// artifact; legacy install profiles rely on it when they carry no
    /// checksum of their own.
    pub fn sha1_sidecar_url(&self, repo_base: &str) -> String {
        format!("{}.sha1", self.url(repo_base))
    }

    /// Path relative to the libraries directory, mirroring the standard
    /// local repository layout.
    pub fn local_path(&self) -> PathBuf {
        PathBuf::from(self.group_path())
            .join(&self.artifact_id)
            .join(&self.version)
            .join(self.filename())
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)?;
        if let Some(c) = &self.classifier {
            write!(f, ":{}", c)?;
        }
        if self.packaging != "jar" {
            write!(f, "@{}", self.packaging)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_coordinate() {
        let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(a.group_id, "net.sf.jopt-simple");
        assert_eq!(a.artifact_id, "jopt-simple");
        assert_eq!(a.version, "5.0.4");
        assert_eq!(a.classifier, None);
        assert_eq!(a.packaging, "jar");
    }

    #[test]
    fn parse_with_classifier_and_packaging() {
        let a = MavenArtifact::parse("de.oceanlabs.mcp:mcp_config:1.16.5@zip").unwrap();
        assert_eq!(a.packaging, "zip");
        assert_eq!(a.filename(), "mcp_config-1.16.5.zip");

        let b = MavenArtifact::parse("org.lwjgl:lwjgl:3.3.3:natives-windows").unwrap();
        assert_eq!(b.classifier.as_deref(), Some("natives-windows"));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(MavenArtifact::parse("only:two").is_err());
        assert!(MavenArtifact::parse("a:b:c:d:e").is_err());
        assert!(MavenArtifact::parse("::1.0").is_err());
    }

    #[test]
    fn url_and_local_path_agree_on_layout() {
        let a = MavenArtifact::parse("net.sf.jopt-simple:jopt-simple:5.0.4").unwrap();
        assert_eq!(
            a.url(MOJANG_LIBRARIES),
            "https://libraries.minecraft.net/net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar"
        );
        assert_eq!(
            a.local_path(),
            PathBuf::from("net/sf/jopt-simple/jopt-simple/5.0.4/jopt-simple-5.0.4.jar")
        );
    }

    #[test]
    fn sidecar_url_appends_sha1_suffix() {
        let a = MavenArtifact::parse("net.minecraftforge:forge:1.7.10-10.13.4.1614").unwrap();
        assert!(a.sha1_sidecar_url(FORGE_MAVEN).ends_with(".jar.sha1"));
    }

    #[test]
    fn display_round_trips() {
        for coord in [
            "net.fabricmc:fabric-loader:0.16.10",
            "org.lwjgl:lwjgl:3.3.3:natives-windows",
            "de.oceanlabs.mcp:mcp_config:1.16.5@zip",
        ] {
            let a = MavenArtifact::parse(coord).unwrap();
            assert_eq!(a.to_string(), coord);
        }
    }
}
