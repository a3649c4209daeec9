// ─── Native Extractor ───
// Unpacks native binaries out of downloaded jars into a flat directory.

use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{UpdaterError, UpdaterResult};

const NATIVE_EXTENSIONS: [&str; 3] = ["so", "dylib", "dll"];

/// Extract every jar in `natives_dir` into that same directory, flattened.
///
/// Extraction is skipped entirely when a native binary already sits in the
/// directory and `force` is false. Stray metadata entries (`.git`, `.sha1`
/// sidecars) are removed whether or not extraction ran. Returns the number
/// of files written.
pub async fn extract_natives(natives_dir: &Path, force: bool) -> UpdaterResult<usize> {
    if !natives_dir.is_dir() {
        return Ok(0);
    }

    let mut written = 0;
    if force || !has_extracted_binaries(natives_dir).await? {
        for jar in files_with_extension(natives_dir, "jar").await? {
            written += unpack_flat(&jar, natives_dir)?;
        }
        if written > 0 {
            info!("Extracted {} native files", written);
        }
    } else {
        debug!("Natives already extracted, skipping");
    }

    remove_stray_metadata(natives_dir).await?;
    Ok(written)
}

async fn has_extracted_binaries(dir: &Path) -> UpdaterResult<bool> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| UpdaterError::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| UpdaterError::io(dir, e))? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if NATIVE_EXTENSIONS.contains(&ext) {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn files_with_extension(dir: &Path, wanted: &str) -> UpdaterResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| UpdaterError::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| UpdaterError::io(dir, e))? {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(wanted) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Write every file entry of the archive directly into `dir`, keeping only
/// the entry's file name. Directory entries are dropped.
fn unpack_flat(jar: &Path, dir: &Path) -> UpdaterResult<usize> {
    let file = std::fs::File::open(jar).map_err(|e| UpdaterError::io(jar, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(file_name) = Path::new(entry.name())
            .file_name()
            .map(|n| n.to_os_string())
        else {
            continue;
        };

        let dest = dir.join(file_name);
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        std::fs::write(&dest, bytes).map_err(|e| UpdaterError::io(&dest, e))?;
        written += 1;
    }
    Ok(written)
}

async fn remove_stray_metadata(dir: &Path) -> UpdaterResult<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| UpdaterError::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| UpdaterError::io(dir, e))? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if name == ".git" || name.ends_with(".sha1") {
            debug!("Removing stray {}", name);
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| UpdaterError::io(&path, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut jar = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        for (name, data) in entries {
            jar.start_file(*name, options).unwrap();
            jar.write_all(data).unwrap();
        }
        jar.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_jar_contents_flat() {
        let dir = tempfile::tempdir().unwrap();
        write_jar(
            &dir.path().join("lwjgl-natives-linux.jar"),
            &[
                ("natives/linux/x64/liblwjgl.so", b"elf"),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0"),
            ],
        );

        let written = extract_natives(dir.path(), false).await.unwrap();

        assert_eq!(written, 2);
        assert_eq!(
            std::fs::read(dir.path().join("liblwjgl.so")).unwrap(),
            b"elf"
        );
        assert!(dir.path().join("MANIFEST.MF").is_file());
        assert!(dir.path().join("lwjgl-natives-linux.jar").is_file());
    }

    #[tokio::test]
    async fn present_binaries_skip_extraction() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libold.so"), b"elf").unwrap();
        write_jar(&dir.path().join("update.jar"), &[("libnew.so", b"elf2")]);

        let written = extract_natives(dir.path(), false).await.unwrap();

        assert_eq!(written, 0);
        assert!(!dir.path().join("libnew.so").exists());
    }

    #[tokio::test]
    async fn force_reextracts_over_present_binaries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libold.so"), b"elf").unwrap();
        write_jar(&dir.path().join("update.jar"), &[("libnew.so", b"elf2")]);

        let written = extract_natives(dir.path(), true).await.unwrap();

        assert_eq!(written, 1);
        assert!(dir.path().join("libnew.so").is_file());
    }

    #[tokio::test]
    async fn stray_metadata_removed_even_when_extraction_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("libold.so"), b"elf").unwrap();
        std::fs::write(dir.path().join(".git"), b"gitdir: nowhere").unwrap();
        std::fs::write(dir.path().join("lwjgl.jar.sha1"), b"abc").unwrap();

        extract_natives(dir.path(), false).await.unwrap();

        assert!(!dir.path().join(".git").exists());
        assert!(!dir.path().join("lwjgl.jar.sha1").exists());
        assert!(dir.path().join("libold.so").is_file());
    }

    #[tokio::test]
    async fn missing_directory_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let absent = dir.path().join("natives");
        assert_eq!(extract_natives(&absent, false).await.unwrap(), 0);
    }
}
