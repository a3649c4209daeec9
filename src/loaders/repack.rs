// ─── Jar transforms ───
// Pure unpack/strip/repack steps over filesystem paths, composed by the
// patch-and-subprocess strategy. Each step is testable on its own.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;

use crate::error::{UpdaterError, UpdaterResult};

/// Unpack an archive into `dest`, preserving entry paths. Entries that
/// would escape `dest` are skipped. Existing files are overwritten, which
/// is what lets a patches archive overlay an unpacked installer.
pub fn unpack_jar(jar: &Path, dest: &Path) -> UpdaterResult<usize> {
    let file = std::fs::File::open(jar).map_err(|e| UpdaterError::io(jar, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    std::fs::create_dir_all(dest).map_err(|e| UpdaterError::io(dest, e))?;
    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            continue;
        };
        let target = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| UpdaterError::io(&target, e))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| UpdaterError::io(parent, e))?;
        }
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        std::fs::write(&target, bytes).map_err(|e| UpdaterError::io(&target, e))?;
        written += 1;
    }
    Ok(written)
}

/// Delete the given entry paths from an unpacked tree. A pattern ending
/// in `/` names a whole directory. Missing entries are not an error;
/// returns how many were actually removed.
pub fn strip_entries(root: &Path, patterns: &[String]) -> UpdaterResult<usize> {
    let mut removed = 0;
    for pattern in patterns {
        if let Some(dir) = pattern.strip_suffix('/') {
            let target = root.join(dir);
            if target.is_dir() {
                std::fs::remove_dir_all(&target).map_err(|e| UpdaterError::io(&target, e))?;
                removed += 1;
            }
        } else {
            let target = root.join(pattern);
            if target.is_file() {
                std::fs::remove_file(&target).map_err(|e| UpdaterError::io(&target, e))?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Pack a directory tree back into a jar. Entry names use forward
/// slashes and are emitted in sorted order so repacks are reproducible.
pub fn repack_jar(root: &Path, jar_out: &Path) -> UpdaterResult<usize> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let out = std::fs::File::create(jar_out).map_err(|e| UpdaterError::io(jar_out, e))?;
    let mut jar = zip::ZipWriter::new(out);
    let options = SimpleFileOptions::default();
    for rel in &files {
        let name = rel.to_string_lossy().replace('\\', "/");
        jar.start_file(name, options)?;
        let source = root.join(rel);
        let bytes = std::fs::read(&source).map_err(|e| UpdaterError::io(&source, e))?;
        jar.write_all(&bytes).map_err(|e| UpdaterError::io(jar_out, e))?;
    }
    jar.finish()?;
    Ok(files.len())
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> UpdaterResult<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| UpdaterError::io(dir, e))? {
        let entry = entry.map_err(|e| UpdaterError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            files.push(rel.to_path_buf());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
    }

    fn read_entry(jar: &Path, name: &str) -> Vec<u8> {
        let file = std::fs::File::open(jar).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn unpack_preserves_nested_paths() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("in.jar");
        write_zip(&jar, &[("top.txt", b"a"), ("sub/inner.txt", b"b")]);

        let unpacked = dir.path().join("tree");
        assert_eq!(unpack_jar(&jar, &unpacked).unwrap(), 2);
        assert_eq!(std::fs::read(unpacked.join("top.txt")).unwrap(), b"a");
        assert_eq!(std::fs::read(unpacked.join("sub/inner.txt")).unwrap(), b"b");
    }

    #[test]
    fn second_unpack_overlays_existing_entries() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.jar");
        let patches = dir.path().join("patches.jar");
        write_zip(&base, &[("code/Main.class", b"v1"), ("keep.txt", b"k")]);
        write_zip(&patches, &[("code/Main.class", b"v2")]);

        let tree = dir.path().join("tree");
        unpack_jar(&base, &tree).unwrap();
        unpack_jar(&patches, &tree).unwrap();

        assert_eq!(std::fs::read(tree.join("code/Main.class")).unwrap(), b"v2");
        assert_eq!(std::fs::read(tree.join("keep.txt")).unwrap(), b"k");
    }

    #[test]
    fn strip_removes_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        std::fs::create_dir_all(tree.join("META-INF")).unwrap();
        std::fs::write(tree.join("META-INF/SIGNER.SF"), b"sig").unwrap();
        std::fs::write(tree.join("META-INF/SIGNER.RSA"), b"sig").unwrap();
        std::fs::write(tree.join("app.txt"), b"x").unwrap();

        let removed = strip_entries(
            &tree,
            &[
                "META-INF/SIGNER.SF".to_string(),
                "META-INF/SIGNER.RSA".to_string(),
                "absent.txt".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(removed, 2);
        assert!(!tree.join("META-INF/SIGNER.SF").exists());
        assert!(tree.join("app.txt").is_file());

        assert_eq!(strip_entries(&tree, &["META-INF/".to_string()]).unwrap(), 1);
        assert!(!tree.join("META-INF").exists());
    }

    #[test]
    fn repack_round_trips_a_tree() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        std::fs::create_dir_all(tree.join("a/b")).unwrap();
        std::fs::write(tree.join("root.txt"), b"r").unwrap();
        std::fs::write(tree.join("a/b/deep.txt"), b"d").unwrap();

        let jar = dir.path().join("out.jar");
        assert_eq!(repack_jar(&tree, &jar).unwrap(), 2);
        assert_eq!(read_entry(&jar, "root.txt"), b"r");
        assert_eq!(read_entry(&jar, "a/b/deep.txt"), b"d");
    }
}
