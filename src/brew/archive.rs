// src/brew/archive.rs

//! Source archive staging
//!
//! Unpacks a fetched archive into the build workdir by shelling out to
//! `tar`, picking flags from the filename. If the archive wraps everything
//! in a single top-level directory, that directory becomes the build root.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Unpack `archive` into `dest`, returning the directory to build in
pub fn stage(archive: &Path, filename: &str, dest: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dest)?;

    match tar_flags(filename) {
        Some(flags) => {
            debug!("unpacking {} with tar {}", archive.display(), flags.join(" "));
            let output = Command::new("tar")
                .args(flags)
                .arg(archive)
                .arg("-C")
                .arg(dest)
                .output()?;
            if !output.status.success() {
                return Err(Error::InitError(format!(
                    "tar failed on {}: {}",
                    archive.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
        }
        None => {
            // Not an archive we recognize; stage the file as-is
            fs::copy(archive, dest.join(filename))?;
            return Ok(dest.to_path_buf());
        }
    }

    Ok(build_root(dest)?)
}

fn tar_flags(filename: &str) -> Option<&'static [&'static str]> {
    if filename.ends_with(".tar.gz") || filename.ends_with(".tgz") {
        Some(&["-xzf"])
    } else if filename.ends_with(".tar.xz") || filename.ends_with(".txz") {
        Some(&["-xJf"])
    } else if filename.ends_with(".tar.bz2") || filename.ends_with(".tbz2") {
        Some(&["-xjf"])
    } else if filename.ends_with(".tar.zst") {
        Some(&["--zstd", "-xf"])
    } else if filename.ends_with(".tar") {
        Some(&["-xf"])
    } else {
        None
    }
}

/// Enter a lone top-level directory, the common archive layout
fn build_root(dest: &Path) -> Result<PathBuf> {
    let entries: Vec<_> = fs::read_dir(dest)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(dest.to_path_buf()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tar_flags_by_extension() {
        assert_eq!(tar_flags("pkg-1.0.tar.gz"), Some(&["-xzf"][..]));
        assert_eq!(tar_flags("pkg.tgz"), Some(&["-xzf"][..]));
        assert_eq!(tar_flags("pkg.tar.xz"), Some(&["-xJf"][..]));
        assert_eq!(tar_flags("pkg.tar.bz2"), Some(&["-xjf"][..]));
        assert_eq!(tar_flags("pkg.tar"), Some(&["-xf"][..]));
        assert_eq!(tar_flags("pkg.zip"), None);
    }

    #[test]
    fn test_unrecognized_file_staged_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("blob.bin");
        fs::write(&src, b"payload").unwrap();
        let dest = dir.path().join("work");

        let root = stage(&src, "blob.bin", &dest).unwrap();
        assert_eq!(root, dest);
        assert_eq!(fs::read(dest.join("blob.bin")).unwrap(), b"payload");
    }

    #[test]
    fn test_tarball_with_single_top_dir() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("pkg-1.0");
        fs::create_dir_all(&tree).unwrap();
        fs::write(tree.join("README"), "hello").unwrap();

        let archive = dir.path().join("pkg-1.0.tar.gz");
        let status = Command::new("tar")
            .arg("-czf")
            .arg(&archive)
            .arg("-C")
            .arg(dir.path())
            .arg("pkg-1.0")
            .status()
            .unwrap();
        assert!(status.success());

        let dest = dir.path().join("work");
        let root = stage(&archive, "pkg-1.0.tar.gz", &dest).unwrap();
        assert!(root.ends_with("pkg-1.0"));
        assert!(root.join("README").is_file());
    }
}
