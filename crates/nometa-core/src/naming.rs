//! Output naming: `name.ext`, then `name(1).ext`, `name(2).ext`, ...

use crate::StripError;
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// First path of the form `dir/name`, `dir/stem(1)ext`, `dir/stem(2)ext`, ...
/// that is not taken right now.
///
/// The check is not a reservation; [`write_unique`] closes that gap for
/// writers inside this process.
pub fn resolve_unique_path(dir: &Path, name: &str) -> PathBuf {
    candidates(dir, name)
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| dir.join(name))
}

/// A directory entry of any kind, dangling symlinks included.
fn is_taken(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn candidates<'a>(dir: &'a Path, name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
    let file = Path::new(name);
    let stem = file
        .file_stem()
        .map_or_else(|| name.to_string(), |s| s.to_string_lossy().into_owned());
    let suffix = file
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    std::iter::once(dir.join(name))
        .chain((1u64..).map(move |i| dir.join(format!("{stem}({i}){suffix}"))))
}

/// Writes `bytes` under the first free name in `dir`, creating the file
/// exclusively so an existing file is never replaced.
///
/// Probing only moves forward: a name lost to another writer is never tried
/// again. A file whose contents could not be written is removed.
pub fn write_unique(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, StripError> {
    for target in candidates(dir, name).filter(|candidate| !is_taken(candidate)) {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!(path = %target.display(), "name taken after resolution, probing on");
                continue;
            }
            Err(source) => {
                return Err(StripError::Filesystem {
                    path: target,
                    source,
                });
            }
        };
        let written = file.write_all(bytes).and_then(|()| file.sync_all());
        drop(file);
        return keep_or_discard(target, written);
    }
    Err(StripError::Filesystem {
        path: dir.join(name),
        source: io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
    })
}

/// Removes `target` again when writing its contents failed.
fn keep_or_discard(target: PathBuf, written: io::Result<()>) -> Result<PathBuf, StripError> {
    match written {
        Ok(()) => Ok(target),
        Err(source) => {
            if let Err(e) = fs::remove_file(&target) {
                warn!(path = %target.display(), error = %e, "could not remove partial output");
            }
            Err(StripError::Filesystem {
                path: target,
                source,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_name_is_returned_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_unique_path(dir.path(), "photo.jpg"), dir.path().join("photo.jpg"));
    }

    #[test]
    fn taken_names_get_ascending_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("photo.jpg"), b"x").unwrap();
        assert_eq!(resolve_unique_path(dir.path(), "photo.jpg"), dir.path().join("photo(1).jpg"));

        fs::write(dir.path().join("photo(1).jpg"), b"x").unwrap();
        assert_eq!(resolve_unique_path(dir.path(), "photo.jpg"), dir.path().join("photo(2).jpg"));
    }

    #[test]
    fn names_without_extension_and_with_dots() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README"), b"x").unwrap();
        fs::write(dir.path().join("a.b.png"), b"x").unwrap();
        assert_eq!(resolve_unique_path(dir.path(), "README"), dir.path().join("README(1)"));
        assert_eq!(resolve_unique_path(dir.path(), "a.b.png"), dir.path().join("a.b(1).png"));
    }

    #[test]
    fn write_unique_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_unique(dir.path(), "x.gif", b"first").unwrap();
        let second = write_unique(dir.path(), "x.gif", b"second").unwrap();
        assert_eq!(first, dir.path().join("x.gif"));
        assert_eq!(second, dir.path().join("x(1).gif"));
        assert_eq!(fs::read(first).unwrap(), b"first");
        assert_eq!(fs::read(second).unwrap(), b"second");
    }

    #[test]
    fn missing_directory_is_a_filesystem_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_unique(&dir.path().join("nope"), "x.png", b"").unwrap_err();
        assert!(matches!(err, StripError::Filesystem { .. }));
    }

    #[test]
    fn failed_write_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("half.jpg");
        fs::write(&target, b"\xFF\xD8 truncated").unwrap();

        let err = keep_or_discard(target.clone(), Err(io::Error::other("disk full"))).unwrap_err();
        assert!(matches!(err, StripError::Filesystem { ref path, .. } if path == &target));
        assert!(!target.exists());

        fs::write(&target, b"complete").unwrap();
        assert_eq!(keep_or_discard(target.clone(), Ok(())).unwrap(), target);
        assert!(target.exists());
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_counts_as_taken() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("photo.jpg");
        std::os::unix::fs::symlink(dir.path().join("missing-target.jpg"), &link).unwrap();

        assert_eq!(resolve_unique_path(dir.path(), "photo.jpg"), dir.path().join("photo(1).jpg"));
        let written = write_unique(dir.path(), "photo.jpg", b"clean").unwrap();
        assert_eq!(written, dir.path().join("photo(1).jpg"));
        assert_eq!(fs::read(&written).unwrap(), b"clean");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert!(!dir.path().join("missing-target.jpg").exists());
    }
}
