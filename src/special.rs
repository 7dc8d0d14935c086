//! Special-file (symlink) codec (component F).
//!
//! Encodes a symlink as the textual sidecar `"link " + target` with no
//! terminator, and reconstructs a symlink from that sidecar. Both
//! directions write to a sibling temp file and rename atomically over the
//! destination.

#[cfg(unix)]
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, SubstError};

const LINK_TOKEN: &[u8] = b"link";

/// Filesystem form → repository form. `src` may be a regular file or a
/// symlink; anything else is `Unsupported` (§4.6 "Detranslate").
pub fn detranslate(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| SubstError::io("stat", src, e))?;
    let dir = dst.parent().unwrap_or_else(|| Path::new("."));
    let mut temp =
        NamedTempFile::new_in(dir).map_err(|e| SubstError::io("create temp file", dir, e))?;
    let temp_path = temp.path().to_path_buf();

    if meta.file_type().is_symlink() {
        let target = fs::read_link(src).map_err(|e| SubstError::io("read link", src, e))?;
        let mut contents = LINK_TOKEN.to_vec();
        contents.push(b' ');
        contents.extend_from_slice(&path_to_bytes(&target));
        std::io::Write::write_all(&mut temp, &contents)
            .map_err(|e| SubstError::io("write", &temp_path, e))?;
    } else if meta.file_type().is_file() {
        let mut source = File::open(src).map_err(|e| SubstError::io("open", src, e))?;
        std::io::copy(&mut source, &mut temp).map_err(|e| SubstError::io("copy", src, e))?;
    } else {
        return Err(SubstError::Unsupported {
            identifier: "non-regular file".to_string(),
        });
    }

    temp.persist(dst)
        .map_err(|e| SubstError::io("rename", dst, e.error))?;
    Ok(())
}

/// Repository form → filesystem form. Reads the sidecar (detranslating
/// first if `src` is itself a symlink), and dispatches on its leading
/// token (§4.6 "Materialize").
pub fn materialize(src: &Path, dst: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(src).map_err(|e| SubstError::io("stat", src, e))?;
    let contents = if meta.file_type().is_symlink() {
        let scratch_dir = src.parent().unwrap_or_else(|| Path::new("."));
        let scratch_path = {
            let scratch = NamedTempFile::new_in(scratch_dir)
                .map_err(|e| SubstError::io("create temp file", scratch_dir, e))?;
            let path = scratch.path().to_path_buf();
            scratch
                .close()
                .map_err(|e| SubstError::io("remove temp file", &path, e))?;
            path
        };
        detranslate(src, &scratch_path)?;
        let bytes =
            fs::read(&scratch_path).map_err(|e| SubstError::io("read", &scratch_path, e))?;
        let _ = fs::remove_file(&scratch_path);
        bytes
    } else {
        fs::read(src).map_err(|e| SubstError::io("read", src, e))?
    };

    let split = contents.iter().position(|&b| b == b' ');
    let (token, rest): (&[u8], &[u8]) = match split {
        Some(idx) => (&contents[..idx], &contents[idx + 1..]),
        None => (&contents[..], &[][..]),
    };

    let dir = dst.parent().unwrap_or_else(|| Path::new("."));

    if token == LINK_TOKEN {
        let target = bytes_to_path(rest);
        return match create_symlink_atomic(&target, dst, dir) {
            Ok(()) => Ok(()),
            Err(SubstError::Unsupported { .. }) => {
                let mut temp = NamedTempFile::new_in(dir)
                    .map_err(|e| SubstError::io("create temp file", dir, e))?;
                let temp_path = temp.path().to_path_buf();
                std::io::Write::write_all(&mut temp, &contents)
                    .map_err(|e| SubstError::io("write", &temp_path, e))?;
                temp.persist(dst)
                    .map_err(|e| SubstError::io("rename", dst, e.error))?;
                Ok(())
            }
            Err(e) => Err(e),
        };
    }

    Err(SubstError::Unsupported {
        identifier: String::from_utf8_lossy(token).into_owned(),
    })
}

/// Create a symlink at `dst` pointing to `target`, via a uniquely-named
/// sibling path and an atomic rename. Fails with
/// [`SubstError::Unsupported`] if the host doesn't support symlinks at
/// all, so the caller can fall back to a plain copy.
fn create_symlink_atomic(target: &Path, dst: &Path, dir: &Path) -> Result<()> {
    let temp_path = reserve_temp_path(dir)?;
    match platform::create_symlink(target, &temp_path) {
        Ok(()) => {
            fs::rename(&temp_path, dst).map_err(|e| SubstError::io("rename", dst, e))?;
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::Unsupported => Err(SubstError::Unsupported {
            identifier: LINK_TOKEN_STR.to_string(),
        }),
        Err(e) => Err(SubstError::io("create symlink", &temp_path, e)),
    }
}

const LINK_TOKEN_STR: &str = "link";

/// Reserve a unique path in `dir` by creating then immediately removing a
/// temp file — `create_symlink` then occupies that name. There is a small
/// window between the two operations; acceptable here since symlink
/// materialization targets a caller-owned working copy, not a shared
/// directory under adversarial control.
fn reserve_temp_path(dir: &Path) -> Result<PathBuf> {
    let temp =
        NamedTempFile::new_in(dir).map_err(|e| SubstError::io("create temp file", dir, e))?;
    let path = temp.path().to_path_buf();
    temp.close()
        .map_err(|e| SubstError::io("remove temp file", &path, e))?;
    Ok(path)
}

#[cfg(unix)]
fn path_to_bytes(p: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    p.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(p: &Path) -> Vec<u8> {
    p.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn bytes_to_path(b: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(OsStr::from_bytes(b))
}

#[cfg(not(unix))]
fn bytes_to_path(b: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(b).into_owned())
}

#[cfg(unix)]
mod platform {
    use std::path::Path;

    pub(super) fn create_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }
}

#[cfg(not(unix))]
mod platform {
    use std::path::Path;

    pub(super) fn create_symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
        Err(std::io::Error::from(std::io::ErrorKind::Unsupported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn detranslate_regular_file_copies_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("plain.txt");
        fs::write(&src, b"hello").unwrap();
        let dst = dir.path().join("out.txt");

        detranslate(&src, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"hello");
    }

    #[cfg(unix)]
    #[test]
    fn detranslate_symlink_encodes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let link = dir.path().join("l");
        std::os::unix::fs::symlink("/etc/hosts", &link).unwrap();
        let dst = dir.path().join("sidecar");

        detranslate(&link, &dst).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"link /etc/hosts");
    }

    #[cfg(unix)]
    #[test]
    fn materialize_roundtrips_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("sidecar");
        let mut f = fs::File::create(&sidecar).unwrap();
        f.write_all(b"link /etc/hosts").unwrap();
        drop(f);

        let dst = dir.path().join("restored");
        materialize(&sidecar, &dst).unwrap();

        let meta = fs::symlink_metadata(&dst).unwrap();
        assert!(meta.file_type().is_symlink());
        assert_eq!(fs::read_link(&dst).unwrap(), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn materialize_rejects_unknown_token() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("sidecar");
        fs::write(&sidecar, b"bogus /etc/hosts").unwrap();
        let dst = dir.path().join("restored");

        let err = materialize(&sidecar, &dst).unwrap_err();
        assert!(matches!(err, SubstError::Unsupported { identifier } if identifier == "bogus"));
    }
}
