/// Symlink-safe recursive removal for workspace trees.
///
/// A sandboxed script can leave symlinks inside its workspace. Removal walks the
/// tree through directory file descriptors (openat/fstatat/unlinkat with
/// O_NOFOLLOW), so a link is unlinked rather than followed, and refuses to
/// descend into a different filesystem.
use crate::config::types::{Result, ScriptboxError};
use std::ffi::{CStr, CString};
use std::os::fd::RawFd;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

const DIR_FLAGS: libc::c_int = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC | libc::O_NOFOLLOW;

fn fs_error(what: &str, subject: impl std::fmt::Debug) -> ScriptboxError {
    ScriptboxError::Filesystem(format!(
        "{} failed for {:?}: {}",
        what,
        subject,
        std::io::Error::last_os_error()
    ))
}

/// Owned directory descriptor
struct DirFd(RawFd);

impl DirFd {
    fn open(path: &Path) -> Result<Self> {
        let c_path = to_cstring(path)?;
        let fd = unsafe { libc::open(c_path.as_ptr(), DIR_FLAGS) };
        if fd < 0 {
            return Err(fs_error("open", path));
        }
        Ok(Self(fd))
    }

    fn open_child(&self, name: &CStr) -> Result<Self> {
        let fd = unsafe { libc::openat(self.0, name.as_ptr(), DIR_FLAGS) };
        if fd < 0 {
            return Err(fs_error("openat", name));
        }
        Ok(Self(fd))
    }

    fn stat_child(&self, name: &CStr) -> Result<libc::stat> {
        let mut st = std::mem::MaybeUninit::<libc::stat>::zeroed();
        let rc = unsafe {
            libc::fstatat(self.0, name.as_ptr(), st.as_mut_ptr(), libc::AT_SYMLINK_NOFOLLOW)
        };
        if rc != 0 {
            return Err(fs_error("fstatat", name));
        }
        Ok(unsafe { st.assume_init() })
    }

    fn unlink_child(&self, name: &CStr, is_dir: bool) -> Result<()> {
        let flags = if is_dir { libc::AT_REMOVEDIR } else { 0 };
        let rc = unsafe { libc::unlinkat(self.0, name.as_ptr(), flags) };
        if rc != 0 {
            return Err(fs_error("unlinkat", name));
        }
        Ok(())
    }

    /// Snapshot of entry names, excluding `.` and `..`
    fn entry_names(&self) -> Result<Vec<CString>> {
        let iter_fd = unsafe { libc::dup(self.0) };
        if iter_fd < 0 {
            return Err(fs_error("dup", self.0));
        }
        let dir = unsafe { libc::fdopendir(iter_fd) };
        if dir.is_null() {
            unsafe { libc::close(iter_fd) };
            return Err(fs_error("fdopendir", self.0));
        }

        let mut names = Vec::new();
        let outcome = loop {
            unsafe { *libc::__errno_location() = 0 };
            let entry = unsafe { libc::readdir(dir) };
            if entry.is_null() {
                let errno = unsafe { *libc::__errno_location() };
                break if errno == 0 {
                    Ok(())
                } else {
                    Err(ScriptboxError::Filesystem(format!(
                        "readdir failed: {}",
                        std::io::Error::from_raw_os_error(errno)
                    )))
                };
            }
            let name = unsafe { CStr::from_ptr((*entry).d_name.as_ptr()) };
            if name.to_bytes() != b"." && name.to_bytes() != b".." {
                names.push(name.to_owned());
            }
        };
        unsafe { libc::closedir(dir) };

        outcome.map(|_| names)
    }
}

impl Drop for DirFd {
    fn drop(&mut self) {
        if self.0 >= 0 {
            unsafe { libc::close(self.0) };
        }
    }
}

fn to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        ScriptboxError::Filesystem(format!("Path contains NUL byte: {}", path.display()))
    })
}

fn is_dir(st: &libc::stat) -> bool {
    st.st_mode & libc::S_IFMT == libc::S_IFDIR
}

fn empty_dir(dir: &DirFd, root_dev: libc::dev_t) -> Result<()> {
    for name in dir.entry_names()? {
        let st = dir.stat_child(&name)?;
        if is_dir(&st) {
            if st.st_dev != root_dev {
                return Err(ScriptboxError::Filesystem(format!(
                    "Refusing to cross filesystem boundary at {:?}",
                    name
                )));
            }
            let child = dir.open_child(&name)?;
            empty_dir(&child, root_dev)?;
            drop(child);
            dir.unlink_child(&name, true)?;
        } else {
            dir.unlink_child(&name, false)?;
        }
    }
    Ok(())
}

/// Remove `path` and everything below it without following symlinks.
/// A missing path is not an error.
pub fn remove_tree_secure(path: &Path) -> Result<()> {
    if std::fs::symlink_metadata(path).is_err() {
        return Ok(());
    }

    let parent = path.parent().ok_or_else(|| {
        ScriptboxError::Filesystem(format!("Cannot remove path without parent: {}", path.display()))
    })?;
    let name = path.file_name().ok_or_else(|| {
        ScriptboxError::Filesystem(format!("Cannot remove path without file name: {}", path.display()))
    })?;
    let name = CString::new(name.as_bytes()).map_err(|_| {
        ScriptboxError::Filesystem(format!("Path contains NUL byte: {}", path.display()))
    })?;

    let parent_fd = DirFd::open(parent)?;
    let st = parent_fd.stat_child(&name)?;
    if is_dir(&st) {
        let dir = parent_fd.open_child(&name)?;
        empty_dir(&dir, st.st_dev)?;
        drop(dir);
        parent_fd.unlink_child(&name, true)
    } else {
        parent_fd.unlink_child(&name, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    #[test]
    fn test_removes_nested_tree() {
        let base = tempfile::tempdir().unwrap();
        let root = base.path().join("run");
        std::fs::create_dir_all(root.join("a/b/c")).unwrap();
        std::fs::write(root.join("a/b/c/file.txt"), b"data").unwrap();
        std::fs::write(root.join("top.txt"), b"data").unwrap();

        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_does_not_follow_symlinks() {
        let base = tempfile::tempdir().unwrap();
        let outside = base.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        std::fs::write(outside.join("keep.txt"), b"keep").unwrap();

        let root = base.path().join("run");
        std::fs::create_dir(&root).unwrap();
        symlink(&outside, root.join("escape")).unwrap();

        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
        assert!(outside.join("keep.txt").exists());
    }

    #[test]
    fn test_missing_path_is_ok() {
        let base = tempfile::tempdir().unwrap();
        assert!(remove_tree_secure(&base.path().join("never-created")).is_ok());
    }
}
