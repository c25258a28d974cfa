//! Filesystem capability boundary.
//!
//! The engine never calls `std::fs` directly; it goes through this trait so
//! that platform-conditional behavior (permission bits, ACL grants) and test
//! substitution both have one seam instead of being sprinkled through the
//! transaction logic. All paths at this boundary are UTF-8; conversion to
//! the platform's native path representation happens here, not upstream.

use std::fs;
use std::io;
use std::path::Path;

pub trait FsOps {
    fn exists(&self, path: &str) -> bool;
    fn file_size(&self, path: &str) -> Option<u64>;
    fn mkdir_recursive(&self, path: &str) -> io::Result<()>;
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
    fn remove_file(&self, path: &str) -> io::Result<()>;
    fn remove_tree(&self, path: &str) -> io::Result<()>;
    fn read_to_vec(&self, path: &str) -> io::Result<Vec<u8>>;
    fn write_bytes(&self, path: &str, data: &[u8]) -> io::Result<()>;

    /// Grants the executable bit to well-known binaries after a commit. A
    /// no-op on platforms without a unix-style permission model.
    fn set_executable(&self, path: &str) -> io::Result<()>;
}

/// The real filesystem, rooted wherever the caller's paths point.
pub struct RealFs;

impl FsOps for RealFs {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn file_size(&self, path: &str) -> Option<u64> {
        fs::metadata(path).ok().map(|m| m.len())
    }

    fn mkdir_recursive(&self, path: &str) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove_file(&self, path: &str) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_tree(&self, path: &str) -> io::Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn read_to_vec(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_bytes(&self, path: &str, data: &[u8]) -> io::Result<()> {
        fs::write(path, data)
    }

    #[cfg(unix)]
    fn set_executable(&self, path: &str) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o755);
        fs::set_permissions(path, perms)
    }

    #[cfg(not(unix))]
    fn set_executable(&self, _path: &str) -> io::Result<()> {
        Ok(())
    }
}
