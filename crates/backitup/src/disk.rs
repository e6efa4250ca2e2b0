//! Free-space queries for backup destinations.

use std::io;
use std::path::Path;

/// Reports the bytes available to the current user at a path.
///
/// Implementations must fail with [`io::ErrorKind::NotFound`] when the path
/// does not exist.
pub trait DiskSpaceOracle: Send + Sync {
    fn available_bytes(&self, path: &Path) -> io::Result<u64>;
}

/// Queries the filesystem through `statvfs`/`GetDiskFreeSpaceEx`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsDiskSpace;

impl DiskSpaceOracle for FsDiskSpace {
    fn available_bytes(&self, path: &Path) -> io::Result<u64> {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            ));
        }
        fs2::available_space(path)
    }
}

/// Formats a byte count as mebibytes with two decimals.
pub fn format_mib(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / (1024.0 * 1024.0))
}
