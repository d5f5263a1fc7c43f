//! Filesystem primitives used by the scanner.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::types::FilesystemStats;

/// An immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    /// File name, lossily converted to UTF-8 for template matching.
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// The host operations the scan engine needs.
pub trait StorageBackend: Send + Sync {
    /// Lists the immediate children of `path`.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>>;

    /// Sums the sizes of all regular files below `path`.
    ///
    /// Unreadable entries below the top are skipped. Only a failure to read
    /// `path` itself is returned as an error.
    fn dir_size(&self, path: &Path) -> io::Result<u64>;

    /// Capacity and used space of the filesystem hosting `path`.
    fn fs_stats(&self, path: &Path) -> io::Result<FilesystemStats>;
}

/// The local disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl StorageBackend for LocalFs {
    fn list_dir(&self, path: &Path) -> io::Result<Vec<DirEntryInfo>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!("skipping unreadable entry in {}: {}", path.display(), e);
                    continue;
                }
            };
            // file_type does not follow symlinks; a link to a directory is not a directory
            let is_dir = entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
            out.push(DirEntryInfo {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path(),
                is_dir,
            });
        }
        Ok(out)
    }

    fn dir_size(&self, path: &Path) -> io::Result<u64> {
        let mut total: u64 = 0;
        for entry in WalkDir::new(path).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::trace!("skipping unreadable entry below {}: {}", path.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(md) => total = total.saturating_add(md.len()),
                Err(e) => tracing::trace!("metadata failed for {}: {}", entry.path().display(), e),
            }
        }
        Ok(total)
    }

    fn fs_stats(&self, path: &Path) -> io::Result<FilesystemStats> {
        platform_fs_stats(path)
    }
}

#[cfg(unix)]
fn platform_fs_stats(path: &Path) -> io::Result<FilesystemStats> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: statvfs only writes into the zeroed struct we own, and c_path is NUL-terminated.
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
    if ret != 0 {
        return Err(io::Error::last_os_error());
    }

    let block_size = stat.f_frsize as u64;
    let total_blocks = stat.f_blocks as u64;
    let free_blocks = stat.f_bfree as u64;
    Ok(FilesystemStats {
        capacity_bytes: total_blocks.saturating_mul(block_size),
        used_bytes: total_blocks.saturating_sub(free_blocks).saturating_mul(block_size),
    })
}

#[cfg(windows)]
fn platform_fs_stats(path: &Path) -> io::Result<FilesystemStats> {
    use std::os::windows::ffi::OsStrExt;
    use windows::core::PCWSTR;
    use windows::Win32::Storage::FileSystem::GetDiskFreeSpaceExW;

    let w: Vec<u16> = path.as_os_str().encode_wide().chain(std::iter::once(0)).collect();
    let mut free: u64 = 0;
    let mut total: u64 = 0;
    let mut total_free: u64 = 0;
    unsafe {
        GetDiskFreeSpaceExW(
            PCWSTR(w.as_ptr()),
            Some(&mut free as *mut u64),
            Some(&mut total as *mut u64),
            Some(&mut total_free as *mut u64),
        )
    }
    .map_err(|e| io::Error::other(e.to_string()))?;

    Ok(FilesystemStats { capacity_bytes: total, used_bytes: total.saturating_sub(total_free) })
}

#[cfg(not(any(unix, windows)))]
fn platform_fs_stats(_path: &Path) -> io::Result<FilesystemStats> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "filesystem statistics not supported on this platform"))
}
