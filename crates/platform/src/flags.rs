//! Access to the per-inode flag word.
//!
//! Linux exposes the word through the `FS_IOC_GETFLAGS`/`FS_IOC_SETFLAGS`
//! ioctls on an open descriptor. The BSD family and macOS report it as
//! `st_flags` and change it through `chflags`-class calls.

use std::io;

/// Whether this build can read and write the flag word at all.
pub const SUPPORTED: bool = cfg!(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
));

/// Returns `true` for error codes that mean "this filesystem or object has no
/// flag word", as opposed to a permission problem.
pub fn is_unsupported(error: &io::Error) -> bool {
    #[cfg(unix)]
    {
        matches!(
            error.raw_os_error(),
            Some(libc::ENOTTY | libc::EOPNOTSUPP | libc::ENOSYS | libc::EINVAL)
        ) || error.kind() == io::ErrorKind::Unsupported
    }

    #[cfg(not(unix))]
    {
        error.kind() == io::ErrorKind::Unsupported
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use crate::interrupt::retry_on_interrupt;
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::fs::OpenOptionsExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    // The request numbers are declared with `long`, the kernel transfers an `int`.
    nix::ioctl_read_bad!(
        fs_ioc_getflags,
        nix::request_code_read!(b'f', 1, std::mem::size_of::<libc::c_long>()),
        libc::c_int
    );
    nix::ioctl_write_ptr_bad!(
        fs_ioc_setflags,
        nix::request_code_write!(b'f', 2, std::mem::size_of::<libc::c_long>()),
        libc::c_int
    );

    fn open_with(path: &Path, flags: libc::c_int) -> io::Result<File> {
        retry_on_interrupt(|| {
            OpenOptions::new()
                .read(true)
                .custom_flags(flags)
                .open(path)
        })
    }

    /// Opens `path` read-only without following a final symlink, suitable for
    /// the flag ioctls.
    ///
    /// `O_NOATIME` is requested first and dropped when the kernel refuses it
    /// with `EPERM` (the caller does not own the file).
    pub fn open_for_flags(path: &Path, directory: bool) -> io::Result<File> {
        let mut base = libc::O_NONBLOCK | libc::O_NOFOLLOW | libc::O_CLOEXEC;
        if directory {
            base |= libc::O_DIRECTORY;
        }
        match open_with(path, base | libc::O_NOATIME) {
            Err(error) if error.raw_os_error() == Some(libc::EPERM) => open_with(path, base),
            other => other,
        }
    }

    /// Reads the flag word of an open file.
    pub fn get_flags(file: &File) -> io::Result<u32> {
        let fd = file.as_raw_fd();
        let mut word: libc::c_int = 0;
        retry_on_interrupt(|| {
            unsafe { fs_ioc_getflags(fd, &raw mut word) }
                .map(|_| ())
                .map_err(io::Error::from)
        })?;
        Ok(word as u32)
    }

    /// Replaces the flag word of an open file.
    pub fn set_flags(file: &File, flags: u32) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let word = flags as libc::c_int;
        retry_on_interrupt(|| {
            unsafe { fs_ioc_setflags(fd, &raw const word) }
                .map(|_| ())
                .map_err(io::Error::from)
        })
    }
}

#[cfg(target_os = "linux")]
pub use linux::{get_flags, open_for_flags, set_flags};

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod bsd {
    use crate::interrupt::retry_on_interrupt;
    use std::ffi::CString;
    use std::fs::{File, Metadata};
    use std::io;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    fn path_to_c(path: &Path) -> io::Result<CString> {
        CString::new(path.as_os_str().as_bytes())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains interior NUL"))
    }

    fn check(result: libc::c_int) -> io::Result<()> {
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Returns the `st_flags` word recorded in `metadata`.
    pub fn stat_flags(metadata: &Metadata) -> u32 {
        #[cfg(target_os = "macos")]
        use std::os::macos::fs::MetadataExt;
        #[cfg(target_os = "ios")]
        use std::os::ios::fs::MetadataExt;
        #[cfg(target_os = "freebsd")]
        use std::os::freebsd::fs::MetadataExt;
        #[cfg(target_os = "netbsd")]
        use std::os::netbsd::fs::MetadataExt;
        #[cfg(target_os = "openbsd")]
        use std::os::openbsd::fs::MetadataExt;
        #[cfg(target_os = "dragonfly")]
        use std::os::dragonfly::fs::MetadataExt;

        metadata.st_flags()
    }

    /// Sets the flag word of `path` without following a final symlink.
    #[cfg(not(target_os = "openbsd"))]
    pub fn lchflags(path: &Path, flags: u32) -> io::Result<()> {
        let c_path = path_to_c(path)?;
        retry_on_interrupt(|| check(unsafe { libc::lchflags(c_path.as_ptr(), flags as _) }))
    }

    /// Sets the flag word of `path` without following a final symlink.
    #[cfg(target_os = "openbsd")]
    pub fn lchflags(path: &Path, flags: u32) -> io::Result<()> {
        let c_path = path_to_c(path)?;
        retry_on_interrupt(|| {
            check(unsafe {
                libc::chflagsat(
                    libc::AT_FDCWD,
                    c_path.as_ptr(),
                    flags as _,
                    libc::AT_SYMLINK_NOFOLLOW,
                )
            })
        })
    }

    /// Sets the flag word of an open file.
    pub fn fchflags(file: &File, flags: u32) -> io::Result<()> {
        let fd = file.as_raw_fd();
        retry_on_interrupt(|| check(unsafe { libc::fchflags(fd, flags as _) }))
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub use bsd::{fchflags, lchflags, stat_flags};
