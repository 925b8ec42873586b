//! `mkfifo`/`mknod` wrappers for Apple platforms.

use crate::interrupt::retry_on_interrupt;
use crate::path_to_c;
use std::io;
use std::path::Path;

/// Creates a named pipe at `path`.
pub fn mkfifo(path: &Path, mode: libc::mode_t) -> io::Result<()> {
    let c_path = path_to_c(path)?;
    retry_on_interrupt(|| {
        let result = unsafe { libc::mkfifo(c_path.as_ptr(), mode) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    })
}

/// Creates a filesystem node whose type is encoded in `mode`.
pub fn mknod(path: &Path, mode: libc::mode_t, device: libc::dev_t) -> io::Result<()> {
    let c_path = path_to_c(path)?;
    retry_on_interrupt(|| {
        let result = unsafe { libc::mknod(c_path.as_ptr(), mode, device) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    })
}
