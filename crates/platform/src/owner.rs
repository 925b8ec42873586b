//! Numeric ownership changes.

use crate::interrupt::retry_on_interrupt;
use crate::path_to_c;
use std::io;
use std::path::Path;

/// Sets the owner and group of `path` itself, never of a symlink target.
pub fn lchown(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    let c_path = path_to_c(path)?;
    retry_on_interrupt(|| {
        let result = unsafe {
            libc::lchown(
                c_path.as_ptr(),
                uid as libc::uid_t,
                gid as libc::gid_t,
            )
        };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    })
}
