#![allow(unsafe_code)]
#![deny(missing_docs)]

//! Platform-specific syscall wrappers for dupluxy.
//!
//! Every `unsafe` block in the workspace lives in this crate. The wrappers
//! expose plain [`std::io::Result`] signatures so the higher-level crates can
//! keep `#![deny(unsafe_code)]`.
//!
//! - [`interrupt`] coalesces `EINTR` for every call site.
//! - [`flags`] reads and writes the OS flag word (`FS_IOC_GETFLAGS` on Linux,
//!   `st_flags`/`chflags` on the BSD family and macOS).
//! - [`privilege`] answers whether the process runs with root privileges.
//! - [`owner`] changes numeric ownership without following symlinks.
//! - [`node`] creates fifos and device nodes on Apple platforms, where
//!   `mknodat` is unavailable.

pub mod flags;
pub mod interrupt;
#[cfg(any(
    target_os = "ios",
    target_os = "macos",
    target_os = "tvos",
    target_os = "watchos"
))]
pub mod node;
#[cfg(unix)]
pub mod owner;
pub mod privilege;

pub use interrupt::retry_on_interrupt;

#[cfg(unix)]
fn path_to_c(path: &std::path::Path) -> std::io::Result<std::ffi::CString> {
    use std::os::unix::ffi::OsStrExt;

    std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "path contains interior NUL",
        )
    })
}
