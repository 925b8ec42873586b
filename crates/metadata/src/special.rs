//! Device identity encoding and special file creation.
//!
//! Block and character devices store their major and minor numbers in the
//! entry's two payload words. Fifos and sockets carry no payload and are
//! recreated from the type bits alone.

use crate::entry::{Entry, FileKind};
use crate::error::MetadataError;
use logging::log_warn;
use std::io;
use std::path::Path;

/// Stores a device identity in the two payload words.
#[must_use]
pub const fn encode_device(major: u32, minor: u32) -> (i64, i64) {
    (major as i64, minor as i64)
}

/// Recovers the device identity from the two payload words.
#[must_use]
pub const fn decode_device(start_chunk: i64, start_offset: i64) -> (u32, u32) {
    (start_chunk as u32, start_offset as u32)
}

/// Splits a raw `st_rdev` into payload words.
#[cfg(unix)]
#[must_use]
pub fn encode_rdev(rdev: u64) -> (i64, i64) {
    let raw = rdev as rustix::fs::Dev;
    encode_device(rustix::fs::major(raw), rustix::fs::minor(raw))
}

/// Rebuilds a raw `st_rdev` from payload words.
#[cfg(unix)]
#[must_use]
pub fn decode_rdev(start_chunk: i64, start_offset: i64) -> u64 {
    let (major, minor) = decode_device(start_chunk, start_offset);
    rustix::fs::makedev(major, minor) as u64
}

/// Recreates a fifo, socket or device node described by `entry`.
///
/// Only the permission bits of the entry are applied at creation time;
/// ownership and attributes follow through the regular restore path.
pub fn create_special(destination: &Path, entry: &Entry) -> Result<(), MetadataError> {
    let kind = entry.kind();
    if !kind.is_special() {
        return Err(MetadataError::new(
            "create special file",
            destination,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "entry does not describe a special file",
            ),
        ));
    }

    create_node(destination, entry, kind).inspect_err(|error| {
        log_warn!(Special, "{}", error);
    })
}

#[cfg(all(
    unix,
    not(any(
        target_os = "ios",
        target_os = "macos",
        target_os = "tvos",
        target_os = "watchos"
    ))
))]
fn create_node(destination: &Path, entry: &Entry, kind: FileKind) -> Result<(), MetadataError> {
    use rustix::fs::{CWD, FileType, Mode, makedev, mknodat};

    let node_type = match kind {
        FileKind::Fifo => FileType::Fifo,
        FileKind::Socket => FileType::Socket,
        FileKind::CharDevice => FileType::CharacterDevice,
        _ => FileType::BlockDevice,
    };
    let mode = Mode::from_bits_truncate(entry.permissions() as rustix::fs::RawMode);
    let device = match entry.device() {
        Some((major, minor)) => makedev(major, minor),
        None => makedev(0, 0),
    };

    platform::retry_on_interrupt(|| {
        mknodat(CWD, destination, node_type, mode, device).map_err(io::Error::from)
    })
    .map_err(|error| MetadataError::new("create special file", destination, error))
}

#[cfg(all(
    unix,
    any(
        target_os = "ios",
        target_os = "macos",
        target_os = "tvos",
        target_os = "watchos"
    )
))]
fn create_node(destination: &Path, entry: &Entry, kind: FileKind) -> Result<(), MetadataError> {
    let permissions = entry.permissions() as libc::mode_t;
    let result = match kind {
        FileKind::Fifo => platform::node::mkfifo(destination, permissions),
        _ => {
            let device = decode_rdev(entry.start_chunk, entry.start_offset) as libc::dev_t;
            platform::node::mknod(
                destination,
                kind.mode_bits() as libc::mode_t | permissions,
                device,
            )
        }
    };
    result.map_err(|error| MetadataError::new("create special file", destination, error))
}

#[cfg(not(unix))]
fn create_node(destination: &Path, _entry: &Entry, _kind: FileKind) -> Result<(), MetadataError> {
    Err(MetadataError::new(
        "create special file",
        destination,
        io::Error::new(
            io::ErrorKind::Unsupported,
            "special files are only supported on Unix platforms",
        ),
    ))
}
