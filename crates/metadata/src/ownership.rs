//! Numeric ownership capture and restore.

use crate::entry::Entry;
use std::fs;
use std::path::Path;

/// Unknown owner marker stored when ids are unavailable.
pub const UNKNOWN_ID: i64 = -1;

/// Returns the numeric `(uid, gid)` of a live object.
#[cfg(unix)]
#[must_use]
pub fn capture_owner(metadata: &fs::Metadata) -> (i64, i64) {
    use std::os::unix::fs::MetadataExt;

    (i64::from(metadata.uid()), i64::from(metadata.gid()))
}

/// Returns the numeric `(uid, gid)` of a live object.
#[cfg(not(unix))]
#[must_use]
pub fn capture_owner(_metadata: &fs::Metadata) -> (i64, i64) {
    (UNKNOWN_ID, UNKNOWN_ID)
}

/// Gives `full_path` the owner stored in `entry` without following symlinks.
///
/// Nothing is done when either stored id is [`UNKNOWN_ID`] or both already
/// match `metadata`. Returns `false` when the change was attempted and
/// failed; the failure is logged.
#[cfg(unix)]
pub fn restore_owner(full_path: &Path, entry: &Entry, metadata: &fs::Metadata) -> bool {
    use logging::log_warn;

    if entry.uid == UNKNOWN_ID || entry.gid == UNKNOWN_ID {
        return true;
    }
    if capture_owner(metadata) == (entry.uid, entry.gid) {
        return true;
    }

    let (Ok(uid), Ok(gid)) = (u32::try_from(entry.uid), u32::try_from(entry.gid)) else {
        log_warn!(
            Ownership,
            "cannot restore owner {}:{} on {}: id out of range",
            entry.uid,
            entry.gid,
            full_path.display()
        );
        return false;
    };

    match platform::owner::lchown(full_path, uid, gid) {
        Ok(()) => true,
        Err(error) => {
            log_warn!(
                Ownership,
                "failed to change owner of {} to {}:{}: {}",
                full_path.display(),
                uid,
                gid,
                error
            );
            false
        }
    }
}

/// Ownership is not restored on this platform.
#[cfg(not(unix))]
pub fn restore_owner(_full_path: &Path, _entry: &Entry, _metadata: &fs::Metadata) -> bool {
    true
}
