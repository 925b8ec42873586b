//! Per-object exclusion markers.
//!
//! A user excludes an object from backup by tagging the object itself:
//!
//! | platform | marker |
//! |----------|--------|
//! | Linux, Android, FreeBSD, NetBSD | attribute [`EXCLUDE_ATTRIBUTE`] present |
//! | macOS | attribute [`APPLE_EXCLUDE_ATTRIBUTE`] whose value contains [`APPLE_EXCLUDE_VALUE`] |
//! | FreeBSD, macOS | `UF_NODUMP` set in the flag word |
//!
//! Marking applies to that object only; an unmarked file inside an unmarked
//! directory is never excluded because of a marked sibling.

use crate::attributes::AttributeProvider;
use crate::entry::Entry;
use logging::log_debug;
use std::path::Path;

/// Attribute whose presence excludes an object.
pub const EXCLUDE_ATTRIBUTE: &str = "user.duplicacy_exclude";

/// Time Machine exclusion attribute.
pub const APPLE_EXCLUDE_ATTRIBUTE: &str = "com.apple.metadata:com_apple_backup_excludeItem";

/// Value fragment that marks [`APPLE_EXCLUDE_ATTRIBUTE`] as an exclusion.
pub const APPLE_EXCLUDE_VALUE: &[u8] = b"com.apple.backupd";

/// Returns `true` when `entry` carries the platform's exclusion marker.
///
/// Captured attributes and flags on `entry` are consulted first; when the
/// attributes were not captured the marker is read from `full_path` through
/// `provider`. Read failures count as "not excluded".
pub fn is_excluded<P: AttributeProvider + ?Sized>(
    provider: &P,
    full_path: &Path,
    entry: &Entry,
) -> bool {
    if nodump_excludes() && entry.platform_flags.is_some_and(|flags| flags & NODUMP != 0) {
        return true;
    }

    let name = marker_name();
    let value = match entry.attributes() {
        Some(attributes) => attributes.get(name).cloned(),
        None => match provider.get(full_path, name) {
            Ok(value) => value,
            Err(error) => {
                log_debug!(Exclude, "cannot read exclusion marker: {}", error);
                None
            }
        },
    };
    value.is_some_and(|value| marker_matches(&value))
}

#[cfg(target_os = "macos")]
const fn marker_name() -> &'static str {
    APPLE_EXCLUDE_ATTRIBUTE
}

#[cfg(not(target_os = "macos"))]
const fn marker_name() -> &'static str {
    EXCLUDE_ATTRIBUTE
}

#[cfg(target_os = "macos")]
fn marker_matches(value: &[u8]) -> bool {
    value
        .windows(APPLE_EXCLUDE_VALUE.len())
        .any(|window| window == APPLE_EXCLUDE_VALUE)
}

#[cfg(not(target_os = "macos"))]
const fn marker_matches(_value: &[u8]) -> bool {
    true
}

const NODUMP: u32 = crate::flags::bsd::UF_NODUMP;

const fn nodump_excludes() -> bool {
    cfg!(any(target_os = "freebsd", target_os = "macos"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::NoopAttributes;
    use crate::entry::{S_IFDIR, S_IFREG};

    #[test]
    fn captured_marker_excludes_the_object() {
        let marked = Entry::new("excludefile", S_IFREG | 0o644)
            .with_attributes([(marker_name(), APPLE_EXCLUDE_VALUE.to_vec())])
            .expect("valid name");
        assert!(is_excluded(&NoopAttributes, Path::new("/unused"), &marked));

        let plain = Entry::new("includefile", S_IFREG | 0o644)
            .with_attributes([("user.other", b"x".to_vec())])
            .expect("valid name");
        assert!(!is_excluded(&NoopAttributes, Path::new("/unused"), &plain));
    }

    #[test]
    fn unmarked_directory_is_included() {
        let entry = Entry::new("includedir", S_IFDIR | 0o755);
        assert!(!is_excluded(&NoopAttributes, Path::new("/unused"), &entry));
    }

    #[test]
    fn nodump_only_counts_where_the_platform_honours_it() {
        let mut entry = Entry::new("f", S_IFREG | 0o644);
        entry.platform_flags = Some(NODUMP);
        assert_eq!(
            is_excluded(&NoopAttributes, Path::new("/unused"), &entry),
            nodump_excludes()
        );
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn apple_marker_requires_the_backupd_value() {
        assert!(marker_matches(b"bplist00_\x10\x11com.apple.backupd"));
        assert!(!marker_matches(b"something else"));
    }
}
