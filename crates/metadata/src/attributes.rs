//! Extended attribute capture and restore.
//!
//! [`AttributeProvider`] hides the per-platform attribute API. The provider
//! for the build target is [`NativeAttributes`]; [`capture_attributes`] and
//! [`set_attributes_to_file`] work against any provider so tests can supply
//! their own.

use crate::entry::{Entry, validate_attribute_name};
use crate::error::{ErrorClass, MetadataError};
use crate::flags::Privilege;
use logging::{log_debug, log_warn};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::path::Path;

/// Access to the attribute namespace of filesystem objects.
///
/// Implementations never follow a final symlink.
pub trait AttributeProvider: Send + Sync {
    /// Names present on `target` that this provider exposes.
    fn list(&self, target: &Path) -> Result<Vec<String>, MetadataError>;

    /// Value of `name`, or `None` when it is absent.
    fn get(&self, target: &Path, name: &str) -> Result<Option<Vec<u8>>, MetadataError>;

    /// Creates or replaces `name`.
    fn set(&self, target: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError>;

    /// Removes `name`.
    fn remove(&self, target: &Path, name: &str) -> Result<(), MetadataError>;
}

impl<P: AttributeProvider + ?Sized> AttributeProvider for &P {
    fn list(&self, target: &Path) -> Result<Vec<String>, MetadataError> {
        (**self).list(target)
    }

    fn get(&self, target: &Path, name: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        (**self).get(target, name)
    }

    fn set(&self, target: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError> {
        (**self).set(target, name, value)
    }

    fn remove(&self, target: &Path, name: &str) -> Result<(), MetadataError> {
        (**self).remove(target, name)
    }
}

/// Provider for platforms without an attribute namespace.
///
/// Listing is always empty and writes succeed without effect.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopAttributes;

impl AttributeProvider for NoopAttributes {
    fn list(&self, _target: &Path) -> Result<Vec<String>, MetadataError> {
        Ok(Vec::new())
    }

    fn get(&self, _target: &Path, _name: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        Ok(None)
    }

    fn set(&self, target: &Path, name: &str, _value: &[u8]) -> Result<(), MetadataError> {
        validate_attribute_name(name)
            .map_err(|error| MetadataError::new("write attribute", target, error.into()))
    }

    fn remove(&self, target: &Path, name: &str) -> Result<(), MetadataError> {
        validate_attribute_name(name)
            .map_err(|error| MetadataError::new("remove attribute", target, error.into()))
    }
}

/// Provider selected for the build target.
#[cfg(all(
    unix,
    feature = "xattr",
    any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd"
    )
))]
pub type NativeAttributes = crate::xattr::XattrAttributes;

/// Provider selected for the build target.
#[cfg(any(target_os = "openbsd", target_os = "dragonfly"))]
pub type NativeAttributes = crate::flags_only::FlagsOnlyAttributes;

/// Provider selected for the build target.
#[cfg(not(any(
    all(
        unix,
        feature = "xattr",
        any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "freebsd",
            target_os = "netbsd"
        )
    ),
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
pub type NativeAttributes = NoopAttributes;

/// Builds the provider of the build target for a process running with
/// `privilege`.
///
/// Only the extended attribute provider filters names by privilege; the
/// others ignore it.
#[cfg(all(
    unix,
    feature = "xattr",
    any(
        target_os = "linux",
        target_os = "android",
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd"
    )
))]
#[must_use]
pub const fn native_attributes(privilege: Privilege) -> NativeAttributes {
    crate::xattr::XattrAttributes::new(privilege)
}

/// Builds the provider of the build target for a process running with
/// `privilege`.
#[cfg(any(target_os = "openbsd", target_os = "dragonfly"))]
#[must_use]
pub const fn native_attributes(_privilege: Privilege) -> NativeAttributes {
    crate::flags_only::FlagsOnlyAttributes
}

/// Builds the provider of the build target for a process running with
/// `privilege`.
#[cfg(not(any(
    all(
        unix,
        feature = "xattr",
        any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "freebsd",
            target_os = "netbsd"
        )
    ),
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
#[must_use]
pub const fn native_attributes(_privilege: Privilege) -> NativeAttributes {
    NoopAttributes
}

/// Reads every exposed attribute of `full_path` into `entry`.
///
/// Devices, fifos and sockets are skipped. A name whose value cannot be read
/// is logged and left out; failing to list the names at all is returned and
/// leaves the entry unchanged. The map is stored only when non-empty.
/// Returns the number of attributes captured.
pub fn capture_attributes<P: AttributeProvider + ?Sized>(
    provider: &P,
    entry: &mut Entry,
    full_path: &Path,
) -> Result<usize, MetadataError> {
    if !entry.kind().carries_attributes() {
        return Ok(0);
    }

    let names = provider.list(full_path)?;
    let mut captured = BTreeMap::new();
    for name in names {
        if validate_attribute_name(&name).is_err() {
            continue;
        }
        match provider.get(full_path, &name) {
            Ok(Some(value)) => {
                captured.insert(name, value);
            }
            // Removed between list and read.
            Ok(None) => {}
            Err(error) => log_warn!(Attributes, "{}", error),
        }
    }

    let count = captured.len();
    entry.put_attributes(Some(captured));
    Ok(count)
}

/// Work performed by [`set_attributes_to_file`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AttributeSync {
    /// Attributes created or replaced.
    pub written: usize,
    /// Attributes removed from the destination.
    pub removed: usize,
    /// Names skipped because the destination refused them.
    pub skipped: usize,
}

impl AttributeSync {
    /// Whether the destination was left untouched.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.written == 0 && self.removed == 0
    }
}

struct SyncState {
    sync: AttributeSync,
    first_error: Option<MetadataError>,
}

impl SyncState {
    fn record(&mut self, error: MetadataError) {
        match error.class() {
            ErrorClass::PermissionDenied | ErrorClass::Unsupported => {
                log_debug!(Attributes, "skipping attribute: {}", error);
                self.sync.skipped += 1;
            }
            _ => {
                log_warn!(Attributes, "{}", error);
                self.first_error.get_or_insert(error);
            }
        }
    }
}

/// Makes the attributes of `full_path` equal to those stored in `entry`.
///
/// Names stored in the entry but missing or different on disk are written,
/// names on disk that the entry lacks are removed and matching names are
/// left alone, so applying the same entry twice writes nothing the second
/// time. Devices, fifos and sockets are skipped.
///
/// Permission and unsupported-filesystem refusals are counted in
/// [`AttributeSync::skipped`]. Every name is attempted before the first other
/// failure is returned.
pub fn set_attributes_to_file<P: AttributeProvider + ?Sized>(
    provider: &P,
    entry: &Entry,
    full_path: &Path,
) -> Result<AttributeSync, MetadataError> {
    let mut state = SyncState {
        sync: AttributeSync::default(),
        first_error: None,
    };
    if !entry.kind().carries_attributes() {
        return Ok(state.sync);
    }

    let empty = BTreeMap::new();
    let desired = entry.attributes().unwrap_or(&empty);

    let on_disk = match provider.list(full_path) {
        Ok(names) => names,
        Err(error) => {
            if matches!(
                error.class(),
                ErrorClass::PermissionDenied | ErrorClass::Unsupported
            ) {
                log_debug!(Attributes, "skipping attributes: {}", error);
                state.sync.skipped = desired.len();
                return Ok(state.sync);
            }
            return Err(error);
        }
    };
    let present: FxHashSet<&str> = on_disk.iter().map(String::as_str).collect();

    for (name, value) in desired {
        if present.contains(name.as_str()) {
            match provider.get(full_path, name) {
                Ok(Some(current)) if current == *value => continue,
                Ok(_) => {}
                Err(error) => {
                    state.record(error);
                    continue;
                }
            }
        }
        match provider.set(full_path, name, value) {
            Ok(()) => state.sync.written += 1,
            Err(error) => state.record(error),
        }
    }

    for name in &on_disk {
        if desired.contains_key(name) {
            continue;
        }
        match provider.remove(full_path, name) {
            Ok(()) => state.sync.removed += 1,
            Err(error) => state.record(error),
        }
    }

    match state.first_error {
        Some(error) => Err(error),
        None => Ok(state.sync),
    }
}
