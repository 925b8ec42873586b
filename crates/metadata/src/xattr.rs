use crate::attributes::AttributeProvider;
use crate::entry::validate_attribute_name;
use crate::error::MetadataError;
use crate::flags::Privilege;
use logging::log_debug;
use std::path::Path;

/// Extended attributes through the `l*xattr` family.
///
/// On Linux the namespaces visible to the process depend on privilege:
/// ordinary users see `user.*` only, root sees everything except `system.*`.
/// Other platforms expose every name.
#[derive(Clone, Copy, Debug)]
pub struct XattrAttributes {
    privilege: Privilege,
}

impl XattrAttributes {
    /// Creates a provider for a process running with `privilege`.
    #[must_use]
    pub const fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }

    /// Whether `name` is captured and restored at this privilege level.
    #[must_use]
    pub fn is_permitted(&self, name: &str) -> bool {
        permitted(self.privilege, name)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn permitted(privilege: Privilege, name: &str) -> bool {
    const USER_PREFIX: &str = "user.";
    const SYSTEM_PREFIX: &str = "system.";

    if privilege.is_privileged() {
        !name.starts_with(SYSTEM_PREFIX)
    } else {
        name.starts_with(USER_PREFIX)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn permitted(_privilege: Privilege, _name: &str) -> bool {
    true
}

impl AttributeProvider for XattrAttributes {
    fn list(&self, target: &Path) -> Result<Vec<String>, MetadataError> {
        let names = xattr::list(target)
            .map_err(|error| MetadataError::new("list extended attributes", target, error))?;
        Ok(names
            .filter_map(|name| match name.into_string() {
                Ok(name) => Some(name),
                Err(raw) => {
                    log_debug!(
                        Attributes,
                        "ignoring non UTF-8 attribute {:?} on {}",
                        raw,
                        target.display()
                    );
                    None
                }
            })
            .filter(|name| self.is_permitted(name))
            .collect())
    }

    fn get(&self, target: &Path, name: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        xattr::get(target, name)
            .map_err(|error| MetadataError::new("read extended attribute", target, error))
    }

    fn set(&self, target: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError> {
        validate_attribute_name(name).map_err(|error| {
            MetadataError::new("write extended attribute", target, error.into())
        })?;
        xattr::set(target, name, value)
            .map_err(|error| MetadataError::new("write extended attribute", target, error))
    }

    fn remove(&self, target: &Path, name: &str) -> Result<(), MetadataError> {
        validate_attribute_name(name).map_err(|error| {
            MetadataError::new("remove extended attribute", target, error.into())
        })?;
        xattr::remove(target, name)
            .map_err(|error| MetadataError::new("remove extended attribute", target, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{capture_attributes, set_attributes_to_file};
    use crate::entry::{Entry, S_IFLNK, S_IFREG};
    use std::fs;
    use std::io;
    use tempfile::tempdir;

    fn xattrs_supported(path: &Path) -> bool {
        let test_name = "user.test_support";
        match xattr::set(path, test_name, b"test") {
            Ok(()) => {
                let _ = xattr::remove(path, test_name);
                true
            }
            Err(_) => false,
        }
    }

    #[cfg(any(target_os = "linux", target_os = "android"))]
    #[test]
    fn namespaces_follow_privilege() {
        let user = XattrAttributes::new(Privilege::Unprivileged);
        assert!(user.is_permitted("user.comment"));
        assert!(!user.is_permitted("trusted.overlay"));
        assert!(!user.is_permitted("security.selinux"));

        let root = XattrAttributes::new(Privilege::Privileged);
        assert!(root.is_permitted("trusted.overlay"));
        assert!(root.is_permitted("security.selinux"));
        assert!(!root.is_permitted("system.posix_acl_access"));
    }

    #[test]
    fn reserved_names_never_reach_the_filesystem() {
        let dir = tempdir().expect("create temp dir");
        let file = dir.path().join("f");
        fs::write(&file, b"data").expect("write file");
        let provider = XattrAttributes::new(Privilege::Unprivileged);

        let error = provider.set(&file, "\0B", b"1234").unwrap_err();
        assert_eq!(error.source_error().kind(), io::ErrorKind::InvalidInput);
        let error = provider.remove(&file, "\0L").unwrap_err();
        assert_eq!(error.source_error().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn capture_then_restore_round_trips_binary_values() {
        let dir = tempdir().expect("create temp dir");
        let source = dir.path().join("source");
        let destination = dir.path().join("destination");
        fs::write(&source, b"data").expect("write source");
        fs::write(&destination, b"data").expect("write destination");
        if !xattrs_supported(&source) {
            eprintln!("xattrs not supported, skipping test");
            return;
        }
        let provider = XattrAttributes::new(Privilege::Unprivileged);
        let binary = vec![0_u8, 255, 1, 0, 7];
        provider
            .set(&source, "user.binary", &binary)
            .expect("set binary");
        provider
            .set(&destination, "user.stale", b"old")
            .expect("set stale");

        let mut entry = Entry::new("source", S_IFREG | 0o644);
        capture_attributes(&provider, &mut entry, &source).expect("capture");
        assert_eq!(entry.attribute("user.binary"), Some(binary.as_slice()));

        let first = set_attributes_to_file(&provider, &entry, &destination).expect("restore");
        assert_eq!((first.written, first.removed), (1, 1));
        assert_eq!(
            provider.get(&destination, "user.binary").expect("read"),
            Some(binary)
        );
        assert_eq!(provider.get(&destination, "user.stale").expect("read"), None);

        let second = set_attributes_to_file(&provider, &entry, &destination).expect("restore");
        assert!(second.is_noop());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed() {
        let dir = tempdir().expect("create temp dir");
        let target = dir.path().join("target");
        let link = dir.path().join("link");
        fs::write(&target, b"data").expect("write target");
        std::os::unix::fs::symlink(&target, &link).expect("create symlink");
        if !xattrs_supported(&target) {
            eprintln!("xattrs not supported, skipping test");
            return;
        }
        let provider = XattrAttributes::new(Privilege::Unprivileged);
        provider
            .set(&target, "user.on_target", b"1")
            .expect("set on target");

        let mut entry = Entry::new("link", S_IFLNK | 0o777);
        capture_attributes(&provider, &mut entry, &link).expect("capture symlink");
        assert!(entry.attribute("user.on_target").is_none());
    }
}
