//! Hardlink identity tracking.
//!
//! Non-directory objects with a link count above one are identified by their
//! (device, inode) pair. The first path observed for a pair becomes the
//! canonical entry and is captured in full; later paths are recorded as
//! [`HardlinkRole::LinkTo`] entries pointing at it and carry no content.
//!
//! Concurrent walks observe paths in an arbitrary order, so
//! [`canonicalize_sorted`] re-elects the canonical entry of every group once
//! the entries are in canonical order. Restore then materializes the
//! canonical path before any of its links.

use crate::entry::{Entry, HardlinkRole};
use crate::error::MetadataError;
use logging::log_warn;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

/// Device and inode pair identifying a unique file.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct DevIno {
    /// Device number.
    pub dev: u64,
    /// Inode number.
    pub ino: u64,
}

impl DevIno {
    /// Creates a new device/inode pair.
    #[must_use]
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }
}

/// Result of observing a path in the tracker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum HardlinkLookup {
    /// First path seen for this identity.
    First,
    /// The identity was already seen under the returned path.
    LinkTo(Vec<u8>),
}

/// Thread-safe table of identities seen during a walk.
///
/// # Example
///
/// ```
/// use metadata::{DevIno, HardlinkLookup, HardlinkTracker};
///
/// let tracker = HardlinkTracker::new();
/// let id = DevIno::new(0, 12345);
/// assert_eq!(tracker.observe(id, b"a"), HardlinkLookup::First);
/// assert_eq!(tracker.observe(id, b"b"), HardlinkLookup::LinkTo(b"a".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct HardlinkTracker {
    seen: Mutex<FxHashMap<DevIno, Vec<u8>>>,
}

impl HardlinkTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path` under `dev_ino`.
    pub fn observe(&self, dev_ino: DevIno, path: &[u8]) -> HardlinkLookup {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        match seen.get(&dev_ino) {
            Some(first) => HardlinkLookup::LinkTo(first.clone()),
            None => {
                seen.insert(dev_ino, path.to_vec());
                HardlinkLookup::First
            }
        }
    }

    /// Classifies a freshly captured entry.
    ///
    /// Directories and objects with a single link are left untouched. The
    /// first entry of a group becomes [`HardlinkRole::Canonical`]; later ones
    /// become [`HardlinkRole::LinkTo`] with [`Entry::link`] naming the
    /// canonical path and a zero size. Returns `true` for links, whose content
    /// and attributes the caller should not capture again.
    pub fn classify(&self, entry: &mut Entry, link_count: u64) -> bool {
        if entry.is_dir() || link_count <= 1 {
            return false;
        }
        let Some(dev_ino) = entry.identity else {
            return false;
        };
        match self.observe(dev_ino, &entry.path) {
            HardlinkLookup::First => {
                entry.hardlink = HardlinkRole::Canonical;
                false
            }
            HardlinkLookup::LinkTo(canonical) => {
                entry.hardlink = HardlinkRole::LinkTo;
                entry.link = Some(canonical);
                entry.size = 0;
                true
            }
        }
    }

    /// Number of distinct identities recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no identity was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Group {
    members: Vec<usize>,
    size: u64,
    attributes: Option<BTreeMap<String, Vec<u8>>>,
    platform_flags: Option<u32>,
}

/// Re-elects canonical entries so each group's first entry in canonical order
/// is the one carrying content.
///
/// `entries` must already be sorted. Entries without an identity, or whose
/// role is [`HardlinkRole::None`], are ignored. Size, attributes and flag word
/// captured for the group move to the new canonical entry.
pub fn canonicalize_sorted(entries: &mut [Entry]) {
    let mut groups: FxHashMap<DevIno, Group> = FxHashMap::default();

    for (index, entry) in entries.iter_mut().enumerate() {
        if entry.hardlink == HardlinkRole::None {
            continue;
        }
        let Some(dev_ino) = entry.identity else {
            continue;
        };
        let group = groups.entry(dev_ino).or_insert_with(|| Group {
            members: Vec::new(),
            size: 0,
            attributes: None,
            platform_flags: None,
        });
        group.members.push(index);
        group.size = group.size.max(entry.size);
        if let Some(attributes) = entry.take_attributes() {
            group.attributes.get_or_insert(attributes);
        }
        if let Some(flags) = entry.platform_flags.take() {
            group.platform_flags.get_or_insert(flags);
        }
    }

    for group in groups.into_values() {
        let Some((&first, rest)) = group.members.split_first() else {
            continue;
        };
        let canonical_path = entries[first].path.clone();
        for &index in rest {
            let link = &mut entries[index];
            link.hardlink = HardlinkRole::LinkTo;
            link.link = Some(canonical_path.clone());
            link.size = 0;
        }
        let canonical = &mut entries[first];
        canonical.hardlink = HardlinkRole::Canonical;
        canonical.link = None;
        canonical.size = group.size;
        canonical.put_attributes(group.attributes);
        canonical.platform_flags = group.platform_flags;
    }
}

/// Creates `entry` below `root` as a hard link to its canonical path.
///
/// Failure only affects this one link; it is logged and returned.
pub fn restore_hardlink(root: &Path, entry: &Entry) -> Result<(), MetadataError> {
    let destination = entry.full_path(root);
    let Some(canonical) = entry.link.as_deref() else {
        return Err(MetadataError::new(
            "create hard link",
            &destination,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "entry does not name a canonical path",
            ),
        ));
    };
    let source = root.join(crate::entry::bytes_to_path(canonical));

    fs::hard_link(&source, &destination).map_err(|error| {
        log_warn!(
            Hardlink,
            "failed to link {} to {}: {}",
            destination.display(),
            source.display(),
            error
        );
        MetadataError::new("create hard link", &destination, error)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::S_IFREG;

    fn linked(path: &str, id: DevIno, size: u64) -> Entry {
        let mut entry = Entry::new(path, S_IFREG | 0o644);
        entry.identity = Some(id);
        entry.size = size;
        entry
    }

    #[test]
    fn first_observation_is_canonical() {
        let tracker = HardlinkTracker::new();
        let id = DevIno::new(1, 7);
        assert_eq!(tracker.observe(id, b"x"), HardlinkLookup::First);
        assert_eq!(tracker.observe(id, b"y"), HardlinkLookup::LinkTo(b"x".to_vec()));
        assert_eq!(tracker.observe(DevIno::new(2, 7), b"z"), HardlinkLookup::First);
        assert_eq!(tracker.len(), 2);
    }

    #[test]
    fn single_link_objects_are_not_tracked() {
        let tracker = HardlinkTracker::new();
        let mut entry = linked("solo", DevIno::new(1, 1), 4);
        assert!(!tracker.classify(&mut entry, 1));
        assert_eq!(entry.hardlink, HardlinkRole::None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn classify_marks_links_and_drops_their_size() {
        let tracker = HardlinkTracker::new();
        let id = DevIno::new(1, 9);
        let mut first = linked("b", id, 10);
        let mut second = linked("a", id, 10);

        assert!(!tracker.classify(&mut first, 2));
        assert!(tracker.classify(&mut second, 2));
        assert_eq!(first.hardlink, HardlinkRole::Canonical);
        assert_eq!(second.hardlink, HardlinkRole::LinkTo);
        assert_eq!(second.link.as_deref(), Some(&b"b"[..]));
        assert_eq!(second.size, 0);
    }

    #[test]
    fn canonicalize_moves_content_to_first_sorted_entry() {
        let tracker = HardlinkTracker::new();
        let id = DevIno::new(1, 9);
        let mut walked_first = linked("b", id, 10);
        walked_first
            .set_attribute("user.k", vec![1])
            .expect("valid name");
        walked_first.platform_flags = Some(0x40);
        let mut walked_second = linked("a", id, 10);
        tracker.classify(&mut walked_first, 2);
        tracker.classify(&mut walked_second, 2);

        let mut entries = vec![walked_second, walked_first];
        canonicalize_sorted(&mut entries);

        assert_eq!(entries[0].hardlink, HardlinkRole::Canonical);
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[0].link, None);
        assert_eq!(entries[0].attribute("user.k"), Some(&[1][..]));
        assert_eq!(entries[0].platform_flags, Some(0x40));

        assert_eq!(entries[1].hardlink, HardlinkRole::LinkTo);
        assert_eq!(entries[1].link.as_deref(), Some(&b"a"[..]));
        assert_eq!(entries[1].size, 0);
        assert!(entries[1].attributes().is_none());
        assert_eq!(entries[1].platform_flags, None);
    }

    #[cfg(unix)]
    #[test]
    fn restore_creates_a_real_hard_link() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("a"), b"shared").expect("write canonical");
        let mut entry = Entry::new("b", S_IFREG | 0o644);
        entry.hardlink = HardlinkRole::LinkTo;
        entry.link = Some(b"a".to_vec());

        restore_hardlink(dir.path(), &entry).expect("link");

        let a = fs::metadata(dir.path().join("a")).expect("stat a");
        let b = fs::metadata(dir.path().join("b")).expect("stat b");
        assert_eq!((a.dev(), a.ino()), (b.dev(), b.ino()));
    }

    #[test]
    fn failed_link_is_reported_for_that_entry_only() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let mut entry = Entry::new("b", S_IFREG | 0o644);
        entry.hardlink = HardlinkRole::LinkTo;
        entry.link = Some(b"missing".to_vec());

        let (result, events) = logging::capture(|| restore_hardlink(dir.path(), &entry));
        let error = result.unwrap_err();
        assert_eq!(error.class(), crate::ErrorClass::VanishedTarget);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, logging::LogCategory::Hardlink);
    }
}
