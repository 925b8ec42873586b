use crate::error::WalkError;
use crate::options::ListOptions;
use crossbeam_channel::Sender;
use logging::{log_debug, log_warn};
use metadata::exclude::is_excluded;
use metadata::{
    AttributeProvider, Entry, FileKind, HardlinkTracker, NativeAttributes, capture_attributes,
    capture_platform_flags, compare, native_attributes,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Counters for one [`DirectoryLister::list_dir`] call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ListStats {
    /// Entries sent on the channel.
    pub emitted: usize,
    /// Children omitted because they carry the exclusion marker.
    pub excluded: usize,
    /// Relative paths of children that could not be captured.
    pub skipped: Vec<Vec<u8>>,
}

impl ListStats {
    /// Adds the counters of `other`.
    pub fn merge(&mut self, other: Self) {
        self.emitted += other.emitted;
        self.excluded += other.excluded;
        self.skipped.extend(other.skipped);
    }
}

/// Result of listing one directory.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Listing {
    /// Relative paths of the emitted subdirectories in reverse canonical
    /// order, so that popping them from a stack yields canonical order.
    pub subdirectories: Vec<Vec<u8>>,
    /// What the call did.
    pub stats: ListStats,
}

/// Lists one directory level at a time below a fixed root.
///
/// A lister is shared by every worker of one walk. It holds the hardlink
/// table of that walk, so a new walk needs a new lister.
#[derive(Debug)]
pub struct DirectoryLister<P = NativeAttributes> {
    root: PathBuf,
    options: ListOptions,
    provider: P,
    hardlinks: HardlinkTracker,
}

impl DirectoryLister<NativeAttributes> {
    /// Creates a lister using the attribute provider of the build target,
    /// built for [`ListOptions::capture_privilege`].
    pub fn new(root: impl Into<PathBuf>, options: ListOptions) -> Self {
        let provider = native_attributes(options.capture_privilege());
        Self::with_provider(root, options, provider)
    }
}

impl<P: AttributeProvider> DirectoryLister<P> {
    /// Creates a lister reading attributes through `provider`.
    pub fn with_provider(root: impl Into<PathBuf>, options: ListOptions, provider: P) -> Self {
        Self {
            root: root.into(),
            options,
            provider,
            hardlinks: HardlinkTracker::new(),
        }
    }

    /// Walk root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &ListOptions {
        &self.options
    }

    /// Emits the immediate children of `relative` on `sender`.
    ///
    /// Children are sent in canonical order. Symlinks are never followed.
    /// A child that vanishes or cannot be inspected is logged and listed in
    /// [`ListStats::skipped`]; unreadable attributes are logged and the child
    /// is emitted without them. `send` blocks while the channel is full.
    ///
    /// Failing to open `relative` is returned as
    /// [`crate::WalkErrorKind::ReadDir`], or as
    /// [`crate::WalkErrorKind::Root`] when `relative` is empty.
    pub fn list_dir(&self, relative: &[u8], sender: &Sender<Entry>) -> Result<Listing, WalkError> {
        let directory = if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(bytes_to_path(relative))
        };

        let read_dir = fs::read_dir(&directory).map_err(|error| {
            if relative.is_empty() {
                WalkError::root(directory.clone(), error)
            } else {
                WalkError::read_dir(directory.clone(), error)
            }
        })?;

        let mut listing = Listing::default();
        let mut children = Vec::new();
        for dirent in read_dir {
            let dirent = match dirent {
                Ok(dirent) => dirent,
                Err(error) => {
                    log_warn!(
                        ListDir,
                        "failed to read an entry of {}: {}",
                        directory.display(),
                        error
                    );
                    continue;
                }
            };
            let name = dirent.file_name();
            let path = join_relative(relative, &name_bytes(&name));
            let full_path = directory.join(&name);
            match fs::symlink_metadata(&full_path) {
                Ok(metadata) => {
                    children.push((Entry::from_metadata(path, &metadata), full_path, metadata));
                }
                Err(error) => {
                    log_warn!(ListDir, "skipping {}: {}", full_path.display(), error);
                    listing.stats.skipped.push(path);
                }
            }
        }
        children.sort_by(|a, b| compare(&a.0, &b.0));

        for (mut entry, full_path, metadata) in children {
            if !self.capture(&mut entry, &full_path, &metadata) {
                listing.stats.skipped.push(entry.path);
                continue;
            }

            if self.options.excludes_by_attribute()
                && is_excluded(&self.provider, &full_path, &entry)
            {
                log_debug!(Exclude, "excluding {}", full_path.display());
                listing.stats.excluded += 1;
                continue;
            }

            if self.options.tracks_hardlinks()
                && self.hardlinks.classify(&mut entry, link_count(&metadata))
            {
                entry.clear_attributes();
                entry.platform_flags = None;
            }

            if entry.is_dir() {
                listing.subdirectories.push(entry.path.clone());
            }
            sender
                .send(entry)
                .map_err(|_| WalkError::channel_closed(directory.clone()))?;
            listing.stats.emitted += 1;
        }

        listing.subdirectories.reverse();
        Ok(listing)
    }

    /// Fills in link target, attributes and flags. Returns `false` when the
    /// entry is unusable.
    fn capture(&self, entry: &mut Entry, full_path: &Path, metadata: &fs::Metadata) -> bool {
        if entry.kind() == FileKind::Symlink {
            match fs::read_link(full_path) {
                Ok(target) => entry.link = Some(path_bytes(&target)),
                Err(error) => {
                    log_warn!(ListDir, "skipping {}: {}", full_path.display(), error);
                    return false;
                }
            }
        }

        if self.options.reads_attributes() {
            if let Err(error) = capture_attributes(&self.provider, entry, full_path) {
                log_warn!(Attributes, "{}", error);
            }
            capture_platform_flags(entry, full_path, metadata);
        }
        true
    }
}

fn join_relative(parent: &[u8], name: &[u8]) -> Vec<u8> {
    if parent.is_empty() {
        return name.to_vec();
    }
    let mut path = Vec::with_capacity(parent.len() + 1 + name.len());
    path.extend_from_slice(parent);
    path.push(b'/');
    path.extend_from_slice(name);
    path
}

#[cfg(unix)]
fn name_bytes(name: &std::ffi::OsStr) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;

    name.as_bytes().to_vec()
}

#[cfg(not(unix))]
fn name_bytes(name: &std::ffi::OsStr) -> Vec<u8> {
    name.to_string_lossy().into_owned().into_bytes()
}

fn path_bytes(path: &Path) -> Vec<u8> {
    name_bytes(path.as_os_str())
}

#[cfg(unix)]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(unix)]
fn link_count(metadata: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;

    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &fs::Metadata) -> u64 {
    1
}
