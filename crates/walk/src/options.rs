use metadata::Privilege;
use std::num::NonZeroUsize;
use std::thread;

/// Default bound of the entry channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Controls what [`crate::DirectoryLister`] captures for each child.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ListOptions {
    exclude_by_attribute: bool,
    read_attributes: bool,
    track_hardlinks: bool,
    privilege: Privilege,
}

impl ListOptions {
    /// Captures attributes and hardlinks; honours no exclusion markers.
    ///
    /// Attribute names are filtered as for an unprivileged process until
    /// [`privilege`](Self::privilege) says otherwise.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            exclude_by_attribute: false,
            read_attributes: true,
            track_hardlinks: true,
            privilege: Privilege::Unprivileged,
        }
    }

    /// Privilege the attribute provider filters names for. Pass the value
    /// detected once at startup, the same one handed to the restore side.
    #[must_use]
    pub const fn privilege(mut self, privilege: Privilege) -> Self {
        self.privilege = privilege;
        self
    }

    /// Omits objects carrying the platform exclusion marker, together with
    /// the subtree of a marked directory.
    #[must_use]
    pub const fn exclude_by_attribute(mut self, exclude: bool) -> Self {
        self.exclude_by_attribute = exclude;
        self
    }

    /// Captures extended attributes and the flag word.
    #[must_use]
    pub const fn read_attributes(mut self, read: bool) -> Self {
        self.read_attributes = read;
        self
    }

    /// Records later names of a multiply linked object as links to the first.
    #[must_use]
    pub const fn track_hardlinks(mut self, track: bool) -> Self {
        self.track_hardlinks = track;
        self
    }

    /// Whether exclusion markers are honoured.
    #[must_use]
    pub const fn excludes_by_attribute(&self) -> bool {
        self.exclude_by_attribute
    }

    /// Whether attributes and flags are captured.
    #[must_use]
    pub const fn reads_attributes(&self) -> bool {
        self.read_attributes
    }

    /// Whether hardlinks are tracked.
    #[must_use]
    pub const fn tracks_hardlinks(&self) -> bool {
        self.track_hardlinks
    }

    /// Privilege used for attribute name filtering.
    #[must_use]
    pub const fn capture_privilege(&self) -> Privilege {
        self.privilege
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Concurrency settings of [`crate::walk_tree`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WalkConfig {
    workers: usize,
    channel_capacity: usize,
}

impl WalkConfig {
    /// One worker per available CPU and a channel of
    /// [`DEFAULT_CHANNEL_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        let workers = thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Self {
            workers,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Number of listing threads; zero is treated as one.
    #[must_use]
    pub const fn workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 { 1 } else { workers };
        self
    }

    /// Bound of the entry channel; zero is treated as one.
    #[must_use]
    pub const fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Configured worker count.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.workers
    }

    /// Configured channel bound.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self::new()
    }
}
