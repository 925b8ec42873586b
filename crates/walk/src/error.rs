use metadata::OrderError;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Error returned when listing a directory fails.
#[derive(Debug)]
pub struct WalkError {
    kind: WalkErrorKind,
}

impl WalkError {
    pub(crate) const fn new(kind: WalkErrorKind) -> Self {
        Self { kind }
    }

    pub(crate) const fn root(path: PathBuf, source: io::Error) -> Self {
        Self::new(WalkErrorKind::Root { path, source })
    }

    pub(crate) const fn read_dir(path: PathBuf, source: io::Error) -> Self {
        Self::new(WalkErrorKind::ReadDir { path, source })
    }

    pub(crate) const fn channel_closed(path: PathBuf) -> Self {
        Self::new(WalkErrorKind::ChannelClosed { path })
    }

    pub(crate) const fn order(path: PathBuf, source: OrderError) -> Self {
        Self::new(WalkErrorKind::Order { path, source })
    }

    /// Returns the specific failure.
    #[must_use]
    pub const fn kind(&self) -> &WalkErrorKind {
        &self.kind
    }

    /// Returns the filesystem path associated with the error.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.kind.path()
    }

    /// Whether the whole walk has to stop.
    ///
    /// Only failing to open the walk root and a structurally broken result
    /// are fatal; an unreadable subdirectory is skipped.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            WalkErrorKind::Root { .. } | WalkErrorKind::Order { .. }
        )
    }
}

impl fmt::Display for WalkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WalkErrorKind::Root { path, source } => {
                write!(f, "failed to open walk root '{}': {}", path.display(), source)
            }
            WalkErrorKind::ReadDir { path, source } => {
                write!(
                    f,
                    "failed to read directory '{}': {}",
                    path.display(),
                    source
                )
            }
            WalkErrorKind::ChannelClosed { path } => {
                write!(
                    f,
                    "entry receiver went away while listing '{}'",
                    path.display()
                )
            }
            WalkErrorKind::Order { path, source } => {
                write!(f, "unordered result walking '{}': {}", path.display(), source)
            }
        }
    }
}

impl Error for WalkError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            WalkErrorKind::Root { source, .. } | WalkErrorKind::ReadDir { source, .. } => {
                Some(source)
            }
            WalkErrorKind::Order { source, .. } => Some(source),
            WalkErrorKind::ChannelClosed { .. } => None,
        }
    }
}

/// Classification of listing failures.
#[derive(Debug)]
pub enum WalkErrorKind {
    /// The walk root could not be opened or is not a directory.
    Root {
        /// Walk root.
        path: PathBuf,
        /// Underlying error emitted by the operating system.
        source: io::Error,
    },
    /// A directory below the root could not be opened.
    ReadDir {
        /// Directory whose contents could not be read.
        path: PathBuf,
        /// Underlying error emitted by the operating system.
        source: io::Error,
    },
    /// The receiving end of the entry channel was dropped.
    ChannelClosed {
        /// Directory being listed at the time.
        path: PathBuf,
    },
    /// The collected entries could not be put in canonical order.
    Order {
        /// Walk root.
        path: PathBuf,
        /// The ordering violation.
        source: OrderError,
    },
}

impl WalkErrorKind {
    /// Returns the filesystem path tied to the failure.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Root { path, .. }
            | Self::ReadDir { path, .. }
            | Self::ChannelClosed { path }
            | Self::Order { path, .. } => path,
        }
    }
}
