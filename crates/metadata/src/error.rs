use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Coarse classification of metadata failures.
///
/// Callers use the class to decide whether a failure is logged and skipped
/// (everything except [`ErrorClass::Structural`] is item-scoped) and how it is
/// worded in reports.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorClass {
    /// The operation was refused for lack of permission.
    PermissionDenied,
    /// The filesystem or object does not support the operation.
    Unsupported,
    /// A system call was interrupted. Never surfaces from the retrying helpers.
    TransientInterrupt,
    /// The object disappeared between enumeration and inspection.
    VanishedTarget,
    /// The input itself is malformed.
    Structural,
    /// Anything else.
    Other,
}

impl ErrorClass {
    /// Classifies an [`io::Error`].
    #[must_use]
    pub fn of(error: &io::Error) -> Self {
        #[cfg(unix)]
        if let Some(code) = error.raw_os_error() {
            match code {
                libc::EPERM | libc::EACCES | libc::EROFS => return Self::PermissionDenied,
                libc::ENOTTY | libc::EOPNOTSUPP | libc::ENOSYS => return Self::Unsupported,
                #[cfg(any(target_os = "linux", target_os = "android"))]
                libc::ENODATA => return Self::Unsupported,
                #[cfg(not(any(target_os = "linux", target_os = "android")))]
                libc::ENOATTR => return Self::Unsupported,
                libc::EINTR => return Self::TransientInterrupt,
                libc::ENOENT | libc::ENOTDIR => return Self::VanishedTarget,
                _ => {}
            }
        }

        match error.kind() {
            io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
                Self::PermissionDenied
            }
            io::ErrorKind::Unsupported => Self::Unsupported,
            io::ErrorKind::Interrupted => Self::TransientInterrupt,
            io::ErrorKind::NotFound => Self::VanishedTarget,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => Self::Structural,
            _ => Self::Other,
        }
    }

    /// Returns `true` when the failure only affects the object at hand.
    #[must_use]
    pub const fn is_item_scoped(self) -> bool {
        !matches!(self, Self::Structural)
    }
}

/// Error produced when capturing or restoring metadata fails.
#[derive(Debug)]
pub struct MetadataError {
    context: &'static str,
    path: PathBuf,
    source: io::Error,
}

impl MetadataError {
    /// Creates a new [`MetadataError`] from the supplied context, path, and source error.
    pub fn new(context: &'static str, path: &Path, source: io::Error) -> Self {
        Self {
            context,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Returns the operation being performed when the error occurred.
    #[must_use]
    pub const fn context(&self) -> &'static str {
        self.context
    }

    /// Returns the path involved in the failing operation.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the underlying [`io::Error`] that triggered this failure.
    #[must_use]
    pub fn source_error(&self) -> &io::Error {
        &self.source
    }

    /// Classifies the underlying failure.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        ErrorClass::of(&self.source)
    }

    /// Consumes the error and returns its constituent parts.
    #[must_use]
    pub fn into_parts(self) -> (&'static str, PathBuf, io::Error) {
        (self.context, self.path, self.source)
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "failed to {} '{}': {}",
            self.context,
            self.path.display(),
            self.source
        )
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Rejected attribute name.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AttributeNameError {
    /// The name is empty.
    #[error("attribute name is empty")]
    Empty,
    /// The name starts with a NUL byte, which is reserved for internal keys.
    #[error("attribute name {0:?} uses the reserved NUL prefix")]
    Reserved(String),
}

impl From<AttributeNameError> for io::Error {
    fn from(error: AttributeNameError) -> Self {
        Self::new(io::ErrorKind::InvalidInput, error)
    }
}

/// Violation of the canonical entry order.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum OrderError {
    /// Two adjacent entries produce the same sort key.
    #[error("entries {index_a} and {index_b} share the sort key of {path:?}")]
    DuplicateKey {
        /// Index of the first entry.
        index_a: usize,
        /// Index of the second entry.
        index_b: usize,
        /// Lossy rendering of the shared path.
        path: String,
    },
    /// The entry at `index` sorts before its predecessor.
    #[error("entry {index} ({path:?}) is out of canonical order")]
    OutOfOrder {
        /// Index of the offending entry.
        index: usize,
        /// Lossy rendering of its path.
        path: String,
    },
}

impl OrderError {
    /// Every ordering violation is structural.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        ErrorClass::Structural
    }
}
