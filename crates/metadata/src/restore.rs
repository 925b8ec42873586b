//! Materializing entries on disk.
//!
//! A restore creates each object, writes its content and only then applies
//! the metadata that could block further changes:
//!
//! 1. [`create_directory`] or [`create_file`], running the matching early
//!    flag phase on the fresh object.
//! 2. Content, supplied by the caller.
//! 3. [`finish_entry`]: ownership, attributes, permissions, timestamps and
//!    finally the late flag phase.
//!
//! Directories are finished after their children, since the late phase may
//! make them immutable.

use crate::attributes::{AttributeProvider, AttributeSync, set_attributes_to_file};
use crate::entry::{Entry, FileKind};
use crate::error::MetadataError;
use crate::flags::{FlagMask, FlagOutcome, FlagPhase, FlagRestorer, FlagTarget};
use crate::ownership::restore_owner;
use filetime::FileTime;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

/// Which metadata [`finish_entry`] applies.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RestoreOptions {
    owner: bool,
    flag_mask: FlagMask,
}

impl RestoreOptions {
    /// Restores ownership and every flag bit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            owner: true,
            flag_mask: FlagMask::ALL,
        }
    }

    /// Enables or disables ownership restore.
    #[must_use]
    pub const fn owner(mut self, owner: bool) -> Self {
        self.owner = owner;
        self
    }

    /// Limits the flag bits every phase may change.
    #[must_use]
    pub const fn flag_mask(mut self, mask: FlagMask) -> Self {
        self.flag_mask = mask;
        self
    }

    /// Whether ownership is restored.
    #[must_use]
    pub const fn restores_owner(&self) -> bool {
        self.owner
    }

    /// Flag mask handed to every phase.
    #[must_use]
    pub const fn mask(&self) -> FlagMask {
        self.flag_mask
    }
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates the directory for `entry` below `root` and runs the early
/// directory phase on it. An existing directory is reused.
pub fn create_directory(
    root: &Path,
    entry: &Entry,
    restorer: &FlagRestorer,
    options: &RestoreOptions,
) -> Result<FlagOutcome, MetadataError> {
    let path = entry.full_path(root);
    if let Err(error) = make_directory(&path, entry.permissions()) {
        let reusable = error.kind() == io::ErrorKind::AlreadyExists
            && fs::symlink_metadata(&path).is_ok_and(|metadata| metadata.is_dir());
        if !reusable {
            return Err(MetadataError::new("create directory", &path, error));
        }
    }
    restorer.restore(FlagPhase::EarlyDir, entry, FlagTarget::Path(&path), options.mask())
}

#[cfg(unix)]
fn make_directory(path: &Path, permissions: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    // Owner write access is needed to populate the directory.
    fs::DirBuilder::new().mode(permissions | 0o700).create(path)
}

#[cfg(not(unix))]
fn make_directory(path: &Path, _permissions: u32) -> io::Result<()> {
    fs::create_dir(path)
}

/// Creates the regular file for `entry` below `root`, runs the early file
/// phase on the open handle and hands the handle to `write`.
///
/// An existing file is truncated.
pub fn create_file<F>(
    root: &Path,
    entry: &Entry,
    restorer: &FlagRestorer,
    options: &RestoreOptions,
    write: F,
) -> Result<FlagOutcome, MetadataError>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let path = entry.full_path(root);
    let mut file = open_for_writing(&path)
        .map_err(|error| MetadataError::new("create file", &path, error))?;
    let outcome = restorer.restore(
        FlagPhase::EarlyFile,
        entry,
        FlagTarget::File {
            file: &file,
            path: &path,
        },
        options.mask(),
    )?;
    write(&mut file).map_err(|error| MetadataError::new("write file content", &path, error))?;
    Ok(outcome)
}

#[cfg(unix)]
fn open_for_writing(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)
}

#[cfg(not(unix))]
fn open_for_writing(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Creates the symlink for `entry` below `root`.
pub fn restore_symlink(root: &Path, entry: &Entry) -> Result<(), MetadataError> {
    let path = entry.full_path(root);
    let Some(target) = entry.link.as_deref() else {
        return Err(MetadataError::new(
            "create symlink",
            &path,
            io::Error::new(io::ErrorKind::InvalidInput, "entry has no link target"),
        ));
    };
    make_symlink(&crate::entry::bytes_to_path(target), &path)
        .map_err(|error| MetadataError::new("create symlink", &path, error))
}

#[cfg(unix)]
fn make_symlink(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn make_symlink(_target: &Path, _path: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are only restored on Unix platforms",
    ))
}

/// What [`finish_entry`] did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FinishReport {
    /// `false` when an ownership change was attempted and failed.
    pub owner_restored: bool,
    /// Attribute writes and removals.
    pub attributes: AttributeSync,
    /// Outcome of the late flag phase.
    pub flags: FlagOutcome,
}

/// Applies the remaining metadata of `entry` to the object below `root`.
///
/// Steps run in a fixed order: ownership, attributes, permissions,
/// timestamps and the late flag phase. Attributes are written while the
/// object still carries the writable creation mode, since Linux refuses
/// `user.*` writes on a read-only object even to its owner. A failing step
/// does not prevent the later ones; the first hard failure is returned once
/// all steps ran.
pub fn finish_entry<P: AttributeProvider + ?Sized>(
    root: &Path,
    entry: &Entry,
    provider: &P,
    restorer: &FlagRestorer,
    options: &RestoreOptions,
) -> Result<FinishReport, MetadataError> {
    let path = entry.full_path(root);
    let metadata = fs::symlink_metadata(&path)
        .map_err(|error| MetadataError::new("inspect restored entry", &path, error))?;
    let mut first_error: Option<MetadataError> = None;

    let owner_restored = !options.restores_owner() || restore_owner(&path, entry, &metadata);

    let attributes = match set_attributes_to_file(provider, entry, &path) {
        Ok(sync) => sync,
        Err(error) => {
            first_error.get_or_insert(error);
            AttributeSync::default()
        }
    };

    if entry.kind() != FileKind::Symlink
        && let Err(error) = restore_permissions(&path, entry)
    {
        first_error.get_or_insert(error);
    }
    if let Err(error) = restore_times(&path, entry) {
        first_error.get_or_insert(error);
    }

    let flags = match restorer.restore(
        FlagPhase::Late,
        entry,
        FlagTarget::Path(&path),
        options.mask(),
    ) {
        Ok(outcome) => outcome,
        Err(error) => {
            first_error.get_or_insert(error);
            FlagOutcome::NothingToDo
        }
    };

    match first_error {
        Some(error) => Err(error),
        None => Ok(FinishReport {
            owner_restored,
            attributes,
            flags,
        }),
    }
}

#[cfg(unix)]
fn restore_permissions(path: &Path, entry: &Entry) -> Result<(), MetadataError> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(entry.permissions()))
        .map_err(|error| MetadataError::new("restore permissions", path, error))
}

#[cfg(not(unix))]
fn restore_permissions(path: &Path, entry: &Entry) -> Result<(), MetadataError> {
    let mut permissions = fs::symlink_metadata(path)
        .map_err(|error| MetadataError::new("restore permissions", path, error))?
        .permissions();
    permissions.set_readonly(entry.permissions() & 0o200 == 0);
    fs::set_permissions(path, permissions)
        .map_err(|error| MetadataError::new("restore permissions", path, error))
}

fn restore_times(path: &Path, entry: &Entry) -> Result<(), MetadataError> {
    let time = FileTime::from_unix_time(entry.mod_time, 0);
    filetime::set_symlink_file_times(path, time, time)
        .map_err(|error| MetadataError::new("restore timestamps", path, error))
}
