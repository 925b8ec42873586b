//! Three-phase restore of the OS flag word.
//!
//! Immutable and append-only flags block the very writes needed to finish
//! restoring an object, so the stored word is applied in phases:
//!
//! 1. [`FlagPhase::EarlyDir`] on a freshly created, empty directory, limited
//!    to bits that do not block creating children.
//! 2. [`FlagPhase::EarlyFile`] on a freshly created file before content is
//!    written, never including immutable or append-class bits.
//! 3. [`FlagPhase::Late`] after content, ownership and attributes are done.
//!
//! Each phase has a fixed set of permitted bits per [`FlagFamily`], further
//! restricted by the caller's [`FlagMask`]. Only the permitted bits of the
//! live word change; every other bit keeps its current value. On the
//! `chflags` family the late phase is additionally limited to owner-settable
//! bits unless the process is privileged.

use crate::entry::{Entry, FileKind};
use crate::error::{ErrorClass, MetadataError};
use logging::{log_debug, log_warn};
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Linux inode flag bits (`FS_*_FL`).
pub mod linux {
    /// Secure deletion.
    pub const SECRM: u32 = 0x0000_0001;
    /// Undelete.
    pub const UNRM: u32 = 0x0000_0002;
    /// Compress file.
    pub const COMPR: u32 = 0x0000_0004;
    /// Synchronous updates.
    pub const SYNC: u32 = 0x0000_0008;
    /// Immutable file.
    pub const IMMUTABLE: u32 = 0x0000_0010;
    /// Writes may only append.
    pub const APPEND: u32 = 0x0000_0020;
    /// Do not dump file.
    pub const NODUMP: u32 = 0x0000_0040;
    /// Do not update atime.
    pub const NOATIME: u32 = 0x0000_0080;
    /// Do not compress.
    pub const NOCOMP: u32 = 0x0000_0400;
    /// Journal file data.
    pub const JOURNAL_DATA: u32 = 0x0000_4000;
    /// File tail should not be merged.
    pub const NOTAIL: u32 = 0x0000_8000;
    /// Synchronous directory updates.
    pub const DIRSYNC: u32 = 0x0001_0000;
    /// Top of directory hierarchies.
    pub const TOPDIR: u32 = 0x0002_0000;
    /// Do not copy-on-write.
    pub const NOCOW: u32 = 0x0080_0000;
    /// Children inherit the project id.
    pub const PROJINHERIT: u32 = 0x2000_0000;
    /// Case-insensitive directory.
    pub const CASEFOLD: u32 = 0x4000_0000;

    /// Bits safe to set on a file before its content is written.
    pub const FILE_EARLY: u32 =
        SECRM | UNRM | COMPR | NODUMP | NOATIME | NOCOMP | JOURNAL_DATA | NOTAIL | NOCOW;
    /// Bits that must be set on a directory while it is still empty.
    pub const DIR_EARLY: u32 = TOPDIR | PROJINHERIT | CASEFOLD;
    /// Bits applied only once the object is complete.
    pub const LATE: u32 = SYNC | IMMUTABLE | APPEND | DIRSYNC;
    /// Every bit captured and restored.
    pub const MODIFIABLE: u32 = FILE_EARLY | DIR_EARLY | LATE;
    /// Bits that block modification.
    pub const IMMUTABLE_CLASS: u32 = IMMUTABLE | APPEND;
}

/// `chflags` family flag bits (`UF_*`, `SF_*`).
pub mod bsd {
    /// Do not dump file.
    pub const UF_NODUMP: u32 = 0x0000_0001;
    /// File may not be changed.
    pub const UF_IMMUTABLE: u32 = 0x0000_0002;
    /// Writes may only append.
    pub const UF_APPEND: u32 = 0x0000_0004;
    /// Bits the owner may change.
    pub const UF_SETTABLE: u32 = 0x0000_ffff;
    /// Bits only the superuser may change.
    pub const SF_SETTABLE: u32 = 0xffff_0000;
    /// File may not be changed (superuser).
    pub const SF_IMMUTABLE: u32 = 0x0002_0000;
    /// Writes may only append (superuser).
    pub const SF_APPEND: u32 = 0x0004_0000;
    /// File may not be removed or renamed (superuser).
    pub const SF_NOUNLINK: u32 = 0x0010_0000;
    /// Bits that block modification.
    pub const IMMUTABLE_CLASS: u32 = UF_IMMUTABLE | UF_APPEND | SF_IMMUTABLE | SF_APPEND | SF_NOUNLINK;
}

/// Whether the process may change superuser-only metadata.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Privilege {
    /// Ordinary user.
    Unprivileged,
    /// Effective uid 0.
    Privileged,
}

impl Privilege {
    /// Probes the effective uid. Call once at startup and pass the result on.
    #[must_use]
    pub fn detect() -> Self {
        if platform::privilege::is_privileged() {
            Self::Privileged
        } else {
            Self::Unprivileged
        }
    }

    /// Whether this is [`Privilege::Privileged`].
    #[must_use]
    pub const fn is_privileged(self) -> bool {
        matches!(self, Self::Privileged)
    }
}

/// How a platform exposes the flag word.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FlagFamily {
    /// `FS_IOC_GETFLAGS`/`FS_IOC_SETFLAGS` on an open descriptor.
    Ioctl,
    /// `st_flags` plus `chflags`-class calls.
    ChangeCall,
    /// No flag word.
    Unsupported,
}

impl FlagFamily {
    /// Family of the build target.
    #[cfg(target_os = "linux")]
    pub const NATIVE: Self = Self::Ioctl;
    /// Family of the build target.
    #[cfg(any(
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    pub const NATIVE: Self = Self::ChangeCall;
    /// Family of the build target.
    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    pub const NATIVE: Self = Self::Unsupported;

    /// Bits that block modification for this family.
    #[must_use]
    pub const fn immutable_class(self) -> u32 {
        match self {
            Self::Ioctl => linux::IMMUTABLE_CLASS,
            Self::ChangeCall => bsd::IMMUTABLE_CLASS,
            Self::Unsupported => 0,
        }
    }
}

/// Caller-supplied restriction on the bits a phase may change.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct FlagMask(u32);

impl FlagMask {
    /// Allow every bit the phase permits.
    pub const ALL: Self = Self(u32::MAX);
    /// Touch nothing.
    pub const NONE: Self = Self(0);

    /// Allows exactly `bits`.
    #[must_use]
    pub const fn new(bits: u32) -> Self {
        Self(bits)
    }

    /// Allowed bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether this is the "touch nothing" sentinel.
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Default for FlagMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Restore phase.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FlagPhase {
    /// New, empty directory.
    EarlyDir,
    /// New file, before content.
    EarlyFile,
    /// Completed object.
    Late,
}

impl FlagPhase {
    /// Bits this phase may change on `family`.
    #[must_use]
    pub const fn permitted_bits(self, family: FlagFamily, privilege: Privilege) -> u32 {
        match (family, self) {
            (FlagFamily::Ioctl, Self::EarlyDir) => linux::DIR_EARLY,
            (FlagFamily::Ioctl, Self::EarlyFile) => linux::FILE_EARLY,
            (FlagFamily::Ioctl, Self::Late) => linux::MODIFIABLE,
            (FlagFamily::ChangeCall, Self::Late) => {
                if privilege.is_privileged() {
                    bsd::UF_SETTABLE | bsd::SF_SETTABLE
                } else {
                    bsd::UF_SETTABLE
                }
            }
            (FlagFamily::ChangeCall | FlagFamily::Unsupported, _) => 0,
        }
    }

    /// Bits actually changed for `mask` on `family`.
    #[must_use]
    pub const fn effective_bits(self, family: FlagFamily, privilege: Privilege, mask: FlagMask) -> u32 {
        self.permitted_bits(family, privilege) & mask.bits()
    }
}

/// Combines the stored word into the live word, changing only `allowed` bits.
#[must_use]
pub const fn merge_flags(current: u32, stored: u32, allowed: u32) -> u32 {
    (current & !allowed) | (stored & allowed)
}

/// Object whose flags are restored.
#[derive(Clone, Copy, Debug)]
pub enum FlagTarget<'a> {
    /// Resolved without following a final symlink.
    Path(&'a Path),
    /// An already open handle, e.g. the file being written.
    File {
        /// Open handle.
        file: &'a File,
        /// Path of the handle, for diagnostics.
        path: &'a Path,
    },
}

impl<'a> FlagTarget<'a> {
    /// Path of the target.
    #[must_use]
    pub const fn path(&self) -> &'a Path {
        match *self {
            Self::Path(path) | Self::File { path, .. } => path,
        }
    }
}

/// Result of one phase.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlagOutcome {
    /// Nothing stored, nothing permitted, or the word already matched.
    NothingToDo,
    /// The live word was replaced by the returned value.
    Applied(u32),
    /// The filesystem has no flag word.
    Unsupported,
    /// The change was refused.
    Denied,
}

/// Applies stored flag words phase by phase.
#[derive(Clone, Copy, Debug)]
pub struct FlagRestorer {
    privilege: Privilege,
    family: FlagFamily,
}

impl FlagRestorer {
    /// Creates a restorer for the build target.
    #[must_use]
    pub const fn new(privilege: Privilege) -> Self {
        Self {
            privilege,
            family: FlagFamily::NATIVE,
        }
    }

    /// Privilege the restorer was created with.
    #[must_use]
    pub const fn privilege(&self) -> Privilege {
        self.privilege
    }

    /// Bits `phase` changes under `mask`.
    #[must_use]
    pub const fn effective_bits(&self, phase: FlagPhase, mask: FlagMask) -> u32 {
        phase.effective_bits(self.family, self.privilege, mask)
    }

    /// Runs one phase for `entry` on `target`.
    ///
    /// Permission and unsupported-filesystem conditions are logged and
    /// reported through [`FlagOutcome`]. An error is returned only when the
    /// object cannot be opened or inspected.
    pub fn restore(
        &self,
        phase: FlagPhase,
        entry: &Entry,
        target: FlagTarget<'_>,
        mask: FlagMask,
    ) -> Result<FlagOutcome, MetadataError> {
        let Some(stored) = entry.platform_flags else {
            return Ok(FlagOutcome::NothingToDo);
        };
        if mask.is_none() {
            return Ok(FlagOutcome::NothingToDo);
        }
        let allowed = self.effective_bits(phase, mask);
        if allowed == 0 {
            return Ok(FlagOutcome::NothingToDo);
        }

        match self.family {
            FlagFamily::Ioctl => restore_ioctl(phase, entry.kind(), target, stored, allowed),
            FlagFamily::ChangeCall => restore_change_call(target, stored, allowed),
            FlagFamily::Unsupported => Ok(FlagOutcome::NothingToDo),
        }
    }
}

fn soft_failure(path: &Path, error: io::Error) -> Result<FlagOutcome, MetadataError> {
    if platform::flags::is_unsupported(&error) {
        log_debug!(Flags, "flags unsupported on {}: {}", path.display(), error);
        return Ok(FlagOutcome::Unsupported);
    }
    if ErrorClass::of(&error) == ErrorClass::PermissionDenied {
        log_warn!(Flags, "failed to restore flags on {}: {}", path.display(), error);
        return Ok(FlagOutcome::Denied);
    }
    Err(MetadataError::new("restore flags", path, error))
}

#[cfg(target_os = "linux")]
fn restore_ioctl(
    phase: FlagPhase,
    kind: FileKind,
    target: FlagTarget<'_>,
    stored: u32,
    allowed: u32,
) -> Result<FlagOutcome, MetadataError> {
    use platform::flags::{get_flags, open_for_flags, set_flags};

    if !matches!(kind, FileKind::Regular | FileKind::Directory) {
        // Symlinks and specials cannot be opened for the ioctl.
        return Ok(FlagOutcome::NothingToDo);
    }

    let path = target.path();
    let opened;
    let file = match target {
        FlagTarget::File { file, .. } => file,
        FlagTarget::Path(path) => {
            let directory = phase == FlagPhase::EarlyDir || kind == FileKind::Directory;
            opened = open_for_flags(path, directory)
                .map_err(|error| MetadataError::new("open for flag restore", path, error))?;
            &opened
        }
    };

    let current = match get_flags(file) {
        Ok(current) => current,
        Err(error) => return soft_failure(path, error),
    };
    let updated = merge_flags(current, stored, allowed);
    if updated == current {
        return Ok(FlagOutcome::NothingToDo);
    }
    match set_flags(file, updated) {
        Ok(()) => {
            log_debug!(Flags, "restored flags {:#x} on {}", updated, path.display());
            Ok(FlagOutcome::Applied(updated))
        }
        Err(error) => soft_failure(path, error),
    }
}

#[cfg(not(target_os = "linux"))]
fn restore_ioctl(
    _phase: FlagPhase,
    _kind: FileKind,
    _target: FlagTarget<'_>,
    _stored: u32,
    _allowed: u32,
) -> Result<FlagOutcome, MetadataError> {
    Ok(FlagOutcome::NothingToDo)
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn restore_change_call(
    target: FlagTarget<'_>,
    stored: u32,
    allowed: u32,
) -> Result<FlagOutcome, MetadataError> {
    use platform::flags::{fchflags, lchflags, stat_flags};

    let path = target.path();
    let metadata = match target {
        FlagTarget::Path(path) => fs::symlink_metadata(path),
        FlagTarget::File { file, .. } => file.metadata(),
    }
    .map_err(|error| MetadataError::new("inspect flags", path, error))?;

    let current = stat_flags(&metadata);
    let updated = merge_flags(current, stored, allowed);
    if updated == current {
        return Ok(FlagOutcome::NothingToDo);
    }
    let result = match target {
        FlagTarget::Path(path) => lchflags(path, updated),
        FlagTarget::File { file, .. } => fchflags(file, updated),
    };
    match result {
        Ok(()) => {
            log_debug!(Flags, "restored flags {:#x} on {}", updated, path.display());
            Ok(FlagOutcome::Applied(updated))
        }
        Err(error) => soft_failure(path, error),
    }
}

#[cfg(not(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn restore_change_call(
    _target: FlagTarget<'_>,
    _stored: u32,
    _allowed: u32,
) -> Result<FlagOutcome, MetadataError> {
    Ok(FlagOutcome::NothingToDo)
}

/// Reads the flag word of a live object.
///
/// Returns `Ok(None)` when the object has no flag word or none of its bits
/// are restorable. Only regular files and directories are inspected on
/// Linux, where the word is read through an open descriptor.
pub fn read_platform_flags(
    full_path: &Path,
    metadata: &fs::Metadata,
) -> Result<Option<u32>, MetadataError> {
    read_native(full_path, metadata)
}

#[cfg(target_os = "linux")]
fn read_native(full_path: &Path, metadata: &fs::Metadata) -> Result<Option<u32>, MetadataError> {
    use platform::flags::{get_flags, open_for_flags};

    let file_type = metadata.file_type();
    if !file_type.is_file() && !file_type.is_dir() {
        return Ok(None);
    }

    let file = open_for_flags(full_path, file_type.is_dir())
        .map_err(|error| MetadataError::new("open for flag capture", full_path, error))?;
    match get_flags(&file) {
        Ok(flags) => Ok(Some(flags & linux::MODIFIABLE).filter(|flags| *flags != 0)),
        Err(error) if platform::flags::is_unsupported(&error) => Ok(None),
        Err(error) => Err(MetadataError::new("read flags", full_path, error)),
    }
}

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn read_native(_full_path: &Path, metadata: &fs::Metadata) -> Result<Option<u32>, MetadataError> {
    let flags = platform::flags::stat_flags(metadata);
    Ok((flags != 0).then_some(flags))
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn read_native(_full_path: &Path, _metadata: &fs::Metadata) -> Result<Option<u32>, MetadataError> {
    Ok(None)
}

/// Reads the flag word into `entry.platform_flags`, logging failures.
///
/// Returns `false` when the word could not be read.
pub fn capture_platform_flags(entry: &mut Entry, full_path: &Path, metadata: &fs::Metadata) -> bool {
    match read_platform_flags(full_path, metadata) {
        Ok(flags) => {
            entry.platform_flags = flags;
            true
        }
        Err(error) => {
            log_warn!(Flags, "{}", error);
            false
        }
    }
}
