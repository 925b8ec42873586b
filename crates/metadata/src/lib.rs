#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `metadata` models one filesystem object as an [`Entry`] and implements
//! everything needed to capture that object from disk and put it back:
//! ownership, extended attributes, the OS flag word, special file identity
//! and hardlink identity. Entries from independent sources (a live walk and a
//! stored listing) share one canonical total order, so two listings can be
//! compared by a single linear merge.
//!
//! # Design
//!
//! - [`order`] defines the canonical order ([`compare`], [`sort_entries`]).
//!   [`diff::merge_diff`] merges two sorted listings.
//! - [`attributes`] abstracts the attribute namespace behind
//!   [`AttributeProvider`]; [`NativeAttributes`] is the implementation for the
//!   build target.
//! - [`flags`] restores the OS flag word in three phases so that immutable
//!   and append-only bits never block the rest of a restore.
//! - [`hardlink`] tracks (device, inode) identities during a walk and
//!   re-elects canonical entries once a listing is sorted.
//! - [`special`] encodes device numbers and recreates fifos, sockets and
//!   device nodes.
//! - [`restore`] sequences creation, content and the final metadata steps.
//! - [`exclude`] recognises the per-object exclusion markers.
//!
//! # Invariants
//!
//! - A directory sorts strictly before every entry beneath it.
//! - The attribute map of an [`Entry`] is absent or non-empty and never
//!   holds a NUL-prefixed name.
//! - Early flag phases never apply an immutable or append-class bit.
//! - Applying the same entry's attributes twice writes nothing the second
//!   time.
//!
//! # Errors
//!
//! Filesystem failures surface as [`MetadataError`], which keeps the failed
//! operation, the path and the [`std::io::Error`]. [`ErrorClass`] tells
//! item-scoped failures (skip and continue) apart from structural ones.
//! Recoverable conditions are additionally reported through the `logging`
//! macros.
//!
//! # Examples
//!
//! ```
//! use metadata::{Entry, S_IFDIR, S_IFREG, sort_entries};
//!
//! let mut entries = vec![
//!     Entry::new("a/c", S_IFREG | 0o644),
//!     Entry::new("a", S_IFDIR | 0o755),
//!     Entry::new("a0", S_IFREG | 0o644),
//!     Entry::new("a", S_IFREG | 0o644),
//! ];
//! sort_entries(&mut entries).expect("distinct keys");
//! let order: Vec<_> = entries.iter().map(|e| e.display_path().into_owned()).collect();
//! assert_eq!(order, ["a", "a0", "a", "a/c"]);
//! assert!(entries[2].is_dir());
//! ```

pub mod attributes;
pub mod diff;
mod entry;
mod error;
pub mod exclude;
pub mod flags;
#[cfg(any(target_os = "openbsd", target_os = "dragonfly"))]
mod flags_only;
pub mod hardlink;
pub mod order;
pub mod ownership;
pub mod restore;
pub mod special;
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
mod xattr;

pub use attributes::{
    AttributeProvider, AttributeSync, NativeAttributes, NoopAttributes, capture_attributes,
    native_attributes, set_attributes_to_file,
};
pub use diff::{DiffItem, merge_diff};
pub use entry::{
    Entry, FileKind, HardlinkRole, LEGACY_FLAG_KEYS, S_IFBLK, S_IFCHR, S_IFDIR, S_IFIFO, S_IFLNK,
    S_IFMT, S_IFREG, S_IFSOCK, validate_attribute_name,
};
pub use error::{AttributeNameError, ErrorClass, MetadataError, OrderError};
pub use flags::{
    FlagFamily, FlagMask, FlagOutcome, FlagPhase, FlagRestorer, FlagTarget, Privilege,
    capture_platform_flags, read_platform_flags,
};
#[cfg(any(target_os = "openbsd", target_os = "dragonfly"))]
pub use flags_only::{FLAGS_PSEUDO_ATTRIBUTE, FlagsOnlyAttributes};
pub use hardlink::{DevIno, HardlinkLookup, HardlinkTracker, canonicalize_sorted, restore_hardlink};
pub use order::{check_canonical_order, compare, sort_entries};
pub use restore::{FinishReport, RestoreOptions};
pub use special::{create_special, decode_device, encode_device};
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
pub use crate::xattr::XattrAttributes;
