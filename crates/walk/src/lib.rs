#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `walk` enumerates a directory tree concurrently and produces
//! [`metadata::Entry`] values in canonical order. Workers list one directory
//! level at a time and stream the children over a bounded channel; the
//! collecting thread sorts the result so the output never depends on how the
//! work was scheduled.
//!
//! # Design
//!
//! - [`DirectoryLister::list_dir`] captures the immediate children of one
//!   directory: type, ownership, link target, attributes and flag word,
//!   hardlink role, and the exclusion marker when requested.
//! - [`PendingDirectories`] is the work stack shared by the workers. It
//!   closes itself once no directory is queued or being listed.
//! - [`walk_tree`] wires both together on scoped threads and returns a
//!   [`WalkOutcome`].
//!
//! # Invariants
//!
//! - Symlinks are recorded, never followed.
//! - A directory carrying the exclusion marker is neither emitted nor
//!   descended into.
//! - Within a hardlink group the first entry in canonical order carries the
//!   content; the others name it through [`metadata::Entry::link`].
//!
//! # Errors
//!
//! [`WalkError`] reports directories that could not be opened. Only the
//! root is fatal; other failures are collected in [`WalkOutcome::errors`]
//! while the rest of the tree is still walked.
//!
//! # Examples
//!
//! ```
//! use walk::{ListOptions, WalkConfig, walk_tree};
//! use std::fs;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let temp = tempfile::tempdir()?;
//! fs::create_dir(temp.path().join("a"))?;
//! fs::write(temp.path().join("a/c"), b"data")?;
//! fs::write(temp.path().join("a0"), b"data")?;
//! fs::write(temp.path().join("a-"), b"data")?;
//!
//! let outcome = walk_tree(temp.path(), ListOptions::new(), WalkConfig::new().workers(2))?;
//! let paths: Vec<_> = outcome
//!     .entries
//!     .iter()
//!     .map(|entry| entry.display_path().into_owned())
//!     .collect();
//! assert_eq!(paths, ["a-", "a0", "a", "a/c"]);
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

mod driver;
mod error;
mod lister;
mod options;
mod pending;

pub use driver::{WalkOutcome, WalkStats, walk_tree, walk_with};
pub use error::{WalkError, WalkErrorKind};
pub use lister::{DirectoryLister, ListStats, Listing};
pub use options::{DEFAULT_CHANNEL_CAPACITY, ListOptions, WalkConfig};
pub use pending::PendingDirectories;
