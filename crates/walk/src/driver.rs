use crate::error::WalkError;
use crate::lister::{DirectoryLister, ListStats};
use crate::options::{ListOptions, WalkConfig};
use crate::pending::PendingDirectories;
use crossbeam_channel::{Sender, bounded};
use logging::{log_info, log_warn};
use metadata::{AttributeProvider, Entry, canonicalize_sorted, sort_entries};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::thread;

/// Everything a completed walk produced.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Every emitted entry in canonical order, hardlink roles settled.
    pub entries: Vec<Entry>,
    /// Directories that could not be listed.
    pub errors: Vec<WalkError>,
    /// Counters summed over all directories, skipped paths sorted.
    pub stats: WalkStats,
}

/// Counters of a whole walk.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct WalkStats {
    /// Directories listed, including the root.
    pub directories: usize,
    /// Counters summed over every listed directory.
    pub listing: ListStats,
}

/// Walks the tree below `root` with the attribute provider of the build
/// target.
///
/// See [`walk_with`].
pub fn walk_tree(
    root: impl Into<PathBuf>,
    options: ListOptions,
    config: WalkConfig,
) -> Result<WalkOutcome, WalkError> {
    let lister = DirectoryLister::new(root, options);
    walk_with(&lister, config)
}

/// Walks the tree below the lister's root on `config.worker_count()`
/// threads.
///
/// Entries flow through a bounded channel to the calling thread, which
/// collects them until every worker finished, then sorts them canonically
/// and settles hardlink roles. The root itself is not emitted. A directory
/// that cannot be listed is recorded in [`WalkOutcome::errors`] and its
/// subtree skipped; only a root that cannot be opened aborts the walk.
///
/// `lister` carries the hardlink table of one walk and should not be reused.
pub fn walk_with<P: AttributeProvider>(
    lister: &DirectoryLister<P>,
    config: WalkConfig,
) -> Result<WalkOutcome, WalkError> {
    let root = lister.root().to_path_buf();
    let root_metadata =
        fs::metadata(&root).map_err(|error| WalkError::root(root.clone(), error))?;
    if !root_metadata.is_dir() {
        return Err(WalkError::root(
            root,
            io::Error::new(io::ErrorKind::NotADirectory, "walk root is not a directory"),
        ));
    }

    let pending = PendingDirectories::new(Vec::new());
    let shared = Shared {
        errors: Mutex::new(Vec::new()),
        stats: Mutex::new(WalkStats::default()),
    };
    let (sender, receiver) = bounded(config.capacity());

    let mut entries: Vec<Entry> = thread::scope(|scope| {
        for _ in 0..config.worker_count() {
            let sender = sender.clone();
            let pending = &pending;
            let shared = &shared;
            scope.spawn(move || run_worker(lister, pending, &sender, shared));
        }
        // Workers hold the only senders; the channel closes once all of them exit.
        drop(sender);
        receiver.iter().collect()
    });

    let mut errors = shared.errors.into_inner().unwrap_or_else(PoisonError::into_inner);
    let mut stats = shared.stats.into_inner().unwrap_or_else(PoisonError::into_inner);
    if let Some(position) = errors.iter().position(WalkError::is_fatal) {
        return Err(errors.swap_remove(position));
    }

    sort_entries(&mut entries).map_err(|error| WalkError::order(root.clone(), error))?;
    canonicalize_sorted(&mut entries);
    stats.listing.skipped.sort();
    errors.sort_by(|a, b| a.path().cmp(b.path()));

    log_info!(
        Walk,
        "walked {}: {} directories, {} entries, {} excluded, {} skipped, {} errors",
        root.display(),
        stats.directories,
        entries.len(),
        stats.listing.excluded,
        stats.listing.skipped.len(),
        errors.len()
    );

    Ok(WalkOutcome {
        entries,
        errors,
        stats,
    })
}

struct Shared {
    errors: Mutex<Vec<WalkError>>,
    stats: Mutex<WalkStats>,
}

fn run_worker<P: AttributeProvider>(
    lister: &DirectoryLister<P>,
    pending: &PendingDirectories,
    sender: &Sender<Entry>,
    shared: &Shared,
) {
    while let Some(directory) = pending.pop() {
        match lister.list_dir(&directory, sender) {
            Ok(listing) => {
                {
                    let mut stats = shared.stats.lock().unwrap_or_else(PoisonError::into_inner);
                    stats.directories += 1;
                    stats.listing.merge(listing.stats);
                }
                pending.complete(listing.subdirectories);
            }
            Err(error) => {
                let stop = error.is_fatal()
                    || matches!(error.kind(), crate::WalkErrorKind::ChannelClosed { .. });
                if stop {
                    pending.abort();
                } else {
                    log_warn!(Walk, "{}", error);
                    pending.complete(Vec::new());
                }
                shared
                    .errors
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(error);
            }
        }
    }
}
