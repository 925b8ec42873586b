//! Linear merge of two canonically sorted entry sequences.

use crate::entry::Entry;
use crate::order::compare;
use std::cmp::Ordering;

/// One step of a merge between an old and a new sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DiffItem<'a> {
    /// Present only in the old sequence.
    Removed(&'a Entry),
    /// Present only in the new sequence.
    Added(&'a Entry),
    /// Present in both with differing metadata.
    Changed {
        /// Entry from the old sequence.
        old: &'a Entry,
        /// Entry from the new sequence.
        new: &'a Entry,
    },
    /// Present in both with identical metadata.
    Unchanged(&'a Entry),
}

impl<'a> DiffItem<'a> {
    /// The entry whose path this item describes.
    #[must_use]
    pub const fn entry(&self) -> &'a Entry {
        match *self {
            Self::Removed(entry) | Self::Added(entry) | Self::Unchanged(entry) => entry,
            Self::Changed { new, .. } => new,
        }
    }
}

/// Returns `true` when two entries at the same path carry the same metadata.
///
/// Size, modification time, mode, ownership, link target, payload words, flag
/// word and the attribute map are compared. The transient device/inode
/// identity is ignored.
#[must_use]
pub fn same_metadata(old: &Entry, new: &Entry) -> bool {
    old.size == new.size
        && old.mod_time == new.mod_time
        && old.mode == new.mode
        && old.uid == new.uid
        && old.gid == new.gid
        && old.link == new.link
        && old.hardlink == new.hardlink
        && old.start_chunk == new.start_chunk
        && old.start_offset == new.start_offset
        && old.platform_flags == new.platform_flags
        && old.attributes() == new.attributes()
}

/// Iterator produced by [`merge_diff`].
pub struct MergeDiff<'a> {
    old: &'a [Entry],
    new: &'a [Entry],
}

/// Walks two canonically sorted slices in lockstep.
///
/// Both inputs must satisfy [`crate::order::check_canonical_order`]. The
/// iterator yields items in canonical order, so a directory is always
/// reported before anything beneath it.
#[must_use]
pub fn merge_diff<'a>(old: &'a [Entry], new: &'a [Entry]) -> MergeDiff<'a> {
    MergeDiff { old, new }
}

impl<'a> Iterator for MergeDiff<'a> {
    type Item = DiffItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let old = self.old;
        let new = self.new;
        match (old.split_first(), new.split_first()) {
            (None, None) => None,
            (Some((removed, rest)), None) => {
                self.old = rest;
                Some(DiffItem::Removed(removed))
            }
            (None, Some((added, rest))) => {
                self.new = rest;
                Some(DiffItem::Added(added))
            }
            (Some((left, old_rest)), Some((right, new_rest))) => match compare(left, right) {
                Ordering::Less => {
                    self.old = old_rest;
                    Some(DiffItem::Removed(left))
                }
                Ordering::Greater => {
                    self.new = new_rest;
                    Some(DiffItem::Added(right))
                }
                Ordering::Equal => {
                    self.old = old_rest;
                    self.new = new_rest;
                    if same_metadata(left, right) {
                        Some(DiffItem::Unchanged(right))
                    } else {
                        Some(DiffItem::Changed {
                            old: left,
                            new: right,
                        })
                    }
                }
            },
        }
    }
}
