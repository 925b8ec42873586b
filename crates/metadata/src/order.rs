//! Canonical entry order.
//!
//! Every entry maps to a byte key built component by component. Each
//! component contributes `rank || name || 0x00`, where the rank is
//!
//! | rank | component |
//! |------|-----------|
//! | `0`  | final component of a non-directory |
//! | `1`  | final component of a directory |
//! | `2`  | an ancestor directory of the entry |
//!
//! and keys compare as unsigned bytes. Within one directory this lists the
//! files first, then the subdirectories themselves, then the contents of
//! those subdirectories. A directory therefore sorts strictly before all of
//! its descendants, and a name that is a prefix of a sibling's name sorts
//! first because of the terminator. Two sorted sequences over the same tree
//! can be merged linearly and the merge never visits a child before its
//! parent.
//!
//! For files `a`, `a-`, `a0` and a directory `a` holding `c` the order is
//! `a`, `a-`, `a0`, `a/`, `a/c`.

use crate::entry::Entry;
use crate::error::OrderError;
use std::cmp::Ordering;

const RANK_FILE: u8 = 0;
const RANK_DIRECTORY: u8 = 1;
const RANK_ANCESTOR: u8 = 2;
const TERMINATOR: u8 = 0;

/// Builds the comparison key for a relative path.
///
/// Empty components (doubled or trailing slashes) are ignored, so `a//b`
/// and `a/b` share a key. The empty path yields the empty key, which sorts
/// before everything else.
#[must_use]
pub fn sort_key(path: &[u8], is_dir: bool) -> Vec<u8> {
    let mut key = Vec::with_capacity(path.len() + 8);
    let mut components = path.split(|byte| *byte == b'/').filter(|c| !c.is_empty());
    let mut current = components.next();
    while let Some(component) = current {
        let next = components.next();
        let rank = match (next.is_some(), is_dir) {
            (true, _) => RANK_ANCESTOR,
            (false, true) => RANK_DIRECTORY,
            (false, false) => RANK_FILE,
        };
        key.push(rank);
        key.extend_from_slice(component);
        key.push(TERMINATOR);
        current = next;
    }
    key
}

/// Key of an entry.
#[must_use]
pub fn entry_key(entry: &Entry) -> Vec<u8> {
    sort_key(&entry.path, entry.is_dir())
}

/// Compares two entries in canonical order without allocating.
#[must_use]
pub fn compare(a: &Entry, b: &Entry) -> Ordering {
    compare_paths(&a.path, a.is_dir(), &b.path, b.is_dir())
}

/// Compares two paths in canonical order without allocating.
#[must_use]
pub fn compare_paths(a: &[u8], a_is_dir: bool, b: &[u8], b_is_dir: bool) -> Ordering {
    KeyBytes::new(a, a_is_dir).cmp(KeyBytes::new(b, b_is_dir))
}

/// Sorts `entries` canonically and verifies that no two keys collide.
pub fn sort_entries(entries: &mut [Entry]) -> Result<(), OrderError> {
    entries.sort_by(compare);
    check_canonical_order(entries)
}

/// Verifies that `entries` is strictly increasing in canonical order.
///
/// Equal keys are reported as [`OrderError::DuplicateKey`] rather than being
/// resolved by an arbitrary tie-break.
pub fn check_canonical_order(entries: &[Entry]) -> Result<(), OrderError> {
    for (index, pair) in entries.windows(2).enumerate() {
        match compare(&pair[0], &pair[1]) {
            Ordering::Less => {}
            Ordering::Equal => {
                return Err(OrderError::DuplicateKey {
                    index_a: index,
                    index_b: index + 1,
                    path: pair[1].display_path().into_owned(),
                });
            }
            Ordering::Greater => {
                return Err(OrderError::OutOfOrder {
                    index: index + 1,
                    path: pair[1].display_path().into_owned(),
                });
            }
        }
    }
    Ok(())
}

/// Lazily produced key bytes, identical to [`sort_key`].
struct KeyBytes<'a> {
    rest: &'a [u8],
    is_dir: bool,
    component: &'a [u8],
    rank: u8,
    position: Option<usize>,
}

impl<'a> KeyBytes<'a> {
    fn new(path: &'a [u8], is_dir: bool) -> Self {
        Self {
            rest: path,
            is_dir,
            component: &[],
            rank: RANK_FILE,
            position: None,
        }
    }

    fn advance(&mut self) -> bool {
        loop {
            if self.rest.is_empty() {
                return false;
            }
            let end = self
                .rest
                .iter()
                .position(|byte| *byte == b'/')
                .unwrap_or(self.rest.len());
            let component = &self.rest[..end];
            self.rest = self.rest.get(end + 1..).unwrap_or_default();
            if component.is_empty() {
                continue;
            }
            let has_more = self.rest.iter().any(|byte| *byte != b'/');
            self.rank = match (has_more, self.is_dir) {
                (true, _) => RANK_ANCESTOR,
                (false, true) => RANK_DIRECTORY,
                (false, false) => RANK_FILE,
            };
            self.component = component;
            self.position = Some(0);
            return true;
        }
    }
}

impl Iterator for KeyBytes<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.position.is_none() && !self.advance() {
            return None;
        }
        let position = self.position?;
        let byte = if position == 0 {
            self.rank
        } else if position <= self.component.len() {
            self.component[position - 1]
        } else {
            self.position = None;
            return Some(TERMINATOR);
        };
        self.position = Some(position + 1);
        Some(byte)
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Canonical order on paths, then the remaining fields so that `Ord` stays
/// consistent with `Eq`.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
            .then_with(|| self.mode.cmp(&other.mode))
            .then_with(|| self.size.cmp(&other.size))
            .then_with(|| self.mod_time.cmp(&other.mod_time))
            .then_with(|| self.uid.cmp(&other.uid))
            .then_with(|| self.gid.cmp(&other.gid))
            .then_with(|| self.platform_flags.cmp(&other.platform_flags))
            .then_with(|| self.start_chunk.cmp(&other.start_chunk))
            .then_with(|| self.start_offset.cmp(&other.start_offset))
            .then_with(|| self.link.cmp(&other.link))
            .then_with(|| self.attributes().cmp(&other.attributes()))
            .then_with(|| hardlink_rank(self).cmp(&hardlink_rank(other)))
            .then_with(|| self.identity.cmp(&other.identity))
    }
}

fn hardlink_rank(entry: &Entry) -> u8 {
    match entry.hardlink {
        crate::entry::HardlinkRole::None => 0,
        crate::entry::HardlinkRole::Canonical => 1,
        crate::entry::HardlinkRole::LinkTo => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{S_IFDIR, S_IFREG};
    use proptest::prelude::*;

    fn file(path: &str) -> Entry {
        Entry::new(path, S_IFREG | 0o644)
    }

    fn dir(path: &str) -> Entry {
        Entry::new(path, S_IFDIR | 0o755)
    }

    fn render(entries: &[Entry]) -> Vec<String> {
        entries
            .iter()
            .map(|entry| {
                let mut path = entry.display_path().into_owned();
                if entry.is_dir() {
                    path.push('/');
                }
                path
            })
            .collect()
    }

    #[test]
    fn files_sort_before_same_named_directory_and_its_children() {
        let mut entries = vec![dir("a"), file("a/c"), file("a0"), file("a-"), file("a")];
        sort_entries(&mut entries).expect("distinct keys");
        assert_eq!(render(&entries), ["a", "a-", "a0", "a/", "a/c"]);
    }

    #[test]
    fn nested_tree_orders_levels_breadth_first_within_each_directory() {
        let expected = [
            "ab", "ab-", "ab0", "ab1", "ab+/", "ab2/", "ab3/", "ab+/c", "ab+/c+", "ab+/c1",
            "ab+/c-/", "ab+/c0/", "ab+/c-/d", "ab+/c0/d", "ab2/c", "ab3/c",
        ];
        let mut entries: Vec<Entry> = expected
            .iter()
            .rev()
            .map(|path| match path.strip_suffix('/') {
                Some(stripped) => dir(stripped),
                None => file(path),
            })
            .collect();
        sort_entries(&mut entries).expect("distinct keys");
        assert_eq!(render(&entries), expected);
    }

    #[test]
    fn lazy_comparison_matches_materialized_keys() {
        let paths = ["", "a", "a/b", "a//b", "ab", "a-b/c", "b/", "\u{ff}x"];
        for a in paths {
            for b in paths {
                for (a_dir, b_dir) in [(false, false), (true, false), (false, true), (true, true)] {
                    let expected = sort_key(a.as_bytes(), a_dir).cmp(&sort_key(b.as_bytes(), b_dir));
                    assert_eq!(
                        compare_paths(a.as_bytes(), a_dir, b.as_bytes(), b_dir),
                        expected,
                        "{a:?}/{a_dir} vs {b:?}/{b_dir}"
                    );
                }
            }
        }
    }

    #[test]
    fn duplicate_keys_are_a_structural_error() {
        let mut entries = vec![file("x"), file("y"), file("x")];
        let error = sort_entries(&mut entries).unwrap_err();
        assert!(matches!(error, OrderError::DuplicateKey { index_a: 0, index_b: 1, .. }));
    }

    #[test]
    fn out_of_order_input_is_reported() {
        let entries = vec![file("b"), file("a")];
        let error = check_canonical_order(&entries).unwrap_err();
        assert_eq!(
            error,
            OrderError::OutOfOrder {
                index: 1,
                path: "a".to_owned()
            }
        );
    }

    #[test]
    fn root_sentinel_sorts_first() {
        let mut entries = vec![file("a"), Entry::root(), dir("b")];
        sort_entries(&mut entries).expect("distinct keys");
        assert!(entries[0].is_root());
    }

    fn arb_entry() -> impl Strategy<Value = (String, bool)> {
        (
            prop::collection::vec(prop::sample::select(vec!["a", "b", "a-", "a0", "ab", "+"]), 1..4),
            any::<bool>(),
        )
            .prop_map(|(components, is_dir)| (components.join("/"), is_dir))
    }

    proptest! {
        #[test]
        fn comparator_is_antisymmetric_and_transitive(
            a in arb_entry(),
            b in arb_entry(),
            c in arb_entry(),
        ) {
            let cmp = |x: &(String, bool), y: &(String, bool)| {
                compare_paths(x.0.as_bytes(), x.1, y.0.as_bytes(), y.1)
            };
            prop_assert_eq!(cmp(&a, &b), cmp(&b, &a).reverse());
            if cmp(&a, &b) != Ordering::Greater && cmp(&b, &c) != Ordering::Greater {
                prop_assert_ne!(cmp(&a, &c), Ordering::Greater);
            }
        }

        #[test]
        fn parents_always_precede_children(
            (path, is_dir) in arb_entry(),
        ) {
            let child = format!("{path}/z");
            prop_assert_eq!(
                compare_paths(path.as_bytes(), true, child.as_bytes(), is_dir),
                Ordering::Less
            );
        }

        #[test]
        fn every_permutation_sorts_to_one_sequence(
            shuffle in Just(vec![
                "x", "x-", "x0", "x/y", "x/y/z", "x/y0", "y",
            ]).prop_shuffle(),
        ) {
            let build = |paths: &[&str]| -> Vec<Entry> {
                paths
                    .iter()
                    .map(|path| match *path {
                        "x/y" => dir(path),
                        _ => file(path),
                    })
                    .chain(std::iter::once(dir("x")))
                    .collect()
            };
            let mut shuffled = build(&shuffle);
            let mut reference = build(&["x", "x-", "x0", "x/y", "x/y/z", "x/y0", "y"]);
            sort_entries(&mut shuffled).expect("distinct keys");
            sort_entries(&mut reference).expect("distinct keys");
            prop_assert_eq!(render(&shuffled), render(&reference));
        }
    }
}
