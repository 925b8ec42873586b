#![cfg(unix)]

use filetime::FileTime;
use metadata::restore::{create_directory, create_file, finish_entry, restore_symlink};
use metadata::{
    DiffItem, Entry, FileKind, FlagOutcome, FlagRestorer, NoopAttributes, Privilege,
    RestoreOptions, merge_diff, sort_entries,
};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

fn capture(root: &Path, relative: &[&str]) -> Vec<Entry> {
    let mut entries: Vec<Entry> = relative
        .iter()
        .map(|path| {
            let full = root.join(path);
            let metadata = fs::symlink_metadata(&full).expect("stat source");
            let mut entry = Entry::from_metadata(path.as_bytes(), &metadata);
            if entry.kind() == FileKind::Symlink {
                let target = fs::read_link(&full).expect("read link");
                entry.link = Some(target.to_str().expect("utf-8 target").as_bytes().to_vec());
            }
            entry
        })
        .collect();
    sort_entries(&mut entries).expect("sort captured entries");
    entries
}

fn build_source(root: &Path) {
    fs::create_dir_all(root.join("docs/old")).expect("create dirs");
    fs::write(root.join("docs/readme"), b"hello").expect("write readme");
    fs::write(root.join("docs/old/notes"), b"older notes").expect("write notes");
    fs::write(root.join("top"), b"t").expect("write top");
    std::os::unix::fs::symlink("docs/readme", root.join("shortcut")).expect("symlink");

    fs::set_permissions(root.join("docs/readme"), fs::Permissions::from_mode(0o640))
        .expect("chmod readme");
    fs::set_permissions(root.join("docs/old"), fs::Permissions::from_mode(0o750))
        .expect("chmod old");
    for (path, seconds) in [
        ("docs/old/notes", 1_000_000_000),
        ("docs/old", 1_100_000_000),
        ("docs/readme", 1_200_000_000),
        ("docs", 1_300_000_000),
        ("top", 1_400_000_000),
    ] {
        let time = FileTime::from_unix_time(seconds, 0);
        filetime::set_file_times(root.join(path), time, time).expect("set times");
    }
}

const PATHS: [&str; 6] = [
    "docs",
    "docs/old",
    "docs/old/notes",
    "docs/readme",
    "shortcut",
    "top",
];

#[test]
fn restored_tree_matches_the_capture() {
    let temp = tempfile::tempdir().expect("tempdir");
    let source = temp.path().join("source");
    let target = temp.path().join("target");
    fs::create_dir_all(&source).expect("create source");
    fs::create_dir_all(&target).expect("create target");
    build_source(&source);

    let captured = capture(&source, &PATHS);
    let restorer = FlagRestorer::new(Privilege::detect());
    let options = RestoreOptions::new().owner(false);

    for entry in &captured {
        match entry.kind() {
            FileKind::Directory => {
                let outcome =
                    create_directory(&target, entry, &restorer, &options).expect("create dir");
                assert_eq!(outcome, FlagOutcome::NothingToDo);
            }
            FileKind::Regular => {
                let content = fs::read(entry.full_path(&source)).expect("read source");
                create_file(&target, entry, &restorer, &options, |file| {
                    file.write_all(&content)
                })
                .expect("create file");
            }
            FileKind::Symlink => restore_symlink(&target, entry).expect("create symlink"),
            other => panic!("unexpected kind {other:?}"),
        }
    }
    // Children first, so directory times are not disturbed afterwards.
    for entry in captured.iter().rev() {
        let report = finish_entry(&target, entry, &NoopAttributes, &restorer, &options)
            .expect("finish entry");
        assert!(report.owner_restored);
        assert!(report.attributes.is_noop());
    }

    let restored = capture(&target, &PATHS);
    let changed: Vec<_> = merge_diff(&captured, &restored)
        .filter(|item| !matches!(item, DiffItem::Unchanged(_)))
        .map(|item| item.entry().display_path().into_owned())
        .collect();
    assert!(changed.is_empty(), "differences: {changed:?}");
    assert_eq!(
        fs::read(target.join("docs/old/notes")).expect("read restored"),
        b"older notes"
    );
}

#[test]
fn modified_tree_reports_changes_in_canonical_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    build_source(temp.path());
    let before = capture(temp.path(), &PATHS);

    fs::write(temp.path().join("docs/readme"), b"hello, again").expect("rewrite readme");
    fs::remove_file(temp.path().join("top")).expect("remove top");
    fs::write(temp.path().join("docs/new"), b"n").expect("write new");
    let after = capture(
        temp.path(),
        &["docs", "docs/new", "docs/old", "docs/old/notes", "docs/readme", "shortcut"],
    );

    let summary: Vec<(String, &str)> = merge_diff(&before, &after)
        .filter_map(|item| {
            let label = match item {
                DiffItem::Added(_) => "added",
                DiffItem::Removed(_) => "removed",
                DiffItem::Changed { .. } => "changed",
                DiffItem::Unchanged(_) => return None,
            };
            Some((item.entry().display_path().into_owned(), label))
        })
        .collect();

    assert_eq!(
        summary,
        [
            ("top".to_owned(), "removed"),
            ("docs".to_owned(), "changed"),
            ("docs/new".to_owned(), "added"),
            ("docs/readme".to_owned(), "changed"),
        ]
    );
}
