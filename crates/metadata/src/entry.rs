use crate::error::AttributeNameError;
use crate::hardlink::DevIno;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Mask selecting the file type bits of `st_mode`.
pub const S_IFMT: u32 = 0o170000;
/// Socket type bits.
pub const S_IFSOCK: u32 = 0o140000;
/// Symbolic link type bits.
pub const S_IFLNK: u32 = 0o120000;
/// Regular file type bits.
pub const S_IFREG: u32 = 0o100000;
/// Block device type bits.
pub const S_IFBLK: u32 = 0o060000;
/// Directory type bits.
pub const S_IFDIR: u32 = 0o040000;
/// Character device type bits.
pub const S_IFCHR: u32 = 0o020000;
/// Named pipe type bits.
pub const S_IFIFO: u32 = 0o010000;

/// Legacy reserved keys that carried the OS flag word inside the attribute map.
pub const LEGACY_FLAG_KEYS: [&str; 4] = ["\0L", "\0lf", "\0bf", "\0B"];

/// Object type decoded from the `st_mode` discriminant.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FileKind {
    /// Regular file.
    Regular,
    /// Directory.
    Directory,
    /// Symbolic link.
    Symlink,
    /// Named pipe.
    Fifo,
    /// Character device.
    CharDevice,
    /// Block device.
    BlockDevice,
    /// Unix domain socket.
    Socket,
    /// Type bits that match none of the above.
    Unknown,
}

impl FileKind {
    /// Decodes the type bits of `mode`.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        match mode & S_IFMT {
            S_IFREG => Self::Regular,
            S_IFDIR => Self::Directory,
            S_IFLNK => Self::Symlink,
            S_IFIFO => Self::Fifo,
            S_IFCHR => Self::CharDevice,
            S_IFBLK => Self::BlockDevice,
            S_IFSOCK => Self::Socket,
            _ => Self::Unknown,
        }
    }

    /// Returns the `st_mode` type bits for this kind.
    #[must_use]
    pub const fn mode_bits(self) -> u32 {
        match self {
            Self::Regular => S_IFREG,
            Self::Directory => S_IFDIR,
            Self::Symlink => S_IFLNK,
            Self::Fifo => S_IFIFO,
            Self::CharDevice => S_IFCHR,
            Self::BlockDevice => S_IFBLK,
            Self::Socket => S_IFSOCK,
            Self::Unknown => 0,
        }
    }

    /// Block and character devices.
    #[must_use]
    pub const fn is_device(self) -> bool {
        matches!(self, Self::CharDevice | Self::BlockDevice)
    }

    /// Devices, fifos and sockets.
    #[must_use]
    pub const fn is_special(self) -> bool {
        matches!(
            self,
            Self::CharDevice | Self::BlockDevice | Self::Fifo | Self::Socket
        )
    }

    /// Kinds whose extended attributes are captured and restored.
    #[must_use]
    pub const fn carries_attributes(self) -> bool {
        matches!(self, Self::Regular | Self::Directory | Self::Symlink)
    }
}

/// Role of an entry within a group of paths sharing one inode.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HardlinkRole {
    /// Not part of a hardlink group.
    #[default]
    None,
    /// The entry whose content and metadata are captured.
    Canonical,
    /// A further name for the canonical entry stored in [`Entry::link`].
    LinkTo,
}

/// Captured metadata for one filesystem object.
///
/// `path` is relative to the walk root, slash separated, without a leading or
/// trailing slash, and may contain arbitrary non-NUL bytes. Directories are
/// recognised through the type bits of `mode`.
///
/// The attribute map is private so that its invariants hold: it is either
/// absent or non-empty, and it never holds a NUL-prefixed name.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "EntryRecord"))]
pub struct Entry {
    /// Relative path bytes.
    pub path: Vec<u8>,
    /// Content length; zero for directories, specials and secondary hardlinks.
    pub size: u64,
    /// Modification time in seconds since the Unix epoch.
    pub mod_time: i64,
    /// `st_mode` bits: permissions plus the type discriminant.
    pub mode: u32,
    /// Owner id, `-1` when unknown.
    pub uid: i64,
    /// Group id, `-1` when unknown.
    pub gid: i64,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    attributes: Option<BTreeMap<String, Vec<u8>>>,
    /// OS flag word (`FS_IOC_GETFLAGS` on Linux, `st_flags` elsewhere).
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub platform_flags: Option<u32>,
    /// First payload word; the device major number for device nodes.
    pub start_chunk: i64,
    /// Second payload word; the device minor number for device nodes.
    pub start_offset: i64,
    /// Symlink target, or the canonical path for [`HardlinkRole::LinkTo`].
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub link: Option<Vec<u8>>,
    /// Hardlink group role.
    #[cfg_attr(feature = "serde", serde(default))]
    pub hardlink: HardlinkRole,
    /// Device and inode of the captured object while a walk is in progress.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub identity: Option<DevIno>,
}

impl Entry {
    /// Creates an entry with unknown ownership and no payload.
    pub fn new(path: impl Into<Vec<u8>>, mode: u32) -> Self {
        Self {
            path: path.into(),
            size: 0,
            mod_time: 0,
            mode,
            uid: crate::ownership::UNKNOWN_ID,
            gid: crate::ownership::UNKNOWN_ID,
            attributes: None,
            platform_flags: None,
            start_chunk: 0,
            start_offset: 0,
            link: None,
            hardlink: HardlinkRole::None,
            identity: None,
        }
    }

    /// The synthetic root sentinel: an empty path typed as a directory.
    #[must_use]
    pub fn root() -> Self {
        Self::new(Vec::new(), S_IFDIR | 0o755)
    }

    /// Builds an entry from `lstat`-style metadata.
    ///
    /// Sizes are zeroed for everything but regular files and symlinks, device
    /// numbers are stored through [`crate::special::encode_rdev`], and the
    /// device/inode identity is recorded for hardlink tracking.
    pub fn from_metadata(path: impl Into<Vec<u8>>, metadata: &fs::Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;

            let mut entry = Self::new(path, metadata.mode());
            let kind = entry.kind();
            entry.size = match kind {
                FileKind::Regular | FileKind::Symlink => metadata.size(),
                _ => 0,
            };
            entry.mod_time = metadata.mtime();
            (entry.uid, entry.gid) = crate::ownership::capture_owner(metadata);
            if kind.is_device() {
                let (chunk, offset) = crate::special::encode_rdev(metadata.rdev());
                entry.start_chunk = chunk;
                entry.start_offset = offset;
            }
            entry.identity = Some(DevIno::new(metadata.dev(), metadata.ino()));
            entry
        }

        #[cfg(not(unix))]
        {
            let file_type = metadata.file_type();
            let type_bits = if file_type.is_dir() {
                S_IFDIR
            } else if file_type.is_symlink() {
                S_IFLNK
            } else {
                S_IFREG
            };
            let permissions = if metadata.permissions().readonly() {
                0o444
            } else {
                0o644
            };
            let mut entry = Self::new(path, type_bits | permissions);
            entry.size = if file_type.is_dir() { 0 } else { metadata.len() };
            entry.mod_time = metadata
                .modified()
                .ok()
                .and_then(|time| time.duration_since(std::time::UNIX_EPOCH).ok())
                .map_or(0, |duration| duration.as_secs() as i64);
            entry
        }
    }

    /// Object type.
    #[must_use]
    pub const fn kind(&self) -> FileKind {
        FileKind::from_mode(self.mode)
    }

    /// Whether the type bits denote a directory.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind(), FileKind::Directory)
    }

    /// Whether this is the synthetic root sentinel.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Permission bits including setuid, setgid and sticky.
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }

    /// Last path component.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        self.path
            .rsplit(|byte| *byte == b'/')
            .next()
            .unwrap_or(&self.path)
    }

    /// Lossy rendering of the path for diagnostics.
    #[must_use]
    pub fn display_path(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }

    /// Relative path as a filesystem path.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        bytes_to_path(&self.path)
    }

    /// Absolute location of the entry below `root`.
    #[must_use]
    pub fn full_path(&self, root: &Path) -> PathBuf {
        if self.path.is_empty() {
            root.to_path_buf()
        } else {
            root.join(self.relative_path())
        }
    }

    /// Device major/minor for block and character devices.
    #[must_use]
    pub fn device(&self) -> Option<(u32, u32)> {
        self.kind()
            .is_device()
            .then(|| crate::special::decode_device(self.start_chunk, self.start_offset))
    }

    /// User-visible attributes, if any.
    #[must_use]
    pub const fn attributes(&self) -> Option<&BTreeMap<String, Vec<u8>>> {
        self.attributes.as_ref()
    }

    /// Value of a single attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&[u8]> {
        self.attributes
            .as_ref()
            .and_then(|attributes| attributes.get(name))
            .map(Vec::as_slice)
    }

    /// Stores an attribute, rejecting empty and NUL-prefixed names.
    pub fn set_attribute(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Vec<u8>>,
    ) -> Result<(), AttributeNameError> {
        let name = name.into();
        validate_attribute_name(&name)?;
        self.attributes
            .get_or_insert_with(BTreeMap::new)
            .insert(name, value.into());
        Ok(())
    }

    /// Removes an attribute, dropping the map once it is empty.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Vec<u8>> {
        let attributes = self.attributes.as_mut()?;
        let removed = attributes.remove(name);
        if attributes.is_empty() {
            self.attributes = None;
        }
        removed
    }

    /// Replaces the whole attribute map.
    pub fn set_attributes<I, N, V>(&mut self, attributes: I) -> Result<(), AttributeNameError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Vec<u8>>,
    {
        let mut map = BTreeMap::new();
        for (name, value) in attributes {
            let name = name.into();
            validate_attribute_name(&name)?;
            map.insert(name, value.into());
        }
        self.attributes = (!map.is_empty()).then_some(map);
        Ok(())
    }

    /// Builder form of [`Entry::set_attributes`].
    pub fn with_attributes<I, N, V>(mut self, attributes: I) -> Result<Self, AttributeNameError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<Vec<u8>>,
    {
        self.set_attributes(attributes)?;
        Ok(self)
    }

    /// Drops every attribute.
    pub fn clear_attributes(&mut self) {
        self.attributes = None;
    }

    /// Moves the attribute map out of the entry.
    pub(crate) fn take_attributes(&mut self) -> Option<BTreeMap<String, Vec<u8>>> {
        self.attributes.take()
    }

    /// Restores a map previously produced by [`Entry::take_attributes`].
    pub(crate) fn put_attributes(&mut self, attributes: Option<BTreeMap<String, Vec<u8>>>) {
        self.attributes = attributes.filter(|map| !map.is_empty());
    }

    /// Migrates legacy NUL-prefixed keys out of the attribute map.
    ///
    /// A recognised flag key whose value is a four byte little-endian word
    /// becomes [`Entry::platform_flags`] unless the field is already set. Every
    /// other NUL-prefixed key is discarded. Returns the number of keys removed.
    pub fn normalize_reserved_attributes(&mut self) -> usize {
        let Some(attributes) = self.attributes.as_mut() else {
            return 0;
        };

        let reserved: Vec<String> = attributes
            .keys()
            .filter(|name| name.starts_with('\0'))
            .cloned()
            .collect();
        for name in &reserved {
            let Some(value) = attributes.remove(name) else {
                continue;
            };
            if self.platform_flags.is_none() && LEGACY_FLAG_KEYS.contains(&name.as_str()) {
                if let Ok(word) = <[u8; 4]>::try_from(value.as_slice()) {
                    self.platform_flags = Some(u32::from_le_bytes(word));
                }
            }
        }

        if attributes.is_empty() {
            self.attributes = None;
        }
        reserved.len()
    }
}

/// Rejects names that may not appear in a user-visible attribute map.
pub fn validate_attribute_name(name: &str) -> Result<(), AttributeNameError> {
    if name.is_empty() {
        Err(AttributeNameError::Empty)
    } else if name.starts_with('\0') {
        Err(AttributeNameError::Reserved(name.to_owned()))
    } else {
        Ok(())
    }
}

#[cfg(unix)]
pub(crate) fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    PathBuf::from(OsStr::from_bytes(bytes))
}

#[cfg(not(unix))]
pub(crate) fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
}

/// Wire shape accepted when deserializing an [`Entry`].
///
/// Conversion strips a trailing slash from directory paths and migrates
/// legacy reserved attribute keys, so a deserialized entry always satisfies
/// the attribute invariants.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct EntryRecord {
    path: Vec<u8>,
    size: u64,
    mod_time: i64,
    mode: u32,
    uid: i64,
    gid: i64,
    #[serde(default)]
    attributes: Option<BTreeMap<String, Vec<u8>>>,
    #[serde(default)]
    platform_flags: Option<u32>,
    start_chunk: i64,
    start_offset: i64,
    #[serde(default)]
    link: Option<Vec<u8>>,
    #[serde(default)]
    hardlink: HardlinkRole,
}

#[cfg(feature = "serde")]
impl From<EntryRecord> for Entry {
    fn from(record: EntryRecord) -> Self {
        let mut entry = Self {
            path: record.path,
            size: record.size,
            mod_time: record.mod_time,
            mode: record.mode,
            uid: record.uid,
            gid: record.gid,
            attributes: record.attributes.filter(|map| !map.is_empty()),
            platform_flags: record.platform_flags,
            start_chunk: record.start_chunk,
            start_offset: record.start_offset,
            link: record.link,
            hardlink: record.hardlink,
            identity: None,
        };
        if entry.is_dir() && entry.path.len() > 1 && entry.path.ends_with(b"/") {
            entry.path.pop();
        }
        entry.attributes = entry.attributes.take().map(|mut map| {
            map.remove("");
            map
        });
        entry.normalize_reserved_attributes();
        if entry.attributes.as_ref().is_some_and(BTreeMap::is_empty) {
            entry.attributes = None;
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_mode_bits() {
        for kind in [
            FileKind::Regular,
            FileKind::Directory,
            FileKind::Symlink,
            FileKind::Fifo,
            FileKind::CharDevice,
            FileKind::BlockDevice,
            FileKind::Socket,
        ] {
            assert_eq!(FileKind::from_mode(kind.mode_bits() | 0o644), kind);
        }
        assert_eq!(FileKind::from_mode(0o644), FileKind::Unknown);
    }

    #[test]
    fn new_entries_have_unknown_ownership() {
        let entry = Entry::new("a/b", S_IFREG | 0o600);
        assert_eq!(entry.uid, -1);
        assert_eq!(entry.gid, -1);
        assert_eq!(entry.permissions(), 0o600);
        assert_eq!(entry.name(), b"b");
        assert!(entry.attributes().is_none());
    }

    #[test]
    fn root_sentinel_is_an_empty_directory_path() {
        let root = Entry::root();
        assert!(root.is_root());
        assert!(root.is_dir());
        assert_eq!(root.full_path(Path::new("/srv")), Path::new("/srv"));
    }

    #[test]
    fn reserved_and_empty_names_are_rejected() {
        let mut entry = Entry::new("f", S_IFREG | 0o644);
        assert_eq!(
            entry.set_attribute("\0lf", vec![1]),
            Err(AttributeNameError::Reserved("\0lf".to_owned()))
        );
        assert_eq!(entry.set_attribute("", vec![1]), Err(AttributeNameError::Empty));
        assert!(entry.attributes().is_none());

        let result = Entry::new("g", S_IFREG).with_attributes([("user.ok", vec![1]), ("\0B", vec![2])]);
        assert!(result.is_err());
    }

    #[test]
    fn attribute_map_is_absent_when_empty() {
        let mut entry = Entry::new("f", S_IFREG | 0o644);
        entry.set_attribute("user.a", vec![1, 2, 3]).expect("valid name");
        assert_eq!(entry.attribute("user.a"), Some(&[1, 2, 3][..]));

        assert_eq!(entry.remove_attribute("user.a"), Some(vec![1, 2, 3]));
        assert!(entry.attributes().is_none());

        entry
            .set_attributes(Vec::<(String, Vec<u8>)>::new())
            .expect("empty map");
        assert!(entry.attributes().is_none());
    }

    #[test]
    fn legacy_flag_keys_migrate_into_platform_flags() {
        let mut entry = Entry::new("f", S_IFREG | 0o644);
        let mut map = BTreeMap::new();
        map.insert("\0lf".to_owned(), 0x10_u32.to_le_bytes().to_vec());
        map.insert("\0junk".to_owned(), vec![9]);
        map.insert("user.keep".to_owned(), vec![7]);
        entry.put_attributes(Some(map));

        assert_eq!(entry.normalize_reserved_attributes(), 2);
        assert_eq!(entry.platform_flags, Some(0x10));
        assert_eq!(entry.attribute("user.keep"), Some(&[7][..]));
        assert_eq!(entry.attributes().map(BTreeMap::len), Some(1));
    }

    #[test]
    fn migration_drops_map_holding_only_reserved_keys() {
        let mut entry = Entry::new("f", S_IFREG | 0o644);
        let mut map = BTreeMap::new();
        map.insert("\0bf".to_owned(), 0x2_u32.to_le_bytes().to_vec());
        entry.put_attributes(Some(map));

        entry.normalize_reserved_attributes();
        assert_eq!(entry.platform_flags, Some(0x2));
        assert!(entry.attributes().is_none());
    }

    #[test]
    fn malformed_legacy_flag_value_is_discarded() {
        let mut entry = Entry::new("f", S_IFREG | 0o644);
        let mut map = BTreeMap::new();
        map.insert("\0L".to_owned(), vec![1, 2]);
        entry.put_attributes(Some(map));

        entry.normalize_reserved_attributes();
        assert_eq!(entry.platform_flags, None);
        assert!(entry.attributes().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_are_preserved() {
        let entry = Entry::new(vec![b'd', b'/', 0xff, 0xfe], S_IFREG | 0o644);
        assert_eq!(entry.name(), &[0xff, 0xfe]);
        let full = entry.full_path(Path::new("/r"));
        use std::os::unix::ffi::OsStrExt;
        assert_eq!(full.as_os_str().as_bytes(), b"/r/d/\xff\xfe");
    }

    #[cfg(unix)]
    #[test]
    fn from_metadata_captures_base_stat() {
        use std::os::unix::fs::MetadataExt;

        let dir = tempfile::tempdir().expect("create temp dir");
        let file = dir.path().join("file");
        fs::write(&file, b"hello").expect("write file");
        let metadata = fs::symlink_metadata(&file).expect("stat file");

        let entry = Entry::from_metadata("file", &metadata);
        assert_eq!(entry.kind(), FileKind::Regular);
        assert_eq!(entry.size, 5);
        assert_eq!(entry.uid, i64::from(metadata.uid()));
        assert_eq!(entry.mod_time, metadata.mtime());
        assert_eq!(
            entry.identity,
            Some(DevIno::new(metadata.dev(), metadata.ino()))
        );

        let dir_metadata = fs::symlink_metadata(dir.path()).expect("stat dir");
        let dir_entry = Entry::from_metadata("d", &dir_metadata);
        assert!(dir_entry.is_dir());
        assert_eq!(dir_entry.size, 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip_is_byte_exact() {
        let mut entry = Entry::new(vec![b'a', b'/', 0xc3], S_IFREG | 0o640);
        entry.size = 3;
        entry.mod_time = -5;
        entry.uid = 1000;
        entry.gid = -1;
        entry.platform_flags = Some(0x80);
        entry.start_chunk = 7;
        entry.start_offset = 9;
        entry
            .set_attribute("user.a", vec![1, 2, 3])
            .expect("valid name");

        let json = serde_json::to_string(&entry).expect("serialize");
        let back: Entry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, entry);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialization_normalizes_legacy_manifests() {
        let json = r#"{
            "path": [100, 47],
            "size": 0,
            "mod_time": 1,
            "mode": 16877,
            "uid": 0,
            "gid": 0,
            "attributes": {"\u0000lf": [16, 0, 0, 0], "user.x": [1]},
            "start_chunk": 0,
            "start_offset": 0
        }"#;
        let entry: Entry = serde_json::from_str(json).expect("deserialize");
        assert_eq!(entry.path, b"d");
        assert_eq!(entry.platform_flags, Some(0x10));
        assert_eq!(entry.attribute("user.x"), Some(&[1][..]));
        assert!(entry.attribute("\0lf").is_none());
    }
}
