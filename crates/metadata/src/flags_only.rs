use crate::attributes::AttributeProvider;
use crate::error::MetadataError;
use std::fs;
use std::io;
use std::path::Path;

/// Reserved name under which the flag word is readable and writable.
pub const FLAGS_PSEUDO_ATTRIBUTE: &str = "\0B";

/// Provider for platforms with a flag word but no attribute namespace.
///
/// `list` is always empty. [`FLAGS_PSEUDO_ATTRIBUTE`] reads and writes the
/// `st_flags` word as four little-endian bytes; every other name is an empty
/// no-op.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagsOnlyAttributes;

impl AttributeProvider for FlagsOnlyAttributes {
    fn list(&self, _target: &Path) -> Result<Vec<String>, MetadataError> {
        Ok(Vec::new())
    }

    fn get(&self, target: &Path, name: &str) -> Result<Option<Vec<u8>>, MetadataError> {
        if name != FLAGS_PSEUDO_ATTRIBUTE {
            return Ok(None);
        }
        let metadata = fs::symlink_metadata(target)
            .map_err(|error| MetadataError::new("read flags", target, error))?;
        let flags = platform::flags::stat_flags(&metadata);
        Ok((flags != 0).then(|| flags.to_le_bytes().to_vec()))
    }

    fn set(&self, target: &Path, name: &str, value: &[u8]) -> Result<(), MetadataError> {
        if name != FLAGS_PSEUDO_ATTRIBUTE {
            return Ok(());
        }
        let word = <[u8; 4]>::try_from(value).map_err(|_| {
            MetadataError::new(
                "write flags",
                target,
                io::Error::new(io::ErrorKind::InvalidInput, "flag word must be four bytes"),
            )
        })?;
        platform::flags::lchflags(target, u32::from_le_bytes(word))
            .map_err(|error| MetadataError::new("write flags", target, error))
    }

    fn remove(&self, target: &Path, name: &str) -> Result<(), MetadataError> {
        if name != FLAGS_PSEUDO_ATTRIBUTE {
            return Ok(());
        }
        platform::flags::lchflags(target, 0)
            .map_err(|error| MetadataError::new("clear flags", target, error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::bsd::UF_NODUMP;

    #[test]
    fn flag_word_is_read_and_written_through_the_reserved_name() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"x").expect("write file");
        let provider = FlagsOnlyAttributes;

        assert_eq!(provider.get(&path, FLAGS_PSEUDO_ATTRIBUTE).expect("get"), None);
        provider
            .set(&path, FLAGS_PSEUDO_ATTRIBUTE, &UF_NODUMP.to_le_bytes())
            .expect("set nodump");
        assert_eq!(
            provider.get(&path, FLAGS_PSEUDO_ATTRIBUTE).expect("get"),
            Some(UF_NODUMP.to_le_bytes().to_vec())
        );
        assert!(provider.list(&path).expect("list").is_empty());

        provider.remove(&path, FLAGS_PSEUDO_ATTRIBUTE).expect("clear");
        assert_eq!(provider.get(&path, FLAGS_PSEUDO_ATTRIBUTE).expect("get"), None);
    }

    #[test]
    fn other_names_are_empty_no_ops() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"x").expect("write file");
        let provider = FlagsOnlyAttributes;

        provider.set(&path, "user.tag", b"v").expect("ignored set");
        provider.remove(&path, "user.tag").expect("ignored remove");
        assert_eq!(provider.get(&path, "user.tag").expect("get"), None);
    }

    #[test]
    fn malformed_flag_word_is_rejected() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("f");
        fs::write(&path, b"x").expect("write file");

        let error = FlagsOnlyAttributes
            .set(&path, FLAGS_PSEUDO_ATTRIBUTE, &[1, 2])
            .unwrap_err();
        assert_eq!(error.source_error().kind(), io::ErrorKind::InvalidInput);
    }
}
