use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The broad shape of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Regular,
    Directory,
    Other,
}

/// A per-file metadata record with identity, size, mtime, checksum and
/// existence. Two entries compare equal (and hash equal) by relative path
/// alone, matching `FileSystemObject`'s identity in the source tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub relative_path: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
    pub exists: bool,
    pub checksum: Option<String>,
    pub hidden: bool,
}

impl Entry {
    pub fn new(relative_path: impl Into<String>, kind: EntryKind) -> Self {
        Entry {
            relative_path: relative_path.into(),
            kind,
            size: None,
            mtime: None,
            exists: true,
            checksum: None,
            hidden: false,
        }
    }

    /// Builds the non-existing placeholder used when a path is missing on
    /// one side of a comparison, so both sides of a pair can carry an entry.
    pub fn missing(relative_path: impl Into<String>) -> Self {
        Entry {
            relative_path: relative_path.into(),
            kind: EntryKind::Other,
            size: None,
            mtime: None,
            exists: false,
            checksum: None,
            hidden: false,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.relative_path == other.relative_path
    }
}
impl Eq for Entry {}

impl std::hash::Hash for Entry {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.relative_path.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_with_same_path_are_equal_regardless_of_metadata() {
        let mut a = Entry::new("a/b", EntryKind::Regular);
        a.size = Some(1);
        let mut b = Entry::new("a/b", EntryKind::Regular);
        b.size = Some(2);
        assert_eq!(a, b);
    }

    #[test]
    fn missing_entry_does_not_exist() {
        let e = Entry::missing("gone.txt");
        assert!(!e.exists);
        assert!(e.size.is_none());
    }

    #[test]
    fn name_is_final_component() {
        let e = Entry::new("a/b/c.txt", EntryKind::Regular);
        assert_eq!(e.name(), "c.txt");
    }
}
