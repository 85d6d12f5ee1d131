//! Tree entry kinds.
//!
//! The set of kinds is fixed by the object format, so it is a closed enum.
//! Mapping through `EntryKind` also canonicalizes file modes in the
//! directories the filter rebuilds: the obsolete group-writable blob mode
//! (100664) is written back as 100644.

use git2::FileMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Tree,
    Blob,
    Executable,
    Symlink,
    Submodule,
}

impl EntryKind {
    pub fn from_filemode(mode: i32) -> Option<Self> {
        match mode {
            0o040000 => Some(EntryKind::Tree),
            0o100644 | 0o100664 => Some(EntryKind::Blob),
            0o100755 => Some(EntryKind::Executable),
            0o120000 => Some(EntryKind::Symlink),
            0o160000 => Some(EntryKind::Submodule),
            _ => None,
        }
    }

    pub fn filemode(self) -> i32 {
        let mode = match self {
            EntryKind::Tree => FileMode::Tree,
            EntryKind::Blob => FileMode::Blob,
            EntryKind::Executable => FileMode::BlobExecutable,
            EntryKind::Symlink => FileMode::Link,
            EntryKind::Submodule => FileMode::Commit,
        };
        i32::from(mode)
    }

    pub fn is_tree(self) -> bool {
        self == EntryKind::Tree
    }
}
