use std::collections::BTreeMap;

use crate::date::SvnDate;

/// A set of named properties, ordered by name.
pub type PropertyList = BTreeMap<String, Vec<u8>>;

/// One property change; `value: None` deletes the property.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PropDelta {
    pub name: String,
    pub value: Option<Vec<u8>>,
}

/// One revision in a file's history.
///
/// `content` carries the file's full text as of this revision when the
/// content changed; `None` marks a revision where only metadata changed
/// (a property-only commit), for which no text is sent.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileRevision {
    pub path: String,
    pub rev: u64,
    pub author: Option<String>,
    pub date: Option<SvnDate>,
    pub log: Option<String>,
    pub rev_props: PropertyList,
    pub prop_deltas: Vec<PropDelta>,
    pub merged_revision: bool,
    pub content: Option<Vec<u8>>,
}

impl FileRevision {
    pub fn new(rev: u64, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            rev,
            ..Self::default()
        }
    }
}

/// A file's history, keyed by revision number.
///
/// Iteration order is ascending by revision, which is the order the records
/// go out on the wire.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default)]
pub struct FileRevHistory {
    revs: BTreeMap<u64, FileRevision>,
}

impl FileRevHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a revision, replacing any existing record for the same number.
    pub fn insert(&mut self, rev: FileRevision) {
        self.revs.insert(rev.rev, rev);
    }

    pub fn get(&self, rev: u64) -> Option<&FileRevision> {
        self.revs.get(&rev)
    }

    pub fn len(&self) -> usize {
        self.revs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileRevision> {
        self.revs.values()
    }
}

impl FromIterator<FileRevision> for FileRevHistory {
    fn from_iter<T: IntoIterator<Item = FileRevision>>(iter: T) -> Self {
        let mut history = Self::new();
        for rev in iter {
            history.insert(rev);
        }
        history
    }
}
