//! Core data types for archseek.
//!
//! This module defines the fundamental data structures shared by the archive
//! readers, the member index and the search engine:
//!
//! - **Members**: one entry of the container archive and its extraction handle
//! - **Buckets**: the heuristic regions used to scope searches
//! - **Case folding**: the single casing discipline applied to names and patterns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable position of a regular-file member in the index.
///
/// Ids follow archive enumeration order, so sorting ids restores the order in
/// which members appear in the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberId(pub u32);

impl MemberId {
    /// Create a new member id
    pub fn new(id: u32) -> Self {
        MemberId(id)
    }

    /// Get the id as a vector index
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Container format of an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// Uncompressed tape archive
    Tar,
    /// Gzip-compressed tape archive
    TarGz,
    /// Zip archive
    Zip,
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveFormat::Tar => write!(f, "tar"),
            ArchiveFormat::TarGz => write!(f, "tar.gz"),
            ArchiveFormat::Zip => write!(f, "zip"),
        }
    }
}

/// Opaque locator a reader uses to find a member's bytes again.
///
/// Only the reader that produced a handle knows how to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHandle {
    /// Position of the entry in the archive's own enumeration
    pub(crate) ordinal: usize,
    /// Byte offset of the entry data, when the container allows seeking to it
    pub(crate) data_offset: Option<u64>,
    /// Uncompressed size of the entry data
    pub(crate) size: u64,
}

impl EntryHandle {
    pub(crate) fn new(ordinal: usize, data_offset: Option<u64>, size: u64) -> Self {
        EntryHandle {
            ordinal,
            data_offset,
            size,
        }
    }

    /// Uncompressed size of the member in bytes
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// One entry of a container archive.
///
/// Created during enumeration and never modified afterwards.
#[derive(Debug, Clone)]
pub struct ArchiveMember {
    /// Archive-relative path, `/` separated, exactly as stored in the archive
    pub name: String,

    /// True for regular files; directories, links and special files are false
    pub is_file: bool,

    /// Reader-specific extraction handle
    pub handle: EntryHandle,
}

impl ArchiveMember {
    pub fn new(name: impl Into<String>, is_file: bool, handle: EntryHandle) -> Self {
        ArchiveMember {
            name: name.into(),
            is_file,
            handle,
        }
    }
}

/// Casing discipline applied uniformly to member names and patterns.
///
/// Archives extracted from case-insensitive filesystems usually want
/// `Insensitive`; archives of case-sensitive volumes can hold names differing
/// only in case, which `Sensitive` keeps apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseMode {
    /// Lower-case names and patterns before any comparison
    #[default]
    Insensitive,
    /// Compare names and patterns exactly as written
    Sensitive,
}

impl CaseMode {
    /// Fold a name or pattern according to this mode.
    pub fn fold(&self, s: &str) -> String {
        match self {
            CaseMode::Insensitive => s.to_lowercase(),
            CaseMode::Sensitive => s.to_string(),
        }
    }
}

impl fmt::Display for CaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaseMode::Insensitive => write!(f, "insensitive"),
            CaseMode::Sensitive => write!(f, "sensitive"),
        }
    }
}

impl FromStr for CaseMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insensitive" | "fold" | "lower" => Ok(CaseMode::Insensitive),
            "sensitive" | "exact" => Ok(CaseMode::Sensitive),
            _ => Err(format!("Unknown case mode: {}", s)),
        }
    }
}

/// Heuristic region of an iOS-style full file system archive.
///
/// Every regular file is in `Global`; the other buckets are overlapping
/// subsets selected by path markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Per-app sandbox containers (`/Containers/Data/Application/`)
    Sandbox,
    /// Shared app-group containers (`/Containers/Shared/AppGroup/`)
    #[serde(rename = "appgroup")]
    AppGroup,
    /// Photo library storage (`/PhotoData/`, `Photos.sqlite*`)
    Photos,
    /// The mobile user's library tree (`/mobile/Library/`)
    #[serde(rename = "mobile_lib")]
    MobileLibrary,
    /// Biome event streams (`/Biome/streams/`)
    Biome,
    /// Every regular file
    Global,
}

impl Bucket {
    /// Number of buckets
    pub const COUNT: usize = 6;

    /// All buckets in reporting order
    pub const ALL: [Bucket; Bucket::COUNT] = [
        Bucket::Sandbox,
        Bucket::AppGroup,
        Bucket::Photos,
        Bucket::MobileLibrary,
        Bucket::Biome,
        Bucket::Global,
    ];

    /// Dense index used for per-bucket arrays and bit sets
    pub fn index(&self) -> usize {
        match self {
            Bucket::Sandbox => 0,
            Bucket::AppGroup => 1,
            Bucket::Photos => 2,
            Bucket::MobileLibrary => 3,
            Bucket::Biome => 4,
            Bucket::Global => 5,
        }
    }

    /// Short name used in reports
    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Sandbox => "sandbox",
            Bucket::AppGroup => "appgroup",
            Bucket::Photos => "photos",
            Bucket::MobileLibrary => "mobile_lib",
            Bucket::Biome => "biome",
            Bucket::Global => "global",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of buckets a member belongs to, one bit per bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BucketSet(u8);

impl BucketSet {
    /// Empty set
    pub const EMPTY: BucketSet = BucketSet(0);

    /// Add a bucket to the set
    pub fn insert(&mut self, bucket: Bucket) {
        self.0 |= 1 << bucket.index();
    }

    /// Check membership
    pub fn contains(&self, bucket: Bucket) -> bool {
        self.0 & (1 << bucket.index()) != 0
    }

    /// Iterate over the buckets in the set, in reporting order
    pub fn iter(&self) -> impl Iterator<Item = Bucket> + '_ {
        Bucket::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_mode_fold() {
        assert_eq!(CaseMode::Insensitive.fold("Library/Foo.DB"), "library/foo.db");
        assert_eq!(CaseMode::Sensitive.fold("Library/Foo.DB"), "Library/Foo.DB");
    }

    #[test]
    fn test_case_mode_parse() {
        assert_eq!("sensitive".parse::<CaseMode>(), Ok(CaseMode::Sensitive));
        assert_eq!("Insensitive".parse::<CaseMode>(), Ok(CaseMode::Insensitive));
        assert!("upper".parse::<CaseMode>().is_err());
    }

    #[test]
    fn test_bucket_indices_are_dense() {
        for (i, bucket) in Bucket::ALL.iter().enumerate() {
            assert_eq!(bucket.index(), i);
        }
    }

    #[test]
    fn test_bucket_set() {
        let mut set = BucketSet::EMPTY;
        set.insert(Bucket::MobileLibrary);
        set.insert(Bucket::Global);

        assert!(set.contains(Bucket::Global));
        assert!(set.contains(Bucket::MobileLibrary));
        assert!(!set.contains(Bucket::Sandbox));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Bucket::MobileLibrary, Bucket::Global]
        );
    }

    #[test]
    fn test_member_id() {
        let id = MemberId::new(42);
        assert_eq!(id.as_usize(), 42);
        assert_eq!(format!("{}", id), "42");
        assert!(MemberId::new(3) < MemberId::new(9));
    }
}
