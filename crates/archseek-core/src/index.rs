//! One-pass member index over an archive listing.
//!
//! The `MemberIndex` is built once per session from the reader's enumeration
//! and is read-only afterwards. It holds:
//!
//! - The regular-file members in enumeration order (position = `MemberId`)
//! - An exact-name map for literal lookups
//! - Basename, extension and directory maps from key to member ids
//! - Six bucket id lists: five heuristic regions plus every file
//!
//! ## Design Notes
//!
//! - Directories, links and special entries never get an id.
//! - All map keys are folded with the session's [`CaseMode`]; bucket
//!   classification always runs on the lower-cased path.
//! - Id lists are ascending, so concatenating shards in order keeps the
//!   "first occurrence wins" ordering intact.

use crate::types::{ArchiveMember, Bucket, BucketSet, CaseMode, MemberId};
use aho_corasick::AhoCorasick;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Directory markers, matched against `"/" + lowercase(path)`.
const BUCKET_MARKERS: [(&str, Bucket); 5] = [
    ("/containers/data/application/", Bucket::Sandbox),
    ("/containers/shared/appgroup/", Bucket::AppGroup),
    ("/photodata/", Bucket::Photos),
    ("/mobile/library/", Bucket::MobileLibrary),
    ("/biome/streams/", Bucket::Biome),
];

/// Basename prefix that puts a file in the photos bucket wherever it lives.
pub const PHOTOS_DB_MARKER: &str = "photos.sqlite";

/// Suffixes of database companion files, indexed as their own extension.
pub const COMPANION_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

fn marker_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::new(BUCKET_MARKERS.iter().map(|(m, _)| *m))
            .expect("static bucket markers form a valid automaton")
    })
}

/// Buckets whose directory marker occurs in `slashed_lower`.
///
/// `slashed_lower` must be lower-cased and start with `/` so that a marker at
/// the very beginning of an archive path is still found.
pub(crate) fn marker_buckets(slashed_lower: &str) -> BucketSet {
    let mut set = BucketSet::EMPTY;
    for m in marker_matcher().find_overlapping_iter(slashed_lower) {
        set.insert(BUCKET_MARKERS[m.pattern().as_usize()].1);
    }
    set
}

/// Final path component (everything after the last `/`).
pub fn basename(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, base)| base)
}

/// Directory portion (everything before the last `/`), empty for top level.
pub fn dirname(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Extension key of a basename.
///
/// Companion files (`-wal`, `-shm`) use that suffix as their extension.
/// Otherwise this is the text from the last `.` on, ignoring leading dots,
/// so `.plist` has no extension and `a.tar.gz` has `.gz`.
pub fn extension_key(base: &str) -> &str {
    for suffix in COMPANION_SUFFIXES {
        if base.ends_with(suffix) {
            return &base[base.len() - suffix.len()..];
        }
    }
    let stem_start = base.len() - base.trim_start_matches('.').len();
    match base[stem_start..].rfind('.') {
        Some(dot) => &base[stem_start + dot..],
        None => "",
    }
}

/// Statistics gathered while building the index.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexStats {
    /// Entries reported by the archive, of any type
    pub entries_seen: u64,

    /// Regular files that received an id
    pub regular_files: u64,

    /// Directories, links and other non-regular entries
    pub skipped_entries: u64,

    /// Number of files per bucket, in `Bucket::ALL` order
    pub bucket_sizes: [u64; Bucket::COUNT],

    /// Time spent building the index
    #[serde(with = "duration_secs")]
    pub build_time: Duration,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

/// The member index.
pub struct MemberIndex {
    case: CaseMode,

    /// Regular-file members, id = position
    members: Vec<ArchiveMember>,

    /// Folded full path per member
    folded: Vec<String>,

    /// Buckets per member
    member_buckets: Vec<BucketSet>,

    /// Raw name to first id
    by_name: HashMap<String, MemberId>,

    /// Folded name to first id
    exact: HashMap<String, MemberId>,

    basenames: HashMap<String, Vec<MemberId>>,
    extensions: HashMap<String, Vec<MemberId>>,
    directories: HashMap<String, Vec<MemberId>>,

    buckets: [Vec<MemberId>; Bucket::COUNT],

    stats: IndexStats,
}

impl MemberIndex {
    fn empty(case: CaseMode, capacity: usize) -> Self {
        MemberIndex {
            case,
            members: Vec::with_capacity(capacity),
            folded: Vec::with_capacity(capacity),
            member_buckets: Vec::with_capacity(capacity),
            by_name: HashMap::with_capacity(capacity),
            exact: HashMap::with_capacity(capacity),
            basenames: HashMap::new(),
            extensions: HashMap::new(),
            directories: HashMap::new(),
            buckets: Default::default(),
            stats: IndexStats::default(),
        }
    }

    /// Build the index in a single sequential pass.
    #[instrument(skip(members), fields(entries = members.len()))]
    pub fn build(members: Vec<ArchiveMember>, case: CaseMode) -> Self {
        let start = Instant::now();
        let mut index = Self::empty(case, members.len());
        index.stats.entries_seen = members.len() as u64;
        for member in members {
            index.push(member);
        }
        index.finish(start)
    }

    /// Build the index by sharding the listing across the rayon pool.
    ///
    /// Each shard indexes a contiguous slice; shards are merged in order, so
    /// the result is identical to [`build`](Self::build).
    #[instrument(skip(members), fields(entries = members.len()))]
    pub fn build_parallel(members: Vec<ArchiveMember>, case: CaseMode, shards: usize) -> Self {
        let start = Instant::now();
        let entries_seen = members.len() as u64;
        let shard_len = members.len().div_ceil(shards.max(1)).max(1);

        let mut chunks: Vec<Vec<ArchiveMember>> = Vec::new();
        let mut rest = members;
        while rest.len() > shard_len {
            let tail = rest.split_off(shard_len);
            chunks.push(rest);
            rest = tail;
        }
        chunks.push(rest);

        debug!(shards = chunks.len(), shard_len, "Indexing shards");

        let parts: Vec<MemberIndex> = chunks
            .into_par_iter()
            .map(|chunk| {
                let mut part = Self::empty(case, chunk.len());
                for member in chunk {
                    part.push(member);
                }
                part
            })
            .collect();

        let mut index = Self::empty(case, entries_seen as usize);
        for part in parts {
            index.merge(part);
        }
        index.stats.entries_seen = entries_seen;
        index.finish(start)
    }

    fn push(&mut self, member: ArchiveMember) {
        if !member.is_file {
            self.stats.skipped_entries += 1;
            return;
        }

        let id = MemberId(self.members.len() as u32);
        let lower = member.name.to_lowercase();
        let folded = match self.case {
            CaseMode::Insensitive => lower.clone(),
            CaseMode::Sensitive => member.name.clone(),
        };

        let base = basename(&folded);
        self.basenames.entry(base.to_string()).or_default().push(id);
        self.extensions
            .entry(extension_key(base).to_string())
            .or_default()
            .push(id);
        self.directories
            .entry(dirname(&folded).to_string())
            .or_default()
            .push(id);

        self.by_name.entry(member.name.clone()).or_insert(id);
        self.exact.entry(folded.clone()).or_insert(id);

        let mut set = marker_buckets(&format!("/{}", lower));
        if basename(&lower).starts_with(PHOTOS_DB_MARKER) {
            set.insert(Bucket::Photos);
        }
        set.insert(Bucket::Global);
        for bucket in set.iter() {
            self.buckets[bucket.index()].push(id);
        }

        self.members.push(member);
        self.folded.push(folded);
        self.member_buckets.push(set);
    }

    /// Append a shard built from the members that follow this index's own.
    fn merge(&mut self, part: MemberIndex) {
        let offset = self.members.len() as u32;
        let shift = |ids: Vec<MemberId>| ids.into_iter().map(move |id| MemberId(id.0 + offset));

        for (key, ids) in part.basenames {
            self.basenames.entry(key).or_default().extend(shift(ids));
        }
        for (key, ids) in part.extensions {
            self.extensions.entry(key).or_default().extend(shift(ids));
        }
        for (key, ids) in part.directories {
            self.directories.entry(key).or_default().extend(shift(ids));
        }
        for (name, id) in part.by_name {
            self.by_name.entry(name).or_insert(MemberId(id.0 + offset));
        }
        for (name, id) in part.exact {
            self.exact.entry(name).or_insert(MemberId(id.0 + offset));
        }
        for (target, ids) in self.buckets.iter_mut().zip(part.buckets) {
            target.extend(shift(ids));
        }

        self.members.extend(part.members);
        self.folded.extend(part.folded);
        self.member_buckets.extend(part.member_buckets);
        self.stats.skipped_entries += part.stats.skipped_entries;
    }

    fn finish(mut self, start: Instant) -> Self {
        self.stats.regular_files = self.members.len() as u64;
        for bucket in Bucket::ALL {
            self.stats.bucket_sizes[bucket.index()] = self.buckets[bucket.index()].len() as u64;
        }
        self.stats.build_time = start.elapsed();

        info!(
            files = self.stats.regular_files,
            skipped = self.stats.skipped_entries,
            sandbox = self.stats.bucket_sizes[Bucket::Sandbox.index()],
            mobile_lib = self.stats.bucket_sizes[Bucket::MobileLibrary.index()],
            elapsed_ms = self.stats.build_time.as_millis() as u64,
            "Member index built"
        );
        self
    }

    /// Casing discipline of the index keys
    pub fn case_mode(&self) -> CaseMode {
        self.case
    }

    /// Number of regular-file members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the archive held no regular files
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Build statistics
    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }

    /// Member by id
    pub fn member(&self, id: MemberId) -> &ArchiveMember {
        &self.members[id.as_usize()]
    }

    /// All members in id order
    pub fn members(&self) -> &[ArchiveMember] {
        &self.members
    }

    /// Archive name of a member
    pub fn name(&self, id: MemberId) -> &str {
        &self.members[id.as_usize()].name
    }

    /// Folded name of a member
    pub fn folded_name(&self, id: MemberId) -> &str {
        &self.folded[id.as_usize()]
    }

    /// Check whether a member lies inside a bucket
    pub fn in_bucket(&self, id: MemberId, bucket: Bucket) -> bool {
        self.member_buckets[id.as_usize()].contains(bucket)
    }

    /// Ids of a bucket, ascending
    pub fn bucket(&self, bucket: Bucket) -> &[MemberId] {
        &self.buckets[bucket.index()]
    }

    /// First member with exactly this folded path.
    pub fn lookup_exact(&self, folded: &str) -> Option<MemberId> {
        self.exact.get(folded).copied()
    }

    /// First member stored under this archive name, compared verbatim.
    pub fn lookup_name(&self, name: &str) -> Option<MemberId> {
        self.by_name.get(name).copied()
    }

    /// Members with this folded basename that lie inside `scope`.
    pub fn basename_candidates(&self, base: &str, scope: Bucket) -> Vec<MemberId> {
        self.scoped(self.basenames.get(base), scope)
    }

    /// Members with any of these extension keys that lie inside `scope`,
    /// grouped by key in the order given.
    pub fn extension_candidates(&self, exts: &[String], scope: Bucket) -> Vec<MemberId> {
        exts.iter()
            .flat_map(|ext| self.scoped(self.extensions.get(ext.as_str()), scope))
            .collect()
    }

    /// Extensionless members inside `scope` whose folded basename ends with
    /// one of these keys, ascending.
    ///
    /// A name made only of leading dots and a key (`.plist`, `..plist`) has
    /// no extension key, so `extension_candidates` never returns it.
    pub fn dotted_candidates(&self, exts: &[String], scope: Bucket) -> Vec<MemberId> {
        self.scoped(self.extensions.get(""), scope)
            .into_iter()
            .filter(|id| {
                let base = basename(self.folded_name(*id));
                exts.iter().any(|ext| base.ends_with(ext.as_str()))
            })
            .collect()
    }

    /// Members anywhere under a folded directory prefix that lie inside
    /// `scope`, ascending.
    pub fn subtree_candidates(&self, dir: &str, scope: Bucket) -> Vec<MemberId> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let root = &prefix[..prefix.len() - 1];
        let mut ids: Vec<MemberId> = self
            .directories
            .iter()
            .filter(|(key, _)| key.as_str() == root || key.starts_with(&prefix))
            .flat_map(|(_, ids)| ids.iter().copied())
            .filter(|id| self.in_bucket(*id, scope))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of distinct directories holding files
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }

    fn scoped(&self, ids: Option<&Vec<MemberId>>, scope: Bucket) -> Vec<MemberId> {
        match ids {
            Some(ids) if scope == Bucket::Global => ids.clone(),
            Some(ids) => ids
                .iter()
                .copied()
                .filter(|id| self.in_bucket(*id, scope))
                .collect(),
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for MemberIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemberIndex")
            .field("case", &self.case)
            .field("members", &self.members.len())
            .field("directories", &self.directories.len())
            .finish()
    }
}
