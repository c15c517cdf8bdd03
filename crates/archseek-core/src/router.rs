//! Pattern routing.
//!
//! Before any string matching, a pattern is inspected once to decide how the
//! candidate set can be narrowed:
//!
//! - Wildcard-free patterns are literal paths and go straight to the exact map.
//! - Path markers in the pattern text pick the bucket to search in.
//! - A basename like `foo.sqlite*` is expanded into the database file and its
//!   `-wal` / `-shm` companions.
//! - Literal basename, extension and directory portions allow map lookups.
//!
//! Every decision is a heuristic. A route never fails; at worst it leaves the
//! candidate set at the whole bucket.

use crate::glob::has_wildcards;
use crate::index::{extension_key, marker_buckets, COMPANION_SUFFIXES, PHOTOS_DB_MARKER};
use crate::types::{Bucket, CaseMode};
use serde::Serialize;

/// Primary database extensions recognised by the family expansion.
pub const DB_FAMILY_EXTENSIONS: [&str; 4] = [".db", ".sqlite", ".sqlite3", ".sqlitedb"];

/// Bucket precedence when a pattern carries several markers.
const ROUTE_ORDER: [Bucket; 5] = [
    Bucket::Sandbox,
    Bucket::AppGroup,
    Bucket::Photos,
    Bucket::Biome,
    Bucket::MobileLibrary,
];

/// A database file plus its write-ahead-log and shared-memory companions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbFamily {
    /// Primary basename as written in the pattern (e.g. `foo.db`)
    pub stem: String,
    /// Primary, WAL and SHM basenames, in that order
    pub members: [String; 3],
}

impl DbFamily {
    /// Expand `<name><db-ext>*` into its three concrete basenames.
    pub fn from_basename(base: &str) -> Option<Self> {
        let stem = base.strip_suffix('*')?;
        let lower = stem.to_lowercase();
        if !DB_FAMILY_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            return None;
        }
        Some(DbFamily {
            stem: stem.to_string(),
            members: [
                stem.to_string(),
                format!("{}{}", stem, COMPANION_SUFFIXES[0]),
                format!("{}{}", stem, COMPANION_SUFFIXES[1]),
            ],
        })
    }

    /// Extension keys under which the family members are indexed.
    pub fn extension_keys(&self) -> Vec<String> {
        let mut keys = vec![extension_key(&self.stem).to_string()];
        keys.extend(COMPANION_SUFFIXES.iter().map(|s| s.to_string()));
        keys
    }

    /// Whether the stem itself is wildcard-free
    pub fn is_concrete(&self) -> bool {
        !has_wildcards(&self.stem)
    }
}

/// The outcome of routing a pattern.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// No wildcards: look the folded path up directly
    Exact { folded: String },
    /// Wildcard pattern: narrow, then verify with the compiled glob
    Scoped(ScopedRoute),
}

/// Narrowing decisions for a wildcard pattern.
///
/// All keys are already folded with the session's case mode.
#[derive(Debug, Clone, Serialize)]
pub struct ScopedRoute {
    /// Bucket the search is confined to
    pub bucket: Bucket,

    /// Directory portion of the pattern (before the last `/`)
    pub dir: String,

    /// Basename portion of the pattern (after the last `/`)
    pub base: String,

    /// Directory portion has no wildcards
    pub dir_is_literal: bool,

    /// Basename portion has no wildcards
    pub base_is_literal: bool,

    /// Database family expansion of the basename
    pub family: Option<DbFamily>,

    /// Leading wildcard-free directory segments, when the directory does not
    /// start with a wildcard
    pub literal_dir_prefix: Option<String>,

    /// Extension keys that every match must carry
    pub ext_hints: Vec<String>,
}

/// Classify a pattern into a bucket by the markers in its text.
///
/// Uses the same markers as indexing. When several match, container buckets
/// win over photos, and biome wins over the wider mobile library.
pub fn bucket_for_pattern(pattern: &str) -> Bucket {
    let slashed = format!("/{}", pattern.to_lowercase());
    let mut set = marker_buckets(&slashed);
    if slashed.contains(PHOTOS_DB_MARKER) {
        set.insert(Bucket::Photos);
    }
    ROUTE_ORDER
        .into_iter()
        .find(|b| set.contains(*b))
        .unwrap_or(Bucket::Global)
}

/// Split a pattern into directory and basename at the last `/`.
///
/// Trailing slashes of the directory are dropped unless it is all slashes.
pub fn split_dir_base(pattern: &str) -> (&str, &str) {
    match pattern.rfind('/') {
        Some(idx) => {
            let head = &pattern[..=idx];
            let trimmed = head.trim_end_matches('/');
            let dir = if trimmed.is_empty() { head } else { trimmed };
            (dir, &pattern[idx + 1..])
        }
        None => ("", pattern),
    }
}

/// Join a directory and basename the way the pattern was split.
pub fn join_dir_base(dir: &str, base: &str) -> String {
    if dir.is_empty() {
        base.to_string()
    } else if dir.ends_with('/') {
        format!("{}{}", dir, base)
    } else {
        format!("{}/{}", dir, base)
    }
}

/// Route a pattern.
pub fn route(pattern: &str, case: CaseMode) -> Route {
    if !has_wildcards(pattern) {
        return Route::Exact {
            folded: case.fold(pattern),
        };
    }

    let folded = case.fold(pattern);
    let (dir, base) = split_dir_base(&folded);
    let dir_is_literal = !has_wildcards(dir);
    let base_is_literal = !has_wildcards(base);

    Route::Scoped(ScopedRoute {
        bucket: bucket_for_pattern(pattern),
        dir: dir.to_string(),
        base: base.to_string(),
        dir_is_literal,
        base_is_literal,
        family: DbFamily::from_basename(base),
        literal_dir_prefix: literal_dir_prefix(dir),
        ext_hints: if base_is_literal { Vec::new() } else { extension_hints(base) },
    })
}

/// Wildcard-free leading segments of a directory pattern.
fn literal_dir_prefix(dir: &str) -> Option<String> {
    if dir.is_empty() || !has_wildcards(dir) || dir.starts_with(['*', '?', '[']) {
        return None;
    }
    let literal: Vec<&str> = dir
        .split('/')
        .take_while(|segment| !has_wildcards(segment))
        .collect();
    let prefix = literal.join("/");
    if prefix.is_empty() {
        None
    } else {
        Some(prefix)
    }
}

/// Extension keys implied by a wildcard basename.
///
/// `foo.db*` style names cover the database extension plus both companion
/// suffixes. Otherwise the basename's own extension key is used when that
/// key is wildcard-free.
fn extension_hints(base: &str) -> Vec<String> {
    if let Some(family) = DbFamily::from_basename(base) {
        let keys = family.extension_keys();
        if keys.iter().all(|k| !has_wildcards(k)) {
            return keys;
        }
        return Vec::new();
    }

    let key = extension_key(base);
    if key.is_empty() || has_wildcards(key) {
        return Vec::new();
    }
    // The wildcard must lie before the extension for the key to be certain
    let head = &base[..base.len() - key.len()];
    if head.is_empty() || !has_wildcards(head) {
        return Vec::new();
    }
    vec![key.to_string()]
}
