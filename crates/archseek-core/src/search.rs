//! Pattern search over a member index.
//!
//! `SearchEngine::search` resolves one glob pattern to the ordered,
//! de-duplicated list of archive paths it matches:
//!
//! 1. Return the memoized result if the pattern was seen this session.
//! 2. Literal patterns are answered from the exact-name map.
//! 3. The pattern's markers pick a bucket; only that bucket is searched.
//! 4. `name.db*` style patterns try the database file and its companions
//!    directly before anything else.
//! 5. Basename, extension and directory maps narrow the bucket further.
//! 6. The compiled glob verifies the remaining candidates.
//!
//! ## Recall
//!
//! Bucket scoping and extension hints trade completeness for speed. A pattern
//! carrying a sandbox marker only ever sees sandbox members, even if an
//! identically named file lives elsewhere in the archive.
//!
//! ## Concurrency
//!
//! The index is immutable and the cache is a `DashMap`, so searches can run
//! from many threads. Two threads resolving the same new pattern both compute
//! the same result; the second insert overwrites with an identical value.

use crate::glob::GlobMatcher;
use crate::index::MemberIndex;
use crate::router::{self, join_dir_base, Route, ScopedRoute};
use crate::types::{Bucket, CaseMode, MemberId};
use dashmap::DashMap;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Resolved paths of one pattern, shared between the cache and callers
pub type SearchHits = Arc<[String]>;

/// How often (in candidates) a cancellable search polls its token
const CANCEL_POLL_INTERVAL: usize = 4096;

/// Search tuning taken from the `[search]` configuration section.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Casing discipline for names and patterns
    pub case: CaseMode,
    /// Literal prefix prepended to both pattern and candidate before matching
    pub match_prefix: String,
    /// Regex program size limit for compiled patterns
    pub regex_size_limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            case: CaseMode::default(),
            match_prefix: "root/".to_string(),
            regex_size_limit: crate::glob::DEFAULT_SIZE_LIMIT,
        }
    }
}

/// Cooperative cancellation flag shared by a batch of searches.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every search holding this token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters describing the work done by an engine.
#[derive(Debug, Default)]
pub struct SearchMetrics {
    /// Patterns resolved from scratch
    pub computed: AtomicU64,
    /// Patterns answered from the cache
    pub cache_hits: AtomicU64,
    /// Candidates tested against a compiled glob
    pub candidates_tested: AtomicU64,
    /// Patterns answered by the database family fast path
    pub family_hits: AtomicU64,
}

/// Plain snapshot of [`SearchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub computed: u64,
    pub cache_hits: u64,
    pub candidates_tested: u64,
    pub family_hits: u64,
}

/// Memoizing pattern search engine over one archive's index.
pub struct SearchEngine {
    index: Arc<MemberIndex>,
    options: SearchOptions,
    cache: DashMap<String, SearchHits>,
    metrics: SearchMetrics,
}

impl SearchEngine {
    /// Create an engine over an index.
    ///
    /// The index's case mode wins over `options.case`, since the index keys
    /// are already folded.
    pub fn new(index: Arc<MemberIndex>, mut options: SearchOptions) -> Self {
        options.case = index.case_mode();
        // Candidates are folded names, so the prefix is compared folded too
        options.match_prefix = options.case.fold(&options.match_prefix);
        SearchEngine {
            index,
            options,
            cache: DashMap::new(),
            metrics: SearchMetrics::default(),
        }
    }

    /// The index searched by this engine
    pub fn index(&self) -> &Arc<MemberIndex> {
        &self.index
    }

    /// Engine options
    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Routing decision for a pattern, for diagnostics.
    pub fn route(&self, pattern: &str) -> Route {
        router::route(pattern, self.options.case)
    }

    /// Number of memoized patterns
    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }

    /// Memoized result of a pattern, if it has been resolved
    pub fn cached(&self, pattern: &str) -> Option<SearchHits> {
        self.cache.get(pattern).map(|hits| Arc::clone(hits.value()))
    }

    /// Current counters
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            computed: self.metrics.computed.load(Ordering::Relaxed),
            cache_hits: self.metrics.cache_hits.load(Ordering::Relaxed),
            candidates_tested: self.metrics.candidates_tested.load(Ordering::Relaxed),
            family_hits: self.metrics.family_hits.load(Ordering::Relaxed),
        }
    }

    /// Resolve a pattern.
    pub fn search(&self, pattern: &str) -> SearchHits {
        self.search_inner(pattern, None)
            .unwrap_or_else(|| Vec::new().into())
    }

    /// Resolve a pattern unless `cancel` fires first.
    ///
    /// A cancelled search returns `None` and leaves no cache entry behind.
    pub fn search_cancellable(&self, pattern: &str, cancel: &CancelToken) -> Option<SearchHits> {
        self.search_inner(pattern, Some(cancel))
    }

    /// Resolve many patterns on the rayon pool.
    ///
    /// Results come back in input order; cancelled patterns are `None`.
    #[instrument(skip(self, patterns, cancel), fields(patterns = patterns.len()))]
    pub fn search_batch(
        &self,
        patterns: &[String],
        cancel: &CancelToken,
    ) -> Vec<Option<SearchHits>> {
        patterns
            .par_iter()
            .map(|p| self.search_cancellable(p, cancel))
            .collect()
    }

    fn search_inner(&self, pattern: &str, cancel: Option<&CancelToken>) -> Option<SearchHits> {
        if let Some(hits) = self.cached(pattern) {
            self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(hits);
        }
        if cancel.map_or(false, CancelToken::is_cancelled) {
            return None;
        }

        let ids = match self.route(pattern) {
            Route::Exact { folded } => self.index.lookup_exact(&folded).into_iter().collect(),
            Route::Scoped(route) => self.resolve_scoped(pattern, &route, cancel)?,
        };

        let hits: SearchHits = self.dedupe_names(ids).into();
        // A concurrent search may have stored this pattern first; keep its value
        let stored = Arc::clone(self.cache.entry(pattern.to_string()).or_insert(hits).value());
        self.metrics.computed.fetch_add(1, Ordering::Relaxed);
        Some(stored)
    }

    fn resolve_scoped(
        &self,
        pattern: &str,
        route: &ScopedRoute,
        cancel: Option<&CancelToken>,
    ) -> Option<Vec<MemberId>> {
        debug!(
            pattern = %pattern,
            bucket = %route.bucket,
            dir_literal = route.dir_is_literal,
            base_literal = route.base_is_literal,
            family = route.family.is_some(),
            "Routing pattern"
        );

        let matcher = GlobMatcher::compile(
            &format!("{}{}", self.options.match_prefix, pattern),
            self.options.case,
            self.options.regex_size_limit,
        );
        if !matcher.is_valid() {
            return Some(Vec::new());
        }

        if let Some(ids) = self.family_fast_path(route, &matcher, cancel)? {
            self.metrics.family_hits.fetch_add(1, Ordering::Relaxed);
            return Some(ids);
        }

        let candidates = self.prefilter(route);
        self.verify(&matcher, candidates, cancel)
    }

    /// Database family shortcut.
    ///
    /// Returns `Some(None)` to fall through to general narrowing and `None`
    /// when cancelled.
    fn family_fast_path(
        &self,
        route: &ScopedRoute,
        matcher: &GlobMatcher,
        cancel: Option<&CancelToken>,
    ) -> Option<Option<Vec<MemberId>>> {
        let family = match &route.family {
            Some(family) if family.is_concrete() => family,
            _ => return Some(None),
        };

        if route.dir_is_literal {
            // Direct existence checks bypass scoping and matching entirely
            let ids: Vec<MemberId> = family
                .members
                .iter()
                .filter_map(|base| self.index.lookup_exact(&join_dir_base(&route.dir, base)))
                .collect();
            if !ids.is_empty() {
                trace!(hits = ids.len(), "Family resolved by exact lookup");
                return Some(Some(ids));
            }
            return Some(None);
        }

        let prefix = route
            .literal_dir_prefix
            .as_ref()
            .map(|p| format!("{}/", p.trim_end_matches('/')));

        let mut hits = Vec::new();
        for base in &family.members {
            let ids = self.index.basename_candidates(base, route.bucket);
            hits.extend(ids.into_iter().filter(|id| match &prefix {
                Some(prefix) => self.index.folded_name(*id).starts_with(prefix.as_str()),
                None => true,
            }));
        }
        if hits.is_empty() {
            return Some(None);
        }

        // A basename hit still has to satisfy the whole pattern
        let verified = self.verify_in_order(matcher, hits, cancel)?;
        if verified.is_empty() {
            Some(None)
        } else {
            Some(Some(verified))
        }
    }

    /// General candidate narrowing within the route's bucket.
    fn prefilter(&self, route: &ScopedRoute) -> Vec<MemberId> {
        let index = &self.index;
        let bucket = route.bucket;

        let mut candidates: Option<Vec<MemberId>> = None;

        if !route.base.is_empty() && route.base_is_literal {
            candidates = Some(index.basename_candidates(&route.base, bucket));
        } else if !route.base.is_empty() && !route.ext_hints.is_empty() {
            let mut ids = index.extension_candidates(&route.ext_hints, bucket);
            ids.extend(index.dotted_candidates(&route.ext_hints, bucket));
            candidates = Some(ids);
        }

        if !route.dir.is_empty() && route.dir_is_literal {
            let prefix = format!("{}/", route.dir.trim_end_matches('/'));
            candidates = Some(match candidates {
                Some(ids) => ids
                    .into_iter()
                    .filter(|id| index.folded_name(*id).starts_with(prefix.as_str()))
                    .collect(),
                None => index.subtree_candidates(&route.dir, bucket),
            });
        }

        match candidates {
            Some(ids) => ids,
            None => index.bucket(bucket).to_vec(),
        }
    }

    /// Verify candidates and return matches in member order.
    fn verify(
        &self,
        matcher: &GlobMatcher,
        mut candidates: Vec<MemberId>,
        cancel: Option<&CancelToken>,
    ) -> Option<Vec<MemberId>> {
        candidates.sort_unstable();
        candidates.dedup();
        self.verify_in_order(matcher, candidates, cancel)
    }

    /// Verify candidates, keeping the order they were given in.
    fn verify_in_order(
        &self,
        matcher: &GlobMatcher,
        candidates: Vec<MemberId>,
        cancel: Option<&CancelToken>,
    ) -> Option<Vec<MemberId>> {
        let prefix = &self.options.match_prefix;
        let mut buf = String::with_capacity(prefix.len() + 128);
        let mut matched = Vec::new();

        for (i, id) in candidates.iter().enumerate() {
            if i % CANCEL_POLL_INTERVAL == 0 && cancel.map_or(false, CancelToken::is_cancelled) {
                debug!("Search cancelled");
                return None;
            }
            buf.clear();
            buf.push_str(prefix);
            buf.push_str(self.index.folded_name(*id));
            if matcher.is_match(&buf) {
                matched.push(*id);
            }
        }

        self.metrics
            .candidates_tested
            .fetch_add(candidates.len() as u64, Ordering::Relaxed);
        Some(matched)
    }

    fn dedupe_names(&self, ids: Vec<MemberId>) -> Vec<String> {
        let mut seen = HashSet::with_capacity(ids.len());
        ids.into_iter()
            .map(|id| self.index.name(id))
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Bucket a pattern is routed to.
    pub fn bucket_for(&self, pattern: &str) -> Bucket {
        router::bucket_for_pattern(pattern)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("index", &self.index)
            .field("cached_patterns", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::{dir_member, member, members};

    fn engine(names: &[&str], case: CaseMode) -> SearchEngine {
        let index = MemberIndex::build(members(names), case);
        SearchEngine::new(Arc::new(index), SearchOptions::default())
    }

    fn hits(engine: &SearchEngine, pattern: &str) -> Vec<String> {
        engine.search(pattern).to_vec()
    }

    const SANDBOX: &str = "private/var/mobile/Containers/Data/Application/ABC";

    #[test]
    fn test_exact_literal() {
        let e = engine(&["a/b/c.db", "a/b/d.db"], CaseMode::Sensitive);
        assert_eq!(hits(&e, "a/b/c.db"), vec!["a/b/c.db"]);
        assert!(hits(&e, "a/b/x.db").is_empty());
        assert!(hits(&e, "a/b").is_empty());
    }

    #[test]
    fn test_exact_literal_case_modes() {
        let names = ["Private/Var/SMS.db"];
        let insensitive = engine(&names, CaseMode::Insensitive);
        assert_eq!(hits(&insensitive, "private/var/sms.db"), vec!["Private/Var/SMS.db"]);

        let sensitive = engine(&names, CaseMode::Sensitive);
        assert!(hits(&sensitive, "private/var/sms.db").is_empty());
        assert_eq!(hits(&sensitive, "Private/Var/SMS.db"), vec!["Private/Var/SMS.db"]);
    }

    #[test]
    fn test_memoization() {
        let e = engine(
            &["x/a.plist", "x/b.plist", "x/c.txt"],
            CaseMode::Insensitive,
        );
        let first = e.search("*.plist");
        let after_first = e.metrics();
        let second = e.search("*.plist");
        let after_second = e.metrics();

        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(after_first.computed, 1);
        assert_eq!(after_second.computed, 1);
        assert_eq!(after_second.cache_hits, 1);
        assert_eq!(after_first.candidates_tested, after_second.candidates_tested);
        assert_eq!(e.cached_patterns(), 1);
    }

    #[test]
    fn test_extension_wildcard() {
        let e = engine(
            &[
                "a/one.plist",
                "a/b/two.PLIST",
                "a/three.plist.bak",
                "a/four.plistx",
                "a/.plist",
                "a/five.txt",
                "six.plist",
            ],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "*.plist"),
            vec!["a/one.plist", "a/b/two.PLIST", "a/.plist", "six.plist"]
        );
    }

    #[test]
    fn test_extension_wildcard_reaches_leading_dot_names() {
        let e = engine(
            &["a/..plist", "a/x.plist", "x/.plist", "b/.plistx", "a/.plist"],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "*.plist"),
            vec!["a/..plist", "a/x.plist", "x/.plist", "a/.plist"]
        );
        assert_eq!(hits(&e, "x*.plist"), vec!["x/.plist"]);
        assert_eq!(hits(&e, "a?.plist"), vec!["a/.plist"]);
        assert_eq!(hits(&e, "a/*.plist"), vec!["a/..plist", "a/x.plist", "a/.plist"]);
    }

    #[test]
    fn test_extension_wildcard_sensitive() {
        let e = engine(&["a/one.plist", "a/two.PLIST"], CaseMode::Sensitive);
        assert_eq!(hits(&e, "*.plist"), vec!["a/one.plist"]);
        assert_eq!(hits(&e, "*.PLIST"), vec!["a/two.PLIST"]);
    }

    #[test]
    fn test_db_family_literal_dir() {
        let e = engine(
            &["dir/sub/file.db-shm", "dir/sub/file.db", "dir/sub/file.db-wal"],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "dir/sub/file.db*"),
            vec!["dir/sub/file.db", "dir/sub/file.db-wal", "dir/sub/file.db-shm"]
        );
        assert_eq!(e.metrics().family_hits, 1);
        assert_eq!(e.metrics().candidates_tested, 0);
    }

    #[test]
    fn test_db_family_primary_only() {
        let e = engine(&["dir/sub/file.db", "dir/sub/other.db-wal"], CaseMode::Insensitive);
        assert_eq!(hits(&e, "dir/sub/file.db*"), vec!["dir/sub/file.db"]);
    }

    #[test]
    fn test_db_family_falls_through_to_glob() {
        // No family member exists, so general narrowing takes over
        let e = engine(&["dir/sub/file.db-journal"], CaseMode::Insensitive);
        assert_eq!(hits(&e, "dir/sub/file.db-*"), vec!["dir/sub/file.db-journal"]);
        assert_eq!(e.metrics().family_hits, 0);
    }

    #[test]
    fn test_db_family_extension_hints_miss_other_suffixes() {
        // The glob would accept both names, but the hints only cover the
        // database extension and its companions
        let e = engine(
            &["dir/sub/file.db.bak", "dir/sub/file.db-journal", "dir/sub/x.db"],
            CaseMode::Insensitive,
        );
        assert!(hits(&e, "dir/sub/file.db*").is_empty());
    }

    #[test]
    fn test_wildcard_stem_skips_family_path() {
        let e = engine(
            &["dir/a.sqlite", "dir/b.sqlite-wal", "dir/c.txt"],
            CaseMode::Insensitive,
        );
        assert_eq!(hits(&e, "dir/*.sqlite*"), vec!["dir/a.sqlite", "dir/b.sqlite-wal"]);
        assert_eq!(e.metrics().family_hits, 0);
    }

    #[test]
    fn test_end_to_end_family_with_wildcard_dir() {
        let e = engine(
            &[
                "root/Containers/Data/Application/ABC/Library/foo.sqlite",
                "root/Containers/Data/Application/ABC/Library/foo.sqlite-wal",
                "root/other/foo.sqlite",
            ],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "**/Library/foo.sqlite*"),
            vec![
                "root/Containers/Data/Application/ABC/Library/foo.sqlite",
                "root/Containers/Data/Application/ABC/Library/foo.sqlite-wal",
            ]
        );
    }

    #[test]
    fn test_family_wildcard_dir_orders_primary_first() {
        let e = engine(
            &[
                "b/Library/foo.db-wal",
                "a/Library/foo.db",
                "c/Library/foo.db-shm",
                "c/Library/foo.db",
            ],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "*/Library/foo.db*"),
            vec![
                "a/Library/foo.db",
                "c/Library/foo.db",
                "b/Library/foo.db-wal",
                "c/Library/foo.db-shm"
            ]
        );
    }

    #[test]
    fn test_family_literal_dir_prefix_filter() {
        let e = engine(
            &["private/var/x/Library/a.db", "other/var/x/Library/a.db"],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "private/var/*/Library/a.db*"),
            vec!["private/var/x/Library/a.db"]
        );
    }

    #[test]
    fn test_order_preserved_not_sorted() {
        let e = engine(
            &["z/a.log", "m/n.txt", "a/b.log", "c/x.txt", "b/c.log"],
            CaseMode::Insensitive,
        );
        assert_eq!(hits(&e, "*.log"), vec!["z/a.log", "a/b.log", "b/c.log"]);
    }

    #[test]
    fn test_literal_basename_wildcard_dir() {
        let e = engine(
            &["a/x/Info.plist", "b/Info.plist", "b/Info.plist.old"],
            CaseMode::Insensitive,
        );
        assert_eq!(hits(&e, "*/x/Info.plist"), vec!["a/x/Info.plist"]);
        assert_eq!(hits(&e, "*/Info.plist"), vec!["a/x/Info.plist", "b/Info.plist"]);
    }

    #[test]
    fn test_literal_dir_wildcard_base_reaches_subdirectories() {
        let e = engine(
            &["a/b/c.txt", "a/b/d/e.txt", "a/bc/f.txt", "x/a/b/g.txt"],
            CaseMode::Insensitive,
        );
        assert_eq!(hits(&e, "a/b/*"), vec!["a/b/c.txt", "a/b/d/e.txt"]);
        assert_eq!(hits(&e, "a/b/*.txt"), vec!["a/b/c.txt", "a/b/d/e.txt"]);
    }

    #[test]
    fn test_sandbox_scoping_under_recall() {
        let sandboxed = format!("{}/Library/Cookies/Cookies.binarycookies", SANDBOX);
        let elsewhere = "private/var/root/Library/Cookies/Cookies.binarycookies";
        let e = engine(&[elsewhere, sandboxed.as_str()], CaseMode::Insensitive);

        // Same basename outside the sandbox is never considered
        let pattern = "*/Containers/Data/Application/*/Cookies.binarycookies";
        assert_eq!(e.bucket_for(pattern), Bucket::Sandbox);
        assert_eq!(hits(&e, pattern), vec![sandboxed.clone()]);

        let unscoped = "*/Cookies.binarycookies";
        assert_eq!(hits(&e, unscoped), vec![elsewhere.to_string(), sandboxed]);
    }

    #[test]
    fn test_photos_scoping_under_recall() {
        let e = engine(
            &[
                "private/var/mobile/Media/PhotoData/Photos.sqlite",
                "private/var/backup/OldPhotos.sqlite",
            ],
            CaseMode::Insensitive,
        );
        let pattern = "*/*Photos.sqlite";

        // The backup file satisfies the glob on its own
        let glob = GlobMatcher::new(&format!("root/{}", pattern), CaseMode::Insensitive).unwrap();
        assert!(glob.matches_raw("root/private/var/backup/OldPhotos.sqlite"));

        // but lies outside the photos bucket the pattern routes to
        assert_eq!(e.bucket_for(pattern), Bucket::Photos);
        assert_eq!(
            hits(&e, pattern),
            vec!["private/var/mobile/Media/PhotoData/Photos.sqlite"]
        );
    }

    #[test]
    fn test_photos_family() {
        let e = engine(
            &[
                "private/var/mobile/Media/PhotoData/Photos.sqlite",
                "private/var/mobile/Media/PhotoData/Photos.sqlite-wal",
                "private/var/mobile/Media/Other/Photos-sqlite",
            ],
            CaseMode::Insensitive,
        );
        assert_eq!(
            hits(&e, "*/Media/PhotoData/Photos.sqlite*"),
            vec![
                "private/var/mobile/Media/PhotoData/Photos.sqlite",
                "private/var/mobile/Media/PhotoData/Photos.sqlite-wal"
            ]
        );
    }

    #[test]
    fn test_duplicate_members_deduplicated() {
        let e = engine(&["a/x.db", "a/y.db", "a/x.db"], CaseMode::Insensitive);
        assert_eq!(hits(&e, "a/*.db"), vec!["a/x.db", "a/y.db"]);
    }

    #[test]
    fn test_directories_never_match() {
        let listing = vec![
            dir_member(0, "a/b/"),
            member(1, "a/b/c.txt"),
            dir_member(2, "a/b/d"),
        ];
        let index = MemberIndex::build(listing, CaseMode::Insensitive);
        let e = SearchEngine::new(Arc::new(index), SearchOptions::default());
        assert_eq!(hits(&e, "a/b*"), vec!["a/b/c.txt"]);
        assert!(hits(&e, "a/b/d").is_empty());
    }

    #[test]
    fn test_invalid_pattern_matches_nothing() {
        let e = engine(&["a/z", "a/[z-a]"], CaseMode::Insensitive);
        assert!(hits(&e, "a/[z-a]").is_empty());
        // Still memoized
        assert!(e.cached("a/[z-a]").is_some());
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let e = engine(&["a/[1].txt", "a/[1.txt"], CaseMode::Insensitive);
        assert_eq!(hits(&e, "a/[1.*"), vec!["a/[1.txt"]);
    }

    #[test]
    fn test_match_prefix_semantics() {
        // The prefix is added to both sides, so patterns anchor at the
        // archive root
        let e = engine(&["x/a.db", "a.db"], CaseMode::Insensitive);
        assert_eq!(hits(&e, "a.d?"), vec!["a.db"]);
        assert_eq!(hits(&e, "*a.d?"), vec!["x/a.db", "a.db"]);
    }

    #[test]
    fn test_match_prefix_is_folded() {
        let options = SearchOptions {
            match_prefix: "ROOT/".to_string(),
            ..SearchOptions::default()
        };
        let index = MemberIndex::build(members(&["a/b.db", "c/d.db"]), CaseMode::Insensitive);
        let e = SearchEngine::new(Arc::new(index), options.clone());
        assert_eq!(e.options().match_prefix, "root/");
        assert_eq!(hits(&e, "a/*.db"), vec!["a/b.db"]);

        let index = MemberIndex::build(members(&["a/b.db"]), CaseMode::Sensitive);
        let e = SearchEngine::new(Arc::new(index), options);
        assert_eq!(e.options().match_prefix, "ROOT/");
        assert_eq!(hits(&e, "a/*.db"), vec!["a/b.db"]);
    }

    #[test]
    fn test_cached_value_never_replaced() {
        let e = engine(&["x/a.plist", "x/b.plist"], CaseMode::Insensitive);
        let patterns = vec!["*.plist".to_string(); 64];
        let results = e.search_batch(&patterns, &CancelToken::new());

        let stored = e.cached("*.plist").unwrap();
        for result in results {
            assert!(Arc::ptr_eq(&result.unwrap(), &stored));
        }
        assert!(Arc::ptr_eq(&e.search("*.plist"), &stored));
        assert_eq!(e.cached_patterns(), 1);
    }

    #[test]
    fn test_case_modes_differ_on_case_sensitive_archive() {
        let names = ["a/Library/Notes.db", "a/library/notes.db"];
        let insensitive = engine(&names, CaseMode::Insensitive);
        let sensitive = engine(&names, CaseMode::Sensitive);

        assert_eq!(hits(&insensitive, "*/Library/*.db"), names.to_vec());
        assert_eq!(hits(&sensitive, "*/Library/*.db"), vec!["a/Library/Notes.db"]);
        assert_eq!(hits(&sensitive, "*/library/notes.db*"), vec!["a/library/notes.db"]);
        assert_eq!(hits(&insensitive, "*/library/notes.db*"), names.to_vec());
    }

    #[test]
    fn test_cancelled_search_leaves_no_cache_entry() {
        let e = engine(&["a.txt", "b.txt"], CaseMode::Insensitive);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(e.search_cancellable("*.txt", &cancel).is_none());
        assert!(e.cached("*.txt").is_none());
        assert_eq!(e.metrics().computed, 0);

        // A cached pattern is still served
        e.search("a.txt");
        assert!(e.search_cancellable("a.txt", &cancel).is_some());
    }

    #[test]
    fn test_search_batch_preserves_order() {
        let e = engine(
            &["a/1.plist", "a/2.db", "a/3.plist", "a/4.db-wal"],
            CaseMode::Insensitive,
        );
        let patterns: Vec<String> = vec!["*.plist".into(), "a/2.db*".into(), "*.txt".into()];
        let results = e.search_batch(&patterns, &CancelToken::new());

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_deref().unwrap(), ["a/1.plist", "a/3.plist"]);
        assert_eq!(results[1].as_deref().unwrap(), ["a/2.db"]);
        assert!(results[2].as_deref().unwrap().is_empty());
        assert_eq!(e.cached_patterns(), 3);
    }

    #[test]
    fn test_concurrent_searches_agree() {
        let names: Vec<String> = (0..2000)
            .map(|i| format!("private/var/mobile/Library/d{}/f{}.plist", i % 13, i))
            .collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let e = Arc::new(engine(&refs, CaseMode::Insensitive));

        let results: Vec<SearchHits> = (0..8)
            .into_par_iter()
            .map(|_| e.search("*/mobile/Library/d3/*.plist"))
            .collect();
        for r in &results {
            assert_eq!(r, &results[0]);
        }
        assert_eq!(e.cached_patterns(), 1);
        assert!(!results[0].is_empty());
    }
}
