//! Archive sessions.
//!
//! An [`ArchiveSession`] owns everything derived from one opened archive: the
//! reader, the member index and the memoizing search engine. It is created
//! when the archive is opened and releases the reader on [`close`] or drop,
//! so no index or cache outlives its archive.
//!
//! [`close`]: ArchiveSession::close

use crate::archive::{open_archive_with_buffer, ArchiveReader, ExtractionSummary};
use crate::config::Config;
use crate::error::{ArchseekError, Result};
use crate::index::MemberIndex;
use crate::report::{BucketStat, MatchDetail, PatternSummary, RunReport};
use crate::search::{SearchEngine, SearchHits};
use crate::types::{ArchiveFormat, Bucket, CaseMode};
use chrono::Local;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// One opened archive plus its index and search engine.
pub struct ArchiveSession {
    path: PathBuf,
    format: ArchiveFormat,
    reader: Mutex<Option<Box<dyn ArchiveReader>>>,
    engine: SearchEngine,
    index_time: Duration,
}

impl ArchiveSession {
    /// Open an archive, enumerate it and build the member index.
    ///
    /// Fails only if the archive cannot be opened or listed.
    #[instrument(skip(config), fields(path = %path.display()))]
    pub fn open(path: &Path, config: &Config) -> Result<Self> {
        let mut reader = open_archive_with_buffer(path, config.extraction.buffer_size)?;
        let format = reader.format();
        let members = reader.members()?;

        let start = Instant::now();
        let case = config.search.case_mode;
        let index = if members.len() > config.search.parallel_index_threshold {
            MemberIndex::build_parallel(members, case, rayon::current_num_threads())
        } else {
            MemberIndex::build(members, case)
        };
        let index_time = start.elapsed();

        info!(
            format = %format,
            files = index.len(),
            case = %case,
            index_ms = index_time.as_millis() as u64,
            "Archive session opened"
        );

        Ok(ArchiveSession {
            path: path.to_path_buf(),
            format,
            reader: Mutex::new(Some(reader)),
            engine: SearchEngine::new(Arc::new(index), config.search_options()),
            index_time,
        })
    }

    /// Path of the archive
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Container format
    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Casing discipline of this session
    pub fn case_mode(&self) -> CaseMode {
        self.engine.index().case_mode()
    }

    /// The member index
    pub fn index(&self) -> &MemberIndex {
        self.engine.index()
    }

    /// The search engine
    pub fn engine(&self) -> &SearchEngine {
        &self.engine
    }

    /// Time spent building the index
    pub fn index_time(&self) -> Duration {
        self.index_time
    }

    /// Resolve one pattern.
    pub fn search(&self, pattern: &str) -> SearchHits {
        self.engine.search(pattern)
    }

    /// Search every pattern in order and record timings and hits.
    ///
    /// Only the search itself is timed. Extraction is a separate step.
    #[instrument(skip(self, patterns), fields(patterns = patterns.len()))]
    pub fn run(&self, patterns: &[String]) -> RunReport {
        let started_at = Local::now();
        let start = Instant::now();
        let mut usage = [0u64; Bucket::COUNT];
        let mut summaries = Vec::with_capacity(patterns.len());
        let mut details = Vec::new();

        for (i, pattern) in patterns.iter().enumerate() {
            let pattern_id = i + 1;
            let bucket = self.engine.bucket_for(pattern);
            usage[bucket.index()] += 1;

            let t0 = Instant::now();
            let hits = self.engine.search(pattern);
            let seconds = t0.elapsed().as_secs_f64();

            debug!(
                pattern_id,
                pattern = %pattern,
                bucket = %bucket,
                hits = hits.len(),
                seconds,
                "Pattern searched"
            );

            details.extend(hits.iter().map(|path| MatchDetail {
                pattern_id,
                path: path.clone(),
            }));
            summaries.push(PatternSummary {
                pattern_id,
                pattern: pattern.clone(),
                match_count: hits.len(),
                seconds,
                bucket,
            });
        }

        let stats = self.index().stats();
        let buckets = Bucket::ALL
            .iter()
            .map(|&bucket| BucketStat {
                bucket,
                files: stats.bucket_sizes[bucket.index()],
                patterns: usage[bucket.index()],
            })
            .collect();

        let report = RunReport {
            archive: self.path.clone(),
            format: self.format,
            case_mode: self.case_mode(),
            started_at,
            patterns: summaries,
            details,
            total_seconds: start.elapsed().as_secs_f64(),
            index_seconds: self.index_time.as_secs_f64(),
            indexed_files: stats.regular_files,
            buckets,
            metrics: self.engine.metrics(),
        };

        info!(
            patterns = report.patterns.len(),
            matches = report.total_matches(),
            seconds = report.total_seconds,
            "Run complete"
        );
        report
    }

    /// Extract members by archive path below `out_root`.
    ///
    /// Each path is extracted once. Unknown paths and per-member failures are
    /// reported in the summary; only a closed session is an error.
    #[instrument(skip(self, paths), fields(paths = paths.len(), out = %out_root.display()))]
    pub fn extract(&self, paths: &[String], out_root: &Path) -> Result<ExtractionSummary> {
        let index = self.index();
        let mut summary = ExtractionSummary::default();
        let mut seen = HashSet::with_capacity(paths.len());
        let mut members = Vec::with_capacity(paths.len());

        for path in paths {
            if !seen.insert(path.as_str()) {
                continue;
            }
            match index.lookup_name(path) {
                Some(id) => members.push(index.member(id).clone()),
                None => summary.skip(path, &ArchseekError::member_read(path, "not in archive")),
            }
        }

        let mut guard = self.reader.lock();
        let reader = guard
            .as_mut()
            .ok_or_else(|| ArchseekError::Internal("session already closed".to_string()))?;
        summary.merge(reader.extract_batch(&members, out_root)?);

        info!(
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            "Extraction complete"
        );
        Ok(summary)
    }

    /// Extract every hit of a report.
    pub fn extract_report(&self, report: &RunReport, out_root: &Path) -> Result<ExtractionSummary> {
        let paths: Vec<String> = report.details.iter().map(|d| d.path.clone()).collect();
        self.extract(&paths, out_root)
    }

    /// Release the archive reader. Searching still works; extraction fails.
    pub fn close(&self) {
        if let Some(mut reader) = self.reader.lock().take() {
            reader.close();
            info!(path = %self.path.display(), "Archive session closed");
        }
    }

    /// Check whether the reader has been released
    pub fn is_closed(&self) -> bool {
        self.reader.lock().is_none()
    }
}

impl Drop for ArchiveSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ArchiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSession")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("engine", &self.engine)
            .finish()
    }
}
