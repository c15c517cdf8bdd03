//! Run reports.
//!
//! A [`RunReport`] records what one batch of patterns found: a summary row
//! per pattern occurrence, a detail row per hit, timings and bucket
//! statistics. Reports are written as CSV (`csv`), JSON (`serde_json`) and a
//! plain-text summary.

use crate::error::{ArchseekError, Result};
use crate::search::MetricsSnapshot;
use crate::types::{ArchiveFormat, Bucket, CaseMode};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write as _};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the per-pattern summary CSV
pub const SUMMARY_CSV: &str = "match_summary.csv";
/// File name of the per-hit detail CSV
pub const DETAIL_CSV: &str = "match_detail.csv";
/// File name of the plain-text statistics
pub const STATS_TXT: &str = "stats.txt";
/// File name of the JSON report
pub const REPORT_JSON: &str = "report.json";

/// One pattern occurrence of a run.
#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    /// 1-based position of the pattern in the run
    pub pattern_id: usize,
    pub pattern: String,
    pub match_count: usize,
    /// Search time, excluding extraction
    pub seconds: f64,
    /// Bucket the pattern was routed to
    pub bucket: Bucket,
}

/// One hit of one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchDetail {
    pub pattern_id: usize,
    pub path: String,
}

/// Size and usage of one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketStat {
    pub bucket: Bucket,
    /// Files in the bucket
    pub files: u64,
    /// Patterns routed to the bucket
    pub patterns: u64,
}

/// Results of one batch of patterns against one archive.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub archive: PathBuf,
    pub format: ArchiveFormat,
    pub case_mode: CaseMode,
    pub started_at: DateTime<Local>,

    pub patterns: Vec<PatternSummary>,
    pub details: Vec<MatchDetail>,

    /// Wall time of the whole batch
    pub total_seconds: f64,
    /// Time spent building the member index
    pub index_seconds: f64,
    /// Regular files in the index
    pub indexed_files: u64,

    /// Per-bucket statistics in `Bucket::ALL` order
    pub buckets: Vec<BucketStat>,

    pub metrics: MetricsSnapshot,
}

impl RunReport {
    /// Total hits over all pattern occurrences
    pub fn total_matches(&self) -> usize {
        self.patterns.iter().map(|p| p.match_count).sum()
    }

    /// Write `pattern_id,pattern,match_count,seconds` rows.
    pub fn write_summary_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv_writer(path)?;
        let err = |e: csv::Error| ArchseekError::output_write(path, e);

        writer
            .write_record(["pattern_id", "pattern", "match_count", "seconds"])
            .map_err(err)?;
        for row in &self.patterns {
            writer
                .write_record([
                    row.pattern_id.to_string(),
                    row.pattern.clone(),
                    row.match_count.to_string(),
                    format!("{:.6}", row.seconds),
                ])
                .map_err(err)?;
        }
        writer
            .flush()
            .map_err(|e| ArchseekError::output_write(path, e))
    }

    /// Write `pattern_id,file_path` rows in result order.
    pub fn write_detail_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv_writer(path)?;
        let err = |e: csv::Error| ArchseekError::output_write(path, e);

        writer
            .write_record(["pattern_id", "file_path"])
            .map_err(err)?;
        for row in &self.details {
            writer
                .write_record([row.pattern_id.to_string().as_str(), row.path.as_str()])
                .map_err(err)?;
        }
        writer
            .flush()
            .map_err(|e| ArchseekError::output_write(path, e))
    }

    /// Write the whole report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| ArchseekError::output_write(path, e))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, self)
            .map_err(|e| ArchseekError::output_write(path, e))?;
        out.flush().map_err(|e| ArchseekError::output_write(path, e))
    }

    /// Human-readable summary with bucket sizes and usage percentages.
    pub fn stats_text(&self) -> String {
        let mut s = String::new();
        let total_patterns = self.patterns.len() as u64;

        let _ = writeln!(s, "=== archseek summary ===");
        let _ = writeln!(s, "Input file        : {}", self.archive.display());
        let _ = writeln!(s, "Format            : {}", self.format);
        let _ = writeln!(s, "Case mode         : {}", self.case_mode);
        let _ = writeln!(s, "Started           : {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(s, "Patterns searched : {}", total_patterns);
        let _ = writeln!(s, "Total matches     : {}", self.total_matches());
        let _ = writeln!(s, "Total time        : {:.3}s", self.total_seconds);
        let _ = writeln!(s, "Index build time  : {:.3}s", self.index_seconds);
        let _ = writeln!(
            s,
            "Cache hits        : {} of {} searches",
            self.metrics.cache_hits,
            self.metrics.cache_hits + self.metrics.computed
        );

        let _ = writeln!(s, "\n--- Bucket Stats ---");
        let _ = writeln!(s, "Total files indexed: {}", self.indexed_files);
        for stat in &self.buckets {
            let _ = writeln!(
                s,
                "- {:<12}: {:>8} files ({:.2}%)",
                stat.bucket.name(),
                stat.files,
                percent(stat.files, self.indexed_files)
            );
        }

        let _ = writeln!(s, "\n--- Bucket Usage (by pattern) ---");
        for stat in &self.buckets {
            let _ = writeln!(
                s,
                "- {:<12}: {:>8} patterns ({:.2}%)",
                stat.bucket.name(),
                stat.patterns,
                percent(stat.patterns, total_patterns)
            );
        }
        s
    }

    /// Write the configured outputs into `dir`, returning the files written.
    pub fn write_all(&self, dir: &Path, with_csv: bool, with_json: bool) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| ArchseekError::output_write(dir, e))?;
        let mut written = Vec::new();

        if with_csv {
            let summary = dir.join(SUMMARY_CSV);
            self.write_summary_csv(&summary)?;
            written.push(summary);

            let detail = dir.join(DETAIL_CSV);
            self.write_detail_csv(&detail)?;
            written.push(detail);
        }
        if with_json {
            let report = dir.join(REPORT_JSON);
            self.write_json(&report)?;
            written.push(report);
        }

        let stats = dir.join(STATS_TXT);
        fs::write(&stats, self.stats_text()).map_err(|e| ArchseekError::output_write(&stats, e))?;
        written.push(stats);

        info!(dir = %dir.display(), files = written.len(), "Report written");
        Ok(written)
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    csv::Writer::from_path(path).map_err(|e| ArchseekError::output_write(path, e))
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
