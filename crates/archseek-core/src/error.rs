//! Error types for archseek core operations.
//!
//! This module defines well-structured error types using `thiserror` for
//! library-level errors, while the command-line harness uses `anyhow` for
//! convenient error handling.
//!
//! Only failures to open the archive abort a session. Everything else is
//! scoped to one member, one pattern or one output file and is skipped by
//! the caller after logging.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using ArchseekError
pub type Result<T> = std::result::Result<T, ArchseekError>;

/// Core error types for archseek operations.
#[derive(Error, Debug)]
pub enum ArchseekError {
    // === Archive Errors ===
    /// The archive could not be opened or its directory could not be parsed
    #[error("cannot open archive {path}: {reason}")]
    ArchiveOpen { path: PathBuf, reason: String },

    /// The file is neither a tar (optionally gzip-compressed) nor a zip archive
    #[error("unsupported archive format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// The content of a single member could not be read
    #[error("cannot read member {name}: {reason}")]
    MemberRead { name: String, reason: String },

    // === Search Errors ===
    /// A glob pattern could not be translated into a matcher
    #[error("invalid search pattern: {pattern}: {reason}")]
    PatternCompile { pattern: String, reason: String },

    // === Extraction Errors ===
    /// Writing one extracted file failed
    #[error("cannot write {path}: {reason}")]
    OutputWrite { path: PathBuf, reason: String },

    /// A member name has nothing left after sanitizing, or escapes the output root
    #[error("refusing to extract unsafe member path: {name}")]
    UnsafePath { name: String },

    // === Configuration Errors ===
    /// Configuration file parsing failed
    #[error("configuration error: {reason}")]
    Config { reason: String },

    // === I/O Errors ===
    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Internal Errors ===
    /// Internal error that should not happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl ArchseekError {
    /// Returns true if this error must abort the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ArchseekError::ArchiveOpen { .. } | ArchseekError::UnsupportedFormat { .. }
        )
    }

    /// Returns true if the failing member or file should be skipped and the
    /// batch continued.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            ArchseekError::MemberRead { .. }
                | ArchseekError::OutputWrite { .. }
                | ArchseekError::UnsafePath { .. }
        )
    }

    /// Create an archive-open error
    pub fn archive_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ArchseekError::ArchiveOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a member-read error
    pub fn member_read(name: impl Into<String>, reason: impl ToString) -> Self {
        ArchseekError::MemberRead {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an output-write error
    pub fn output_write(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ArchseekError::OutputWrite {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
