//! # archseek Core Library
//!
//! This crate locates files inside large forensic container archives (tar,
//! gzip-compressed tar, zip) by glob pattern, without scanning the whole
//! member list for every pattern.
//!
//! ## Architecture
//!
//! - **Archive** (`archive`): Container readers behind one trait, plus safe extraction
//! - **Types** (`types`): Members, buckets and the case-folding discipline
//! - **Index** (`index`): One-pass member index with lookup maps and buckets
//! - **Glob** (`glob`): Glob-to-regex compiler
//! - **Router** (`router`): Per-pattern narrowing decisions
//! - **Search** (`search`): Memoizing search engine
//! - **Session** (`session`): Archive lifetime, runs and extraction
//! - **Report** (`report`): CSV, JSON and text run reports
//! - **Config** (`config`): Configuration management
//!
//! ## Example
//!
//! ```rust,ignore
//! use archseek_core::{ArchiveSession, Config};
//!
//! let session = ArchiveSession::open("ffs.tar".as_ref(), &Config::default())?;
//! for path in session.search("*/mobile/Library/SMS/sms.db*").iter() {
//!     println!("{}", path);
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod glob;
pub mod index;
pub mod patterns;
pub mod report;
pub mod router;
pub mod search;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use archive::{open_archive, ArchiveReader, ExtractionSummary};
pub use config::Config;
pub use error::{ArchseekError, Result};
pub use glob::GlobMatcher;
pub use index::{IndexStats, MemberIndex};
pub use patterns::load_patterns;
pub use report::{MatchDetail, PatternSummary, RunReport};
pub use router::Route;
pub use search::{CancelToken, SearchEngine, SearchHits, SearchOptions};
pub use session::ArchiveSession;
pub use types::{ArchiveFormat, ArchiveMember, Bucket, CaseMode, MemberId};
