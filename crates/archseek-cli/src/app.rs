//! Application state management.

use archseek_core::{ArchiveSession, CaseMode, Config};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

/// Shared application state.
pub struct App {
    /// Configuration
    pub config: Config,

    /// Only errors are printed
    pub quiet: bool,
}

impl App {
    /// Create a new application instance.
    pub fn new(config: Config, quiet: bool) -> Self {
        App { config, quiet }
    }

    /// Force case-sensitive matching regardless of the configuration.
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        if case_sensitive {
            self.config.search.case_mode = CaseMode::Sensitive;
        }
        self
    }

    /// Open an archive session with the current configuration.
    pub fn open_session(&self, archive: &Path) -> anyhow::Result<ArchiveSession> {
        if !archive.exists() {
            anyhow::bail!("Archive not found: {}", archive.display());
        }
        let session = ArchiveSession::open(archive, &self.config)?;
        info!(
            archive = %archive.display(),
            files = session.index().len(),
            "Session ready"
        );
        Ok(session)
    }

    /// Create a timestamped run directory below `out` or the configured root.
    pub fn create_run_dir(&self, out: Option<&Path>) -> anyhow::Result<PathBuf> {
        let root = match out {
            Some(path) => path.to_path_buf(),
            None => self.config.runs_dir()?,
        };
        let dir = root.join(Local::now().format("%Y%m%d-%H%M%S").to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Print a progress line unless quiet.
    pub fn say(&self, line: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", line.as_ref());
        }
    }
}
