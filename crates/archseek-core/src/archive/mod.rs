//! Container archive readers.
//!
//! The search core interacts with archives only through the [`ArchiveReader`]
//! trait: enumerate the members once, then extract selected members to disk.
//! [`open_archive`] picks the reader from the file signature and nothing
//! downstream branches on the container format again.
//!
//! ## Extraction Safety
//!
//! Every extracted member is written through [`safe_join`]: absolute
//! components, drive prefixes and `..` segments are stripped from the member
//! name, and the resolved parent directory must remain inside the output root.

mod tar_archive;
mod zip_archive;

pub use tar_archive::TarArchive;
pub use zip_archive::ZipArchive;

use crate::error::{ArchseekError, Result};
use crate::types::{ArchiveFormat, ArchiveMember};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Default copy buffer size for extraction (1 MiB)
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 20;

/// Number of leading bytes inspected to detect the container format
const SNIFF_LEN: usize = 512;

/// Offset of the `ustar` magic inside a tar header
const USTAR_OFFSET: usize = 257;

/// Capability over one opened container archive.
///
/// Implementations are `Send` so a session can be moved to a worker thread.
pub trait ArchiveReader: Send {
    /// Container format of this archive
    fn format(&self) -> ArchiveFormat;

    /// Path the archive was opened from
    fn path(&self) -> &Path;

    /// Enumerate every entry in archive order.
    ///
    /// Directories and special entries are included with `is_file == false`.
    fn members(&mut self) -> Result<Vec<ArchiveMember>>;

    /// Extract one member below `out_root`, keeping its relative path.
    ///
    /// Returns the path written.
    fn extract(&mut self, member: &ArchiveMember, out_root: &Path) -> Result<PathBuf>;

    /// Extract several members, skipping the ones that fail.
    ///
    /// Only errors that are not scoped to a single member are returned.
    fn extract_batch(
        &mut self,
        members: &[ArchiveMember],
        out_root: &Path,
    ) -> Result<ExtractionSummary> {
        let mut summary = ExtractionSummary::default();
        for member in members {
            match self.extract(member, out_root) {
                Ok(path) => summary.written.push(path),
                Err(e) if e.is_skippable() => summary.skip(&member.name, &e),
                Err(e) => return Err(e),
            }
        }
        Ok(summary)
    }

    /// Release the underlying file. Further calls fail.
    fn close(&mut self);
}

/// A member that was not extracted, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMember {
    pub name: String,
    pub reason: String,
}

/// Outcome of an extraction batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionSummary {
    /// Files written, in extraction order
    pub written: Vec<PathBuf>,

    /// Members skipped because of per-member failures
    pub skipped: Vec<SkippedMember>,
}

impl ExtractionSummary {
    pub(crate) fn skip(&mut self, name: &str, err: &ArchseekError) {
        warn!(member = %name, error = %err, "Skipping member");
        self.skipped.push(SkippedMember {
            name: name.to_string(),
            reason: err.to_string(),
        });
    }

    /// Append another summary
    pub fn merge(&mut self, other: ExtractionSummary) {
        self.written.extend(other.written);
        self.skipped.extend(other.skipped);
    }
}

/// Open an archive with the default extraction buffer size.
pub fn open_archive(path: impl AsRef<Path>) -> Result<Box<dyn ArchiveReader>> {
    open_archive_with_buffer(path, DEFAULT_BUFFER_SIZE)
}

/// Open an archive, choosing the reader from its signature.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn open_archive_with_buffer(
    path: impl AsRef<Path>,
    buffer_size: usize,
) -> Result<Box<dyn ArchiveReader>> {
    let path = path.as_ref();
    let format = detect_format(path)?;
    info!(format = %format, "Opening archive");

    let reader: Box<dyn ArchiveReader> = match format {
        ArchiveFormat::Zip => Box::new(ZipArchive::open(path, buffer_size)?),
        ArchiveFormat::Tar | ArchiveFormat::TarGz => {
            Box::new(TarArchive::open(path, format, buffer_size)?)
        }
    };
    Ok(reader)
}

/// Determine the container format of a file.
///
/// The signature wins; the file name is only consulted when the leading
/// bytes are inconclusive (e.g. pre-POSIX tar headers).
pub fn detect_format(path: &Path) -> Result<ArchiveFormat> {
    let mut file = File::open(path).map_err(|e| ArchseekError::archive_open(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    Read::by_ref(&mut file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| ArchseekError::archive_open(path, e))?;

    if let Some(format) = format_from_signature(&head) {
        debug!(format = %format, "Format detected from signature");
        return Ok(format);
    }
    format_from_extension(path).ok_or_else(|| ArchseekError::UnsupportedFormat {
        path: path.to_path_buf(),
    })
}

fn format_from_signature(head: &[u8]) -> Option<ArchiveFormat> {
    if head.starts_with(b"PK\x03\x04") || head.starts_with(b"PK\x05\x06") {
        Some(ArchiveFormat::Zip)
    } else if head.starts_with(&[0x1f, 0x8b]) {
        Some(ArchiveFormat::TarGz)
    } else if head.get(USTAR_OFFSET..USTAR_OFFSET + 5) == Some(b"ustar".as_slice()) {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

fn format_from_extension(path: &Path) -> Option<ArchiveFormat> {
    let name = path.file_name()?.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") {
        Some(ArchiveFormat::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") || name.ends_with(".gz") {
        Some(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else {
        None
    }
}

/// Strip everything from a member name that could place it outside the
/// output root: root and drive prefixes, `.` and `..`.
pub fn sanitize_relative(name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Resolve the destination of a member below `root`, creating its parent
/// directories.
pub fn safe_join(root: &Path, name: &str) -> Result<PathBuf> {
    let relative = sanitize_relative(name);
    if relative.as_os_str().is_empty() {
        return Err(ArchseekError::UnsafePath {
            name: name.to_string(),
        });
    }

    let dest = root.join(&relative);
    let parent = dest.parent().unwrap_or(root);
    fs::create_dir_all(parent).map_err(|e| ArchseekError::output_write(parent, e))?;

    // A symlinked directory inside the root could still lead elsewhere
    let real_root = root
        .canonicalize()
        .map_err(|e| ArchseekError::output_write(root, e))?;
    let real_parent = parent
        .canonicalize()
        .map_err(|e| ArchseekError::output_write(parent, e))?;
    if !real_parent.starts_with(&real_root) {
        return Err(ArchseekError::UnsafePath {
            name: name.to_string(),
        });
    }
    Ok(dest)
}

/// Copy a member's content to `dest`.
///
/// Read failures are reported against the member, write failures against the
/// destination. A partially written file is removed.
pub(crate) fn write_member<R: Read>(
    reader: &mut R,
    dest: &Path,
    name: &str,
    buffer_size: usize,
) -> Result<()> {
    let file = File::create(dest).map_err(|e| ArchseekError::output_write(dest, e))?;
    let mut out = BufWriter::with_capacity(buffer_size, file);
    let mut buf = vec![0u8; buffer_size.clamp(4096, DEFAULT_BUFFER_SIZE * 16)];

    let result = loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break out.flush().map_err(|e| ArchseekError::output_write(dest, e)),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(ArchseekError::member_read(name, e)),
        };
        if let Err(e) = out.write_all(&buf[..n]) {
            break Err(ArchseekError::output_write(dest, e));
        }
    };

    if result.is_err() {
        drop(out);
        let _ = fs::remove_file(dest);
    }
    result
}
