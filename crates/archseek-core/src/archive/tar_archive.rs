//! Tape archive reader, plain or gzip-compressed.
//!
//! Plain archives record the data offset of every member during enumeration
//! and extract by seeking straight to it. A gzip stream cannot seek, so
//! single extractions rescan the stream and batches are served by one pass.

use super::{safe_join, write_member, ArchiveReader, ExtractionSummary};
use crate::error::{ArchseekError, Result};
use crate::types::{ArchiveFormat, ArchiveMember, EntryHandle};
use flate2::read::GzDecoder;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tar::EntryType;
use tracing::{debug, instrument, warn};

/// Reader for `.tar` and `.tar.gz` archives.
pub struct TarArchive {
    path: PathBuf,
    format: ArchiveFormat,
    file: Option<File>,
    buffer_size: usize,
}

impl TarArchive {
    /// Open a tar archive of the given format.
    pub fn open(path: &Path, format: ArchiveFormat, buffer_size: usize) -> Result<Self> {
        if format == ArchiveFormat::Zip {
            return Err(ArchseekError::Internal(
                "zip archive passed to the tar reader".to_string(),
            ));
        }
        let file = File::open(path).map_err(|e| ArchseekError::archive_open(path, e))?;
        Ok(TarArchive {
            path: path.to_path_buf(),
            format,
            file: Some(file),
            buffer_size,
        })
    }

    fn file(&mut self) -> Result<&mut File> {
        self.file
            .as_mut()
            .ok_or_else(|| ArchseekError::Internal("archive already closed".to_string()))
    }

    /// Fresh decompressing stream over the whole archive.
    fn gz_stream(&mut self) -> Result<tar::Archive<GzDecoder<BufReader<File>>>> {
        let path = self.path.clone();
        let file = self
            .file()?
            .try_clone()
            .map_err(|e| ArchseekError::archive_open(&path, e))?;
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| ArchseekError::archive_open(&path, e))?;
        Ok(tar::Archive::new(GzDecoder::new(reader)))
    }

    /// Stream the compressed archive once, extracting entries whose ordinal
    /// is wanted.
    fn extract_streaming(
        &mut self,
        wanted: &HashMap<usize, &ArchiveMember>,
        out_root: &Path,
    ) -> Result<ExtractionSummary> {
        let mut summary = ExtractionSummary::default();
        let mut reached = HashSet::with_capacity(wanted.len());
        let buffer_size = self.buffer_size;
        let mut archive = self.gz_stream()?;
        let entries = archive
            .entries()
            .map_err(|e| ArchseekError::archive_open(&self.path, e))?;

        for (ordinal, entry) in entries.enumerate() {
            if reached.len() == wanted.len() {
                break;
            }
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(ordinal, error = %e, "Compressed stream ended early");
                    break;
                }
            };
            let Some(member) = wanted.get(&ordinal) else {
                continue;
            };
            reached.insert(ordinal);

            let result = safe_join(out_root, &member.name).and_then(|dest| {
                write_member(&mut entry, &dest, &member.name, buffer_size)?;
                Ok(dest)
            });
            match result {
                Ok(dest) => summary.written.push(dest),
                Err(e) if e.is_skippable() => summary.skip(&member.name, &e),
                Err(e) => return Err(e),
            }
        }

        let mut missing: Vec<_> = wanted
            .iter()
            .filter(|(ordinal, _)| !reached.contains(*ordinal))
            .collect();
        missing.sort_unstable_by_key(|(ordinal, _)| **ordinal);
        for (_, member) in missing {
            let err = ArchseekError::member_read(&member.name, "entry not found in stream");
            summary.skip(&member.name, &err);
        }
        Ok(summary)
    }

    /// Rescan the compressed archive for a single member.
    fn extract_one_streaming(&mut self, member: &ArchiveMember, out_root: &Path) -> Result<PathBuf> {
        let buffer_size = self.buffer_size;
        let mut archive = self.gz_stream()?;
        let entries = archive
            .entries()
            .map_err(|e| ArchseekError::member_read(&member.name, e))?;

        for (ordinal, entry) in entries.enumerate() {
            let mut entry = entry.map_err(|e| ArchseekError::member_read(&member.name, e))?;
            if ordinal == member.handle.ordinal {
                let dest = safe_join(out_root, &member.name)?;
                write_member(&mut entry, &dest, &member.name, buffer_size)?;
                return Ok(dest);
            }
        }
        Err(ArchseekError::member_read(
            &member.name,
            "entry not found in stream",
        ))
    }
}

/// Regular files, including the legacy continuous type.
fn is_regular(kind: EntryType) -> bool {
    kind.is_file() || kind == EntryType::Continuous
}

/// Collect members from a tar entry iterator.
///
/// A broken header before the first entry means the file is not a readable
/// archive. Later damage truncates the listing with a warning.
fn collect_members<R: Read>(
    path: &Path,
    entries: tar::Entries<'_, R>,
    seekable: bool,
) -> Result<Vec<ArchiveMember>> {
    let mut members = Vec::new();
    for (ordinal, entry) in entries.enumerate() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if ordinal == 0 => return Err(ArchseekError::archive_open(path, e)),
            Err(e) => {
                warn!(ordinal, error = %e, "Archive listing truncated");
                break;
            }
        };

        let raw = entry.path_bytes();
        let name = String::from_utf8_lossy(&raw);
        let name = name.trim_end_matches('/').to_string();
        let is_file = is_regular(entry.header().entry_type());
        let offset = seekable.then(|| entry.raw_file_position());
        let size = entry.size();

        members.push(ArchiveMember::new(
            name,
            is_file,
            EntryHandle::new(ordinal, offset, size),
        ));
    }
    Ok(members)
}

impl ArchiveReader for TarArchive {
    fn format(&self) -> ArchiveFormat {
        self.format
    }

    fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let path = self.path.clone();
        let members = match self.format {
            ArchiveFormat::TarGz => {
                let mut archive = self.gz_stream()?;
                let entries = archive
                    .entries()
                    .map_err(|e| ArchseekError::archive_open(&path, e))?;
                collect_members(&path, entries, false)?
            }
            _ => {
                let file = self.file()?;
                file.seek(SeekFrom::Start(0))
                    .map_err(|e| ArchseekError::archive_open(&path, e))?;
                let mut archive = tar::Archive::new(BufReader::new(&*file));
                let entries = archive
                    .entries_with_seek()
                    .map_err(|e| ArchseekError::archive_open(&path, e))?;
                collect_members(&path, entries, true)?
            }
        };
        debug!(entries = members.len(), "Enumerated tar archive");
        Ok(members)
    }

    fn extract(&mut self, member: &ArchiveMember, out_root: &Path) -> Result<PathBuf> {
        let handle = member.handle;
        let Some(offset) = handle.data_offset else {
            return self.extract_one_streaming(member, out_root);
        };

        let dest = safe_join(out_root, &member.name)?;
        let buffer_size = self.buffer_size;
        let file = self.file()?;
        file.seek(SeekFrom::Start(offset))
            .map_err(|e| ArchseekError::member_read(&member.name, e))?;
        let mut data = file.take(handle.size);
        write_member(&mut data, &dest, &member.name, buffer_size)?;
        Ok(dest)
    }

    fn extract_batch(
        &mut self,
        members: &[ArchiveMember],
        out_root: &Path,
    ) -> Result<ExtractionSummary> {
        if self.format != ArchiveFormat::TarGz {
            let mut summary = ExtractionSummary::default();
            for member in members {
                match self.extract(member, out_root) {
                    Ok(path) => summary.written.push(path),
                    Err(e) if e.is_skippable() => summary.skip(&member.name, &e),
                    Err(e) => return Err(e),
                }
            }
            return Ok(summary);
        }

        let wanted: HashMap<usize, &ArchiveMember> =
            members.iter().map(|m| (m.handle.ordinal, m)).collect();
        self.extract_streaming(&wanted, out_root)
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = %self.path.display(), "Closed tar archive");
        }
    }
}
