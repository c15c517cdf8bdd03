//! Zip archive reader.

use super::{safe_join, write_member, ArchiveReader};
use crate::error::{ArchseekError, Result};
use crate::types::{ArchiveFormat, ArchiveMember, EntryHandle};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Reader for `.zip` archives, extracting members by central-directory index.
pub struct ZipArchive {
    path: PathBuf,
    archive: Option<zip::ZipArchive<BufReader<File>>>,
    buffer_size: usize,
}

impl ZipArchive {
    /// Open a zip archive and parse its central directory.
    pub fn open(path: &Path, buffer_size: usize) -> Result<Self> {
        let file = File::open(path).map_err(|e| ArchseekError::archive_open(path, e))?;
        let archive = zip::ZipArchive::new(BufReader::new(file))
            .map_err(|e| ArchseekError::archive_open(path, e))?;
        Ok(ZipArchive {
            path: path.to_path_buf(),
            archive: Some(archive),
            buffer_size,
        })
    }

    fn archive(&mut self) -> Result<&mut zip::ZipArchive<BufReader<File>>> {
        self.archive
            .as_mut()
            .ok_or_else(|| ArchseekError::Internal("archive already closed".to_string()))
    }
}

impl ArchiveReader for ZipArchive {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn path(&self) -> &Path {
        &self.path
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn members(&mut self) -> Result<Vec<ArchiveMember>> {
        let path = self.path.clone();
        let archive = self.archive()?;
        let mut members = Vec::with_capacity(archive.len());

        for ordinal in 0..archive.len() {
            let entry = archive
                .by_index_raw(ordinal)
                .map_err(|e| ArchseekError::archive_open(&path, e))?;
            members.push(ArchiveMember::new(
                entry.name(),
                !entry.is_dir(),
                EntryHandle::new(ordinal, None, entry.size()),
            ));
        }

        debug!(entries = members.len(), "Enumerated zip archive");
        Ok(members)
    }

    fn extract(&mut self, member: &ArchiveMember, out_root: &Path) -> Result<PathBuf> {
        let dest = safe_join(out_root, &member.name)?;
        let buffer_size = self.buffer_size;
        let mut entry = self
            .archive()?
            .by_index(member.handle.ordinal)
            .map_err(|e| ArchseekError::member_read(&member.name, e))?;
        write_member(&mut entry, &dest, &member.name, buffer_size)?;
        Ok(dest)
    }

    fn close(&mut self) {
        if self.archive.take().is_some() {
            debug!(path = %self.path.display(), "Closed zip archive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::zip_fixture;
    use std::fs;
    use tempfile::TempDir;

    const FILES: &[(&str, &[u8])] = &[
        ("private/var/mobile/Library/Preferences/com.apple.a.plist", b"plist"),
        ("../../escape.txt", b"nope"),
    ];

    #[test]
    fn test_zip_members() {
        let dir = TempDir::new().unwrap();
        let path = zip_fixture(&dir, "e.zip", FILES);
        let mut reader = ZipArchive::open(&path, 4096).unwrap();

        let members = reader.members().unwrap();
        assert_eq!(members.len(), 3);
        assert_eq!(members[0].name, "private/var/");
        assert!(!members[0].is_file);
        assert!(members[1].is_file);
        assert_eq!(members[1].handle.size(), 5);
        assert_eq!(reader.format(), ArchiveFormat::Zip);
    }

    #[test]
    fn test_zip_extract_sanitizes_names() {
        let dir = TempDir::new().unwrap();
        let path = zip_fixture(&dir, "e.zip", FILES);
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let mut reader = ZipArchive::open(&path, 4096).unwrap();
        let members = reader.members().unwrap();
        let summary = reader.extract_batch(&members[1..], &out).unwrap();

        assert_eq!(summary.written.len(), 2);
        assert_eq!(
            fs::read(out.join("private/var/mobile/Library/Preferences/com.apple.a.plist")).unwrap(),
            b"plist"
        );
        assert_eq!(fs::read(out.join("escape.txt")).unwrap(), b"nope");
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_bad_index_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = zip_fixture(&dir, "e.zip", FILES);
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let mut reader = ZipArchive::open(&path, 4096).unwrap();
        let ghost = ArchiveMember::new("ghost.db", true, EntryHandle::new(42, None, 0));
        let summary = reader.extract_batch(&[ghost], &out).unwrap();
        assert!(summary.written.is_empty());
        assert_eq!(summary.skipped[0].name, "ghost.db");
    }

    #[test]
    fn test_truncated_zip_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.zip");
        fs::write(&path, b"PK\x03\x04 not really a zip").unwrap();

        let err = ZipArchive::open(&path, 4096).err().unwrap();
        assert!(matches!(err, ArchseekError::ArchiveOpen { .. }));
    }
}
