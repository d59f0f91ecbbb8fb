use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tether_logging::{tether_debug, tether_warn};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("no archive is open")]
    NotOpen,
    #[error("an archive is already open")]
    AlreadyOpen,
    #[error("archive is open for {0}")]
    WrongMode(&'static str),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

enum OpenArchive {
    Writing { path: PathBuf, writer: ZipWriter<File> },
    Reading { archive: ZipArchive<File> },
}

/// At most one zip archive open at a time, either being written by a backup
/// or read by a restore.
#[derive(Default)]
pub struct ArchiveStore {
    open: Option<OpenArchive>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Creates (or truncates) `path` for writing.
    pub fn create(&mut self, path: &Path) -> Result<(), ArchiveError> {
        if self.open.is_some() {
            return Err(ArchiveError::AlreadyOpen);
        }
        let file = File::create(path)?;
        tether_debug!("archive {} created", path.display());
        self.open = Some(OpenArchive::Writing {
            path: path.to_path_buf(),
            writer: ZipWriter::new(file),
        });
        Ok(())
    }

    pub fn append(&mut self, name: &str, bytes: &[u8]) -> Result<(), ArchiveError> {
        match self.open.as_mut() {
            Some(OpenArchive::Writing { writer, .. }) => {
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
                writer.start_file(name, options)?;
                writer.write_all(bytes)?;
                Ok(())
            }
            Some(OpenArchive::Reading { .. }) => Err(ArchiveError::WrongMode("reading")),
            None => Err(ArchiveError::NotOpen),
        }
    }

    /// Opens `path` for reading and returns its entry names in stored order.
    pub fn open(&mut self, path: &Path) -> Result<Vec<String>, ArchiveError> {
        if self.open.is_some() {
            return Err(ArchiveError::AlreadyOpen);
        }
        let mut archive = ZipArchive::new(File::open(path)?)?;
        let mut names = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            names.push(archive.by_index_raw(index)?.name().to_string());
        }
        self.open = Some(OpenArchive::Reading { archive });
        Ok(names)
    }

    pub fn read(&mut self, name: &str) -> Result<Vec<u8>, ArchiveError> {
        match self.open.as_mut() {
            Some(OpenArchive::Reading { archive }) => {
                let mut entry = archive.by_name(name)?;
                let mut bytes = Vec::with_capacity(entry.size() as usize);
                entry.read_to_end(&mut bytes)?;
                Ok(bytes)
            }
            Some(OpenArchive::Writing { .. }) => Err(ArchiveError::WrongMode("writing")),
            None => Err(ArchiveError::NotOpen),
        }
    }

    /// Finalizes an archive being written; releases one being read.
    pub fn close(&mut self) -> Result<(), ArchiveError> {
        match self.open.take() {
            Some(OpenArchive::Writing { path, writer }) => {
                let mut file = writer.finish()?;
                file.flush()?;
                tether_debug!("archive {} finalized", path.display());
                Ok(())
            }
            Some(OpenArchive::Reading { .. }) => Ok(()),
            None => Err(ArchiveError::NotOpen),
        }
    }

    /// Releases whatever is open after its workflow was abandoned. A partly
    /// written archive keeps the entries appended so far.
    pub fn discard(&mut self) {
        if !self.is_open() {
            return;
        }
        if let Err(err) = self.close() {
            tether_warn!("partial archive left unfinalized: {}", err);
        }
    }
}
