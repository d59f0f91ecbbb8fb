use std::fs;

use tether_core::{LocalFailure, LocalOp, LocalReply};
use tether_logging::tether_debug;

use crate::{ArchiveStore, AtomicFileWriter};

/// Executes the host-side steps of workflows: archive access and plain file
/// import/export.
#[derive(Default)]
pub struct LocalWorkspace {
    archives: ArchiveStore,
}

impl LocalWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn execute(&mut self, op: LocalOp) -> Result<LocalReply, LocalFailure> {
        match op {
            LocalOp::CreateArchive { path } => self
                .archives
                .create(&path)
                .map(|()| LocalReply::Done)
                .map_err(archive_failure),
            LocalOp::AppendEntry { name, bytes } => {
                tether_debug!("archiving {} ({} bytes)", name, bytes.len());
                self.archives
                    .append(&name, &bytes)
                    .map(|()| LocalReply::Done)
                    .map_err(archive_failure)
            }
            LocalOp::OpenArchive { path } => self
                .archives
                .open(&path)
                .map(LocalReply::Entries)
                .map_err(archive_failure),
            LocalOp::ReadEntry { name } => self
                .archives
                .read(&name)
                .map(LocalReply::Data)
                .map_err(archive_failure),
            LocalOp::CloseArchive => self
                .archives
                .close()
                .map(|()| LocalReply::Done)
                .map_err(archive_failure),
            LocalOp::ReadHostFile { path } => fs::read(&path)
                .map(LocalReply::Data)
                .map_err(|err| LocalFailure::HostFile(format!("{}: {err}", path.display()))),
            LocalOp::WriteHostFile { path, bytes } => AtomicFileWriter::write(&path, &bytes)
                .map(|()| LocalReply::Done)
                .map_err(|err| LocalFailure::HostFile(format!("{}: {err}", path.display()))),
        }
    }

    /// Drops an archive left open by an abandoned workflow.
    pub fn discard_archive(&mut self) {
        self.archives.discard();
    }

    pub fn has_open_archive(&self) -> bool {
        self.archives.is_open()
    }
}

fn archive_failure(err: crate::ArchiveError) -> LocalFailure {
    LocalFailure::Archive(err.to_string())
}
