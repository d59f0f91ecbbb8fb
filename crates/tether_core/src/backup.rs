//! Backup: every remote file into a new archive, one get-file at a time.
//!
//! Create archive, then for each file fetch it and append it as an entry
//! named after its path without the leading separator, then close. Any
//! failure still closes the archive before the status is reported.

use std::path::PathBuf;

use tether_logging::{tether_info, tether_warn};

use crate::file_tree::{base_name, SEPARATOR};
use crate::state::{AppState, Step};
use crate::workflow::{unexpected, Continuation, Outcome};
use crate::{Effect, LocalOp, Reply, Request, WorkflowAbort, WorkflowStep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BackupContext {
    archive: PathBuf,
    /// Snapshot of the remote files taken when the backup started.
    paths: Vec<String>,
    cursor: usize,
    bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BackupStage {
    Creating,
    Fetching,
    Writing,
    Closing { outcome: Result<(), WorkflowAbort> },
}

/// Archive entry name for a remote path.
pub fn entry_name(path: &str) -> String {
    path.strip_prefix(SEPARATOR).unwrap_or(path).to_string()
}

pub(crate) fn start(state: &mut AppState, archive: PathBuf) -> Vec<Effect> {
    let ctx = BackupContext {
        archive: archive.clone(),
        paths: state.tree.all_files(),
        cursor: 0,
        bytes_written: 0,
    };
    let effects = state.begin(
        Continuation::Backup {
            ctx,
            stage: BackupStage::Creating,
        },
        Step::Local(LocalOp::CreateArchive {
            path: archive.clone(),
        }),
    );
    if !effects.is_empty() {
        tether_info!("backup of {} files to {}", state.tree.file_count(), archive.display());
        state.set_status(format!("Backing up to {}", archive.display()));
    }
    effects
}

pub(crate) fn resume(
    state: &mut AppState,
    mut ctx: BackupContext,
    stage: BackupStage,
    outcome: Outcome,
) -> Vec<Effect> {
    match stage {
        BackupStage::Creating => match outcome.local() {
            Ok(_) => fetch_next(state, ctx),
            Err(cause) => {
                // Nothing was opened, so there is nothing to close.
                finish(state, &ctx, Err(WorkflowAbort::new(WorkflowStep::CreateArchive, cause)));
                Vec::new()
            }
        },
        BackupStage::Fetching => match outcome.reply() {
            Ok(Reply::File { bytes, .. }) => {
                let name = entry_name(&ctx.paths[ctx.cursor]);
                ctx.bytes_written += bytes.len() as u64;
                vec![state.dispatch(
                    Step::Local(LocalOp::AppendEntry { name, bytes }),
                    Continuation::Backup {
                        ctx,
                        stage: BackupStage::Writing,
                    },
                )]
            }
            Ok(other) => {
                let abort = WorkflowAbort::new(WorkflowStep::FetchFile, unexpected(&other));
                close(state, ctx, Err(abort))
            }
            Err(cause) => close(state, ctx, Err(WorkflowAbort::new(WorkflowStep::FetchFile, cause))),
        },
        BackupStage::Writing => match outcome.local() {
            Ok(_) => {
                ctx.cursor += 1;
                fetch_next(state, ctx)
            }
            Err(cause) => close(state, ctx, Err(WorkflowAbort::new(WorkflowStep::WriteEntry, cause))),
        },
        BackupStage::Closing { outcome: earlier } => {
            let result = match (earlier, outcome.local()) {
                (Err(abort), _) => Err(abort),
                (Ok(()), Err(cause)) => Err(WorkflowAbort::new(WorkflowStep::CloseArchive, cause)),
                (Ok(()), Ok(_)) => Ok(()),
            };
            finish(state, &ctx, result);
            Vec::new()
        }
    }
}

fn fetch_next(state: &mut AppState, ctx: BackupContext) -> Vec<Effect> {
    let Some(path) = ctx.paths.get(ctx.cursor).cloned() else {
        return close(state, ctx, Ok(()));
    };
    let Some(size) = state.tree.size(&path) else {
        let abort = WorkflowAbort::new(WorkflowStep::FetchFile, format!("{path} is gone"));
        return close(state, ctx, Err(abort));
    };
    state.set_status(format!(
        "Backing up {} ({}/{})",
        base_name(&path),
        ctx.cursor + 1,
        ctx.paths.len()
    ));
    vec![state.dispatch(
        Step::Channel(Request::GetFile { name: path, size }),
        Continuation::Backup {
            ctx,
            stage: BackupStage::Fetching,
        },
    )]
}

fn close(state: &mut AppState, ctx: BackupContext, outcome: Result<(), WorkflowAbort>) -> Vec<Effect> {
    vec![state.dispatch(
        Step::Local(LocalOp::CloseArchive),
        Continuation::Backup {
            ctx,
            stage: BackupStage::Closing { outcome },
        },
    )]
}

fn finish(state: &mut AppState, ctx: &BackupContext, result: Result<(), WorkflowAbort>) {
    match result {
        Ok(()) => {
            tether_info!(
                "backup to {} done: {} files, {} bytes",
                ctx.archive.display(),
                ctx.paths.len(),
                ctx.bytes_written
            );
            state.set_status(format!(
                "Backup successful: {} files, {} bytes",
                ctx.paths.len(),
                ctx.bytes_written
            ));
        }
        Err(abort) => {
            tether_warn!("backup to {} aborted: {}", ctx.archive.display(), abort);
            state.set_status(format!("Backup failed: {abort}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_drop_one_leading_separator() {
        assert_eq!(entry_name("/main.py"), "main.py");
        assert_eq!(entry_name("/lib/util.py"), "lib/util.py");
        assert_eq!(entry_name("boot.py"), "boot.py");
    }
}
