//! Restore: every archive entry back onto the board.
//!
//! Entries are written in stored order. Directories missing on the board
//! are made first, outermost first. Whatever happens, the archive is closed
//! and the file list re-read before the result is reported.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tether_logging::{tether_info, tether_warn};

use crate::file_tree::{base_name, normalize, SEPARATOR};
use crate::provision::PathedWrite;
use crate::state::{AppState, Step};
use crate::workflow::{unexpected, Continuation, Outcome};
use crate::{Effect, LocalOp, LocalReply, Request, WorkflowAbort, WorkflowStep};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RestoreContext {
    archive: PathBuf,
    /// File entries in stored order; directory entries are dropped.
    entries: Vec<String>,
    cursor: usize,
    /// Directories made during this restore.
    created: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RestoreStage {
    Opening,
    Reading,
    Writing(PathedWrite),
    Closing { outcome: Result<(), WorkflowAbort> },
}

pub(crate) fn start(state: &mut AppState, archive: PathBuf) -> Vec<Effect> {
    let ctx = RestoreContext {
        archive: archive.clone(),
        entries: Vec::new(),
        cursor: 0,
        created: BTreeSet::new(),
    };
    let effects = state.begin(
        Continuation::Restore {
            ctx,
            stage: RestoreStage::Opening,
        },
        Step::Local(LocalOp::OpenArchive {
            path: archive.clone(),
        }),
    );
    if !effects.is_empty() {
        state.set_status(format!("Restoring from {}", archive.display()));
    }
    effects
}

pub(crate) fn resume(
    state: &mut AppState,
    mut ctx: RestoreContext,
    stage: RestoreStage,
    outcome: Outcome,
) -> Vec<Effect> {
    match stage {
        RestoreStage::Opening => match outcome.local() {
            Ok(LocalReply::Entries(names)) => {
                ctx.entries = names
                    .into_iter()
                    .filter(|name| !name.ends_with(SEPARATOR))
                    .collect();
                tether_info!("restoring {} entries from {}", ctx.entries.len(), ctx.archive.display());
                read_next(state, ctx)
            }
            Ok(_) => close(
                state,
                ctx,
                Err(WorkflowAbort::new(WorkflowStep::OpenArchive, "archive listed no entries")),
            ),
            Err(cause) => refresh(state, &ctx, Err(WorkflowAbort::new(WorkflowStep::OpenArchive, cause))),
        },
        RestoreStage::Reading => match outcome.local() {
            Ok(LocalReply::Data(bytes)) => {
                let remote = normalize(&ctx.entries[ctx.cursor]);
                let write = PathedWrite::plan(&state.tree, &ctx.created, remote, bytes);
                issue(state, ctx, write)
            }
            Ok(_) => close(
                state,
                ctx,
                Err(WorkflowAbort::new(WorkflowStep::ReadEntry, "entry produced no data")),
            ),
            Err(cause) => close(state, ctx, Err(WorkflowAbort::new(WorkflowStep::ReadEntry, cause))),
        },
        RestoreStage::Writing(mut write) => match outcome.reply() {
            Ok(_) if write.is_writing() => {
                state.tree.add_file(&write.remote, write.bytes.len() as u64);
                ctx.cursor += 1;
                read_next(state, ctx)
            }
            Ok(_) => {
                write.dir_created(&mut state.tree, &mut ctx.created);
                issue(state, ctx, write)
            }
            Err(cause) => {
                let abort = WorkflowAbort::new(write.failed_step(), cause);
                close(state, ctx, Err(abort))
            }
        },
        RestoreStage::Closing { outcome: earlier } => {
            let result = match (earlier, outcome.local()) {
                (Err(abort), _) => Err(abort),
                (Ok(()), Err(cause)) => Err(WorkflowAbort::new(WorkflowStep::CloseArchive, cause)),
                (Ok(()), Ok(_)) => Ok(()),
            };
            refresh(state, &ctx, result)
        }
    }
}

fn read_next(state: &mut AppState, ctx: RestoreContext) -> Vec<Effect> {
    let Some(name) = ctx.entries.get(ctx.cursor).cloned() else {
        return close(state, ctx, Ok(()));
    };
    state.set_status(format!(
        "Restoring {} ({}/{})",
        base_name(&name),
        ctx.cursor + 1,
        ctx.entries.len()
    ));
    vec![state.dispatch(
        Step::Local(LocalOp::ReadEntry { name }),
        Continuation::Restore {
            ctx,
            stage: RestoreStage::Reading,
        },
    )]
}

fn issue(state: &mut AppState, ctx: RestoreContext, write: PathedWrite) -> Vec<Effect> {
    vec![state.dispatch(
        Step::Channel(write.next_request()),
        Continuation::Restore {
            ctx,
            stage: RestoreStage::Writing(write),
        },
    )]
}

fn close(state: &mut AppState, ctx: RestoreContext, outcome: Result<(), WorkflowAbort>) -> Vec<Effect> {
    vec![state.dispatch(
        Step::Local(LocalOp::CloseArchive),
        Continuation::Restore {
            ctx,
            stage: RestoreStage::Closing { outcome },
        },
    )]
}

/// Re-reads the file list; the final status is shown once it arrives.
fn refresh(state: &mut AppState, ctx: &RestoreContext, result: Result<(), WorkflowAbort>) -> Vec<Effect> {
    let status = match result {
        Ok(()) => {
            tether_info!("restore from {} done: {} files", ctx.archive.display(), ctx.cursor);
            "Restoration successful".to_string()
        }
        Err(abort) => {
            tether_warn!(
                "restore from {} aborted after {} files: {}",
                ctx.archive.display(),
                ctx.cursor,
                abort
            );
            format!("Restoration failed: {abort}")
        }
    };
    vec![state.dispatch(
        Step::Channel(Request::ListDirectory),
        Continuation::Refresh {
            status: Some(status),
        },
    )]
}
