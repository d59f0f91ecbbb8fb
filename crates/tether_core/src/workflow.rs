use std::path::PathBuf;

use tether_logging::tether_warn;

use crate::backup::{self, BackupContext, BackupStage};
use crate::buffers::ErrorMark;
use crate::file_tree::base_name;
use crate::provision::{self, ExampleContext, ExampleStage};
use crate::resolver;
use crate::restore::{self, RestoreContext, RestoreStage};
use crate::state::{Activity, AppState, Step};
use crate::{
    ChannelFailure, Effect, LocalFailure, LocalOp, LocalReply, Reply, Request, WorkflowAbort,
    WorkflowStep,
};

/// What to do when the pending step completes. Each variant carries the
/// context its next step needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Continuation {
    Version {
        port: String,
    },
    /// Replace the cached tree; `status` overrides the status line.
    Refresh {
        status: Option<String>,
    },
    Open {
        name: String,
        highlight: Option<ErrorMark>,
    },
    Save(SaveContext),
    Run,
    Interactive,
    Remove {
        name: String,
    },
    Rename {
        from: String,
        to: String,
    },
    MakeDir {
        name: String,
    },
    Export {
        name: String,
        local: PathBuf,
        writing: bool,
    },
    Import {
        target: String,
    },
    Backup {
        ctx: BackupContext,
        stage: BackupStage,
    },
    Restore {
        ctx: RestoreContext,
        stage: RestoreStage,
    },
    Example {
        ctx: ExampleContext,
        stage: ExampleStage,
    },
}

impl Continuation {
    pub(crate) fn activity(&self) -> Activity {
        match self {
            Continuation::Version { .. } => Activity::Connecting,
            Continuation::Refresh { .. } => Activity::Refreshing,
            Continuation::Open { .. } => Activity::Opening,
            Continuation::Save(ctx) => ctx.activity,
            Continuation::Run => Activity::Running,
            Continuation::Interactive => Activity::Interactive,
            Continuation::Remove { .. }
            | Continuation::Rename { .. }
            | Continuation::MakeDir { .. } => Activity::FileOperation,
            Continuation::Export { .. } => Activity::Exporting,
            Continuation::Import { .. } => Activity::Importing,
            Continuation::Backup { .. } => Activity::Backup,
            Continuation::Restore { .. } => Activity::Restore,
            Continuation::Example { .. } => Activity::Example,
        }
    }

    /// Whether an archive may be open on behalf of this workflow.
    pub(crate) fn holds_archive(&self) -> bool {
        matches!(
            self,
            Continuation::Backup { .. } | Continuation::Restore { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SaveContext {
    pub name: String,
    pub contents: Vec<u8>,
    pub new_file: bool,
    pub open_in_editor: bool,
    pub activity: Activity,
}

/// Result of the step that just completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Channel(Result<Reply, ChannelFailure>),
    Local(Result<LocalReply, LocalFailure>),
}

impl Outcome {
    pub(crate) fn reply(self) -> Result<Reply, String> {
        match self {
            Outcome::Channel(result) => result.map_err(|failure| failure.to_string()),
            Outcome::Local(_) => Err("host completion where a board reply was expected".into()),
        }
    }

    pub(crate) fn local(self) -> Result<LocalReply, String> {
        match self {
            Outcome::Local(result) => result.map_err(|failure| failure.to_string()),
            Outcome::Channel(_) => Err("board reply where a host completion was expected".into()),
        }
    }
}

pub(crate) fn unexpected(reply: &Reply) -> String {
    let kind = match reply {
        Reply::Version(_) => "version",
        Reply::Listing(_) => "listing",
        Reply::File { .. } => "file",
        Reply::Done => "done",
    };
    format!("unexpected {kind} reply")
}

/// Trampoline step: feeds a completion to its continuation.
pub(crate) fn resume(state: &mut AppState, next: Continuation, outcome: Outcome) -> Vec<Effect> {
    match next {
        Continuation::Version { port } => on_version(state, port, outcome),
        Continuation::Refresh { status } => on_refresh(state, status, outcome),
        Continuation::Open { name, highlight } => on_open(state, name, highlight, outcome),
        Continuation::Save(ctx) => on_save(state, ctx, outcome),
        Continuation::Run => on_run_ended(state, outcome),
        Continuation::Interactive => on_interactive_ended(state, outcome),
        Continuation::Remove { name } => on_remove(state, name, outcome),
        Continuation::Rename { from, to } => on_rename(state, from, to, outcome),
        Continuation::MakeDir { name } => on_make_dir(state, name, outcome),
        Continuation::Export {
            name,
            local,
            writing,
        } => on_export(state, name, local, writing, outcome),
        Continuation::Import { target } => on_import(state, target, outcome),
        Continuation::Backup { ctx, stage } => backup::resume(state, ctx, stage, outcome),
        Continuation::Restore { ctx, stage } => restore::resume(state, ctx, stage, outcome),
        Continuation::Example { ctx, stage } => provision::resume(state, ctx, stage, outcome),
    }
}

fn on_version(state: &mut AppState, port: String, outcome: Outcome) -> Vec<Effect> {
    match outcome.reply() {
        Ok(Reply::Version(version)) => {
            state.set_status(format!(
                "{port} connected, MicroPython V{} on {}",
                version.release, version.nodename
            ));
            state.board = Some(version);
            vec![state.dispatch(
                Step::Channel(Request::ListDirectory),
                Continuation::Refresh { status: None },
            )]
        }
        Ok(other) => {
            state.set_status(format!("Reading board version failed: {}", unexpected(&other)));
            Vec::new()
        }
        Err(cause) => {
            state.set_status(format!("Reading board version failed: {cause}"));
            Vec::new()
        }
    }
}

fn on_refresh(state: &mut AppState, status: Option<String>, outcome: Outcome) -> Vec<Effect> {
    let failure = match outcome.reply() {
        Ok(Reply::Listing(entries)) => {
            state.tree.set(entries);
            None
        }
        Ok(other) => Some(unexpected(&other)),
        Err(cause) => Some(cause),
    };
    match (status, failure) {
        (Some(status), None) => state.set_status(status),
        (None, None) => {}
        (Some(status), Some(cause)) => {
            state.set_status(format!("{status}; reading file list failed: {cause}"))
        }
        (None, Some(cause)) => state.set_status(format!("Reading file list failed: {cause}")),
    }
    Vec::new()
}

fn on_open(
    state: &mut AppState,
    name: String,
    highlight: Option<ErrorMark>,
    outcome: Outcome,
) -> Vec<Effect> {
    match outcome.reply() {
        Ok(Reply::File { bytes, .. }) => {
            state.buffers.open(&name);
            state.set_status("");
            let mut effects = vec![Effect::OpenBuffer {
                name: name.clone(),
                contents: bytes,
            }];
            if let Some(mark) = highlight {
                if state.buffers.highlight(&name, mark.clone()) {
                    effects.push(Effect::HighlightLine {
                        name,
                        line: mark.line,
                        message: mark.message,
                    });
                }
            }
            effects
        }
        Ok(other) => {
            state.set_status(format!("Loading {name} failed: {}", unexpected(&other)));
            Vec::new()
        }
        Err(cause) => {
            state.set_status(format!("Loading {name} failed: {cause}"));
            Vec::new()
        }
    }
}

/// Bookkeeping after a file landed on the board: cache its size and open or
/// refresh the matching editor buffer.
pub(crate) fn record_saved(
    state: &mut AppState,
    name: &str,
    contents: Vec<u8>,
    new_file: bool,
    open_in_editor: bool,
) -> Vec<Effect> {
    state.tree.add_file(name, contents.len() as u64);
    if !open_in_editor {
        return Vec::new();
    }
    if new_file {
        state.buffers.open(name);
        vec![Effect::OpenBuffer {
            name: name.to_string(),
            contents,
        }]
    } else if state.buffers.is_open(name) {
        vec![Effect::MarkBufferSaved {
            name: name.to_string(),
        }]
    } else {
        Vec::new()
    }
}

fn on_save(state: &mut AppState, ctx: SaveContext, outcome: Outcome) -> Vec<Effect> {
    match outcome.reply() {
        Ok(_) => {
            state.set_status(format!("Saved {}", ctx.name));
            record_saved(
                state,
                &ctx.name,
                ctx.contents,
                ctx.new_file,
                ctx.open_in_editor,
            )
        }
        Err(cause) => {
            tether_warn!("saving {} failed: {}", ctx.name, cause);
            state.set_status(format!("Saving aborted with error: {cause}"));
            Vec::new()
        }
    }
}

fn on_run_ended(state: &mut AppState, outcome: Outcome) -> Vec<Effect> {
    let effects: Vec<Effect> = state.supervisor.run_ended().into_iter().collect();
    match outcome.reply() {
        Ok(_) => state.set_status("Code execution successful"),
        Err(cause) => {
            tether_warn!("run ended with failure: {}", cause);
            state.set_status("Code execution aborted with error");
        }
    }
    effects
}

fn on_interactive_ended(state: &mut AppState, outcome: Outcome) -> Vec<Effect> {
    let effects: Vec<Effect> = state.supervisor.run_ended().into_iter().collect();
    if let Err(cause) = outcome.reply() {
        tether_warn!("interactive session ended with failure: {}", cause);
    }
    state.set_status("Interactive mode done");
    effects
}

fn on_remove(state: &mut AppState, name: String, outcome: Outcome) -> Vec<Effect> {
    match outcome.reply() {
        Ok(_) => {
            state.tree.remove(&name);
            state.set_status(format!("Removed {name}"));
            Vec::new()
        }
        Err(cause) => {
            state.set_status(format!("Removing {name} failed"));
            resolver::report_error(state, &cause)
        }
    }
}

fn on_rename(state: &mut AppState, from: String, to: String, outcome: Outcome) -> Vec<Effect> {
    match outcome.reply() {
        Ok(_) => {
            state.tree.rename(&from, &to);
            state.set_status(format!("Renamed {from} to {to}"));
            Vec::new()
        }
        Err(cause) => {
            state.set_status(format!("Renaming {from} failed"));
            resolver::report_error(state, &cause)
        }
    }
}

fn on_make_dir(state: &mut AppState, name: String, outcome: Outcome) -> Vec<Effect> {
    match outcome.reply() {
        Ok(_) => {
            state.tree.add_dir(&name);
            state.set_status(format!("Created {name}"));
            Vec::new()
        }
        Err(cause) => {
            state.set_status(format!("Creating {name} failed"));
            resolver::report_error(state, &cause)
        }
    }
}

fn on_export(
    state: &mut AppState,
    name: String,
    local: PathBuf,
    writing: bool,
    outcome: Outcome,
) -> Vec<Effect> {
    if writing {
        match outcome.local() {
            Ok(_) => {
                let file_name = local
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| local.display().to_string());
                state.set_status(format!("Exported {file_name}"));
            }
            Err(cause) => {
                let abort = WorkflowAbort::new(WorkflowStep::WriteHostFile, cause);
                state.set_status(format!("Export of {name} failed: {abort}"));
            }
        }
        return Vec::new();
    }

    match outcome.reply() {
        Ok(Reply::File { bytes, .. }) => vec![state.dispatch(
            Step::Local(LocalOp::WriteHostFile {
                path: local.clone(),
                bytes,
            }),
            Continuation::Export {
                name,
                local,
                writing: true,
            },
        )],
        Ok(other) => {
            state.set_status(format!("Export of {name} failed: {}", unexpected(&other)));
            Vec::new()
        }
        Err(cause) => {
            let abort = WorkflowAbort::new(WorkflowStep::FetchFile, cause);
            state.set_status(format!("Export of {name} failed: {abort}"));
            Vec::new()
        }
    }
}

fn on_import(state: &mut AppState, target: String, outcome: Outcome) -> Vec<Effect> {
    match outcome.local() {
        Ok(LocalReply::Data(bytes)) => {
            let ctx = SaveContext {
                name: target.clone(),
                contents: bytes.clone(),
                new_file: !state.tree.exists(&target),
                open_in_editor: crate::file_tree::is_editable(&target),
                activity: Activity::Importing,
            };
            state.set_status(format!("Importing {}", base_name(&target)));
            vec![state.dispatch(
                Step::Channel(Request::PutFile {
                    name: target,
                    bytes,
                }),
                Continuation::Save(ctx),
            )]
        }
        Ok(_) => {
            state.set_status("Import failed: local file produced no data");
            Vec::new()
        }
        Err(cause) => {
            let abort = WorkflowAbort::new(WorkflowStep::ReadHostFile, cause);
            state.set_status(format!("Import failed: {abort}"));
            Vec::new()
        }
    }
}
