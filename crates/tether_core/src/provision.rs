//! Writing files to paths whose directories may not exist yet, and the
//! example-project import built on top of it.

use std::collections::{BTreeSet, VecDeque};

use tether_logging::{tether_info, tether_warn};

use crate::file_tree::{base_name, normalize, parent_dirs, FileTree};
use crate::state::{AppState, Step};
use crate::workflow::{record_saved, Continuation, Outcome};
use crate::{Effect, Request, WorkflowAbort, WorkflowStep};

/// One bundled file of an example project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleFile {
    /// Remote path, e.g. `/lib/ssd1306.py`.
    pub path: String,
    pub bytes: Vec<u8>,
}

/// An example program plus the support files it imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleBundle {
    /// Opened in an editor once written.
    pub main: ExampleFile,
    pub extras: Vec<ExampleFile>,
}

/// A put-file preceded by one mkdir per missing ancestor, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathedWrite {
    pub remote: String,
    pub bytes: Vec<u8>,
    missing: VecDeque<String>,
}

impl PathedWrite {
    /// Ancestors already in `tree` or in `created` are not made again.
    pub(crate) fn plan(
        tree: &FileTree,
        created: &BTreeSet<String>,
        remote: String,
        bytes: Vec<u8>,
    ) -> Self {
        let missing = parent_dirs(&remote)
            .into_iter()
            .filter(|dir| !created.contains(dir) && !tree.exists(dir))
            .collect();
        Self {
            remote,
            bytes,
            missing,
        }
    }

    /// True once every directory exists and the put-file is what was issued.
    pub(crate) fn is_writing(&self) -> bool {
        self.missing.is_empty()
    }

    pub(crate) fn next_request(&self) -> Request {
        match self.missing.front() {
            Some(dir) => Request::MakeDir { name: dir.clone() },
            None => Request::PutFile {
                name: self.remote.clone(),
                bytes: self.bytes.clone(),
            },
        }
    }

    pub(crate) fn failed_step(&self) -> WorkflowStep {
        if self.is_writing() {
            WorkflowStep::PutFile
        } else {
            WorkflowStep::MakeDir
        }
    }

    /// The mkdir at the front of the chain succeeded.
    pub(crate) fn dir_created(&mut self, tree: &mut FileTree, created: &mut BTreeSet<String>) {
        if let Some(dir) = self.missing.pop_front() {
            tree.add_dir(&dir);
            created.insert(dir);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExampleContext {
    main: String,
    extras: VecDeque<ExampleFile>,
    created: BTreeSet<String>,
    written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExampleStage {
    SavingMain { contents: Vec<u8>, new_file: bool },
    Writing(PathedWrite),
}

pub(crate) fn start_example(state: &mut AppState, bundle: ExampleBundle) -> Vec<Effect> {
    let main = normalize(&bundle.main.path);
    let new_file = !state.tree.exists(&main);
    let contents = bundle.main.bytes;
    let ctx = ExampleContext {
        main: main.clone(),
        extras: bundle.extras.into(),
        created: BTreeSet::new(),
        written: 0,
    };
    let effects = state.begin(
        Continuation::Example {
            ctx,
            stage: ExampleStage::SavingMain {
                contents: contents.clone(),
                new_file,
            },
        },
        Step::Channel(Request::PutFile {
            name: main.clone(),
            bytes: contents,
        }),
    );
    if !effects.is_empty() {
        state.set_status(format!("Importing example {}", base_name(&main)));
    }
    effects
}

pub(crate) fn resume(
    state: &mut AppState,
    mut ctx: ExampleContext,
    stage: ExampleStage,
    outcome: Outcome,
) -> Vec<Effect> {
    match stage {
        ExampleStage::SavingMain { contents, new_file } => match outcome.reply() {
            Ok(_) => {
                let main = ctx.main.clone();
                let mut effects = record_saved(state, &main, contents, new_file, true);
                effects.extend(next_extra(state, ctx));
                effects
            }
            Err(cause) => {
                finish(state, &ctx, Err(WorkflowAbort::new(WorkflowStep::PutFile, cause)));
                Vec::new()
            }
        },
        ExampleStage::Writing(mut write) => match outcome.reply() {
            Ok(_) if write.is_writing() => {
                state.tree.add_file(&write.remote, write.bytes.len() as u64);
                ctx.written += 1;
                next_extra(state, ctx)
            }
            Ok(_) => {
                write.dir_created(&mut state.tree, &mut ctx.created);
                issue(state, ctx, write)
            }
            Err(cause) => {
                finish(state, &ctx, Err(WorkflowAbort::new(write.failed_step(), cause)));
                Vec::new()
            }
        },
    }
}

fn next_extra(state: &mut AppState, mut ctx: ExampleContext) -> Vec<Effect> {
    match ctx.extras.pop_front() {
        Some(file) => {
            let write =
                PathedWrite::plan(&state.tree, &ctx.created, normalize(&file.path), file.bytes);
            issue(state, ctx, write)
        }
        None => {
            finish(state, &ctx, Ok(()));
            Vec::new()
        }
    }
}

fn issue(state: &mut AppState, ctx: ExampleContext, write: PathedWrite) -> Vec<Effect> {
    vec![state.dispatch(
        Step::Channel(write.next_request()),
        Continuation::Example {
            ctx,
            stage: ExampleStage::Writing(write),
        },
    )]
}

fn finish(state: &mut AppState, ctx: &ExampleContext, result: Result<(), WorkflowAbort>) {
    match result {
        Ok(()) => {
            tether_info!("example {} provisioned with {} support files", ctx.main, ctx.written);
            state.set_status(format!(
                "Example {} imported ({} support files)",
                base_name(&ctx.main),
                ctx.written
            ));
        }
        Err(abort) => {
            tether_warn!("example {} aborted: {}", ctx.main, abort);
            state.set_status(format!("Example import failed: {abort}"));
        }
    }
}
