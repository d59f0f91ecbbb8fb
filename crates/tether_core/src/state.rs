use std::fmt;
use std::time::Duration;

use tether_logging::{tether_debug, tether_info};

use crate::buffers::{EditorBuffers, ErrorMark};
use crate::file_tree::FileTree;
use crate::supervisor::{StopPhase, StopSupervisor, STOP_ESCALATION_DEADLINE};
use crate::view_model::AppViewModel;
use crate::workflow::Continuation;
use crate::{BoardVersion, Effect, LocalOp, Progress, Request, RequestKind, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreConfig {
    /// How long a graceful stop may take before the channel is force-terminated.
    pub stop_deadline: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            stop_deadline: STOP_ESCALATION_DEADLINE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        port: String,
    },
    /// The link dropped; nothing is accepted until an explicit reconnect.
    Lost,
}

/// What the board is busy with, for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Connecting,
    Refreshing,
    Opening,
    Saving,
    Running,
    Interactive,
    FileOperation,
    Exporting,
    Importing,
    Example,
    Backup,
    Restore,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Activity::Connecting => "connecting",
            Activity::Refreshing => "reading file list",
            Activity::Opening => "loading file",
            Activity::Saving => "saving",
            Activity::Running => "running code",
            Activity::Interactive => "interactive session",
            Activity::FileOperation => "file operation",
            Activity::Exporting => "exporting",
            Activity::Importing => "importing",
            Activity::Example => "importing example",
            Activity::Backup => "backup",
            Activity::Restore => "restore",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Channel(RequestKind),
    Local,
}

/// The single outstanding step and what happens when it completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    pub ticket: Ticket,
    pub step: StepKind,
    pub(crate) next: Continuation,
}

impl PendingOperation {
    pub fn activity(&self) -> Activity {
        self.next.activity()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    Channel(Request),
    Local(LocalOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RunPhase {
    #[default]
    Idle,
    /// Code is being transferred; nothing to stop yet.
    Downloading,
    /// Program runs and reads console input.
    Running,
}

/// A fetch-then-highlight that arrived while the board was busy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeferredFetch {
    pub name: String,
    pub size: u64,
    pub mark: ErrorMark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub(crate) config: CoreConfig,
    pub(crate) connection: ConnectionState,
    pub(crate) pending: Option<PendingOperation>,
    next_ticket: Ticket,
    pub(crate) supervisor: StopSupervisor,
    pub(crate) tree: FileTree,
    pub(crate) buffers: EditorBuffers,
    pub(crate) current_script: Option<String>,
    pub(crate) progress: Option<Progress>,
    pub(crate) run_phase: RunPhase,
    pub(crate) interactive: bool,
    pub(crate) deferred_fetch: Option<DeferredFetch>,
    pub(crate) status: String,
    pub(crate) board: Option<BoardVersion>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_config(CoreConfig::default())
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CoreConfig) -> Self {
        Self {
            config,
            connection: ConnectionState::Disconnected,
            pending: None,
            next_ticket: 1,
            supervisor: StopSupervisor::new(config.stop_deadline),
            tree: FileTree::new(),
            buffers: EditorBuffers::default(),
            current_script: None,
            progress: None,
            run_phase: RunPhase::Idle,
            interactive: false,
            deferred_fetch: None,
            status: String::new(),
            board: None,
            dirty: false,
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel::from_state(self, self.dirty)
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn config(&self) -> CoreConfig {
        self.config
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionState::Connected { .. })
    }

    pub fn pending(&self) -> Option<&PendingOperation> {
        self.pending.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub fn file_tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn buffers(&self) -> &EditorBuffers {
        &self.buffers
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn stop_phase(&self) -> StopPhase {
        self.supervisor.phase()
    }

    pub fn board_version(&self) -> Option<&BoardVersion> {
        self.board.as_ref()
    }

    pub fn current_script(&self) -> Option<&str> {
        self.current_script.as_deref()
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Starts a user action. Rejected without touching the channel if the
    /// board is disconnected or another operation is pending.
    pub(crate) fn begin(&mut self, next: Continuation, step: Step) -> Vec<Effect> {
        if let Err(reason) = self.availability() {
            tether_info!("rejecting {}: {}", next.activity(), reason);
            self.status = reason;
            return Vec::new();
        }
        // `<stdin>` frames belong to a run only while that run is the latest action.
        self.current_script = None;
        let dispatched = self.dispatch(step, next);
        vec![Effect::ClearConsole, dispatched]
    }

    fn availability(&self) -> Result<(), String> {
        if !self.is_connected() {
            return Err("Board not connected".to_string());
        }
        match &self.pending {
            Some(pending) => Err(format!("Board busy ({})", pending.activity())),
            None => Ok(()),
        }
    }

    /// Makes `step` the pending operation. Only valid while nothing is pending.
    pub(crate) fn dispatch(&mut self, step: Step, next: Continuation) -> Effect {
        debug_assert!(self.pending.is_none(), "second operation while one is pending");
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.progress = Some(Progress::Indeterminate);
        let (kind, effect) = match step {
            Step::Channel(request) => (
                StepKind::Channel(request.kind()),
                Effect::Issue { ticket, request },
            ),
            Step::Local(op) => (StepKind::Local, Effect::Local { ticket, op }),
        };
        tether_debug!("dispatch #{} {:?} ({})", ticket, kind, next.activity());
        self.pending = Some(PendingOperation {
            ticket,
            step: kind,
            next,
        });
        effect
    }

    /// Removes the pending operation if `ticket` and `kind` match it.
    pub(crate) fn take_pending(&mut self, ticket: Ticket, local: bool) -> Option<Continuation> {
        let matches = self.pending.as_ref().is_some_and(|pending| {
            pending.ticket == ticket && matches!(pending.step, StepKind::Local) == local
        });
        if matches {
            self.pending.take().map(|pending| pending.next)
        } else {
            None
        }
    }

    /// Runs after a completion left nothing pending: the board is idle again,
    /// so a deferred error fetch may go out now.
    pub(crate) fn settle(&mut self) -> Vec<Effect> {
        if self.pending.is_some() {
            return Vec::new();
        }
        self.progress = None;
        self.run_phase = RunPhase::Idle;
        self.interactive = false;
        match self.deferred_fetch.take() {
            Some(fetch) if self.is_connected() => {
                tether_debug!("dispatching deferred fetch of {}", fetch.name);
                vec![self.dispatch(
                    Step::Channel(Request::GetFile {
                        name: fetch.name.clone(),
                        size: fetch.size,
                    }),
                    Continuation::Open {
                        name: fetch.name,
                        highlight: Some(fetch.mark),
                    },
                )]
            }
            _ => Vec::new(),
        }
    }

    /// Forgets everything tied to the link. Returns effects that release
    /// resources held on behalf of the abandoned operation.
    pub(crate) fn reset_session(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if let Some(disarm) = self.supervisor.reset() {
            effects.push(disarm);
        }
        if let Some(pending) = self.pending.take() {
            tether_info!("abandoning pending #{} ({})", pending.ticket, pending.activity());
            if matches!(pending.step, StepKind::Channel(_)) {
                effects.push(Effect::ForceTerminate);
            }
            if pending.next.holds_archive() {
                effects.push(Effect::DiscardArchive);
            }
        }
        self.tree.clear();
        self.buffers.close_all();
        self.progress = None;
        self.run_phase = RunPhase::Idle;
        self.interactive = false;
        self.deferred_fetch = None;
        self.current_script = None;
        self.board = None;
        effects.push(Effect::CloseAllBuffers);
        effects.push(Effect::ClearConsole);
        effects
    }
}
