//! Tether core: the pure orchestrator between editor and board.
//!
//! `update(state, msg)` is the only way state changes. Every request to the
//! board and every piece of host-side work leaves as an [`Effect`] and comes
//! back as a [`Msg`] carrying the ticket it was issued with.
mod backup;
mod buffers;
mod effect;
mod error;
mod file_tree;
mod msg;
mod provision;
mod request;
mod resolver;
mod restore;
mod state;
mod supervisor;
mod traceback;
mod update;
mod view_model;
mod workflow;

pub use backup::entry_name;
pub use buffers::{EditorBuffers, ErrorMark};
pub use effect::{ConsoleStyle, Effect};
pub use error::{ChannelFailure, LocalFailure, ParseFailure, WorkflowAbort, WorkflowStep};
pub use file_tree::{base_name, is_editable, normalize, parent_dirs, FileTree, SEPARATOR};
pub use msg::Msg;
pub use provision::{ExampleBundle, ExampleFile};
pub use request::{
    BoardVersion, EntryKind, LocalOp, LocalReply, Progress, RemoteEntry, Reply, Request,
    RequestKind, Ticket,
};
pub use state::{Activity, AppState, ConnectionState, CoreConfig, PendingOperation, StepKind};
pub use supervisor::{StopPhase, StopSupervisor, STOP_ESCALATION_DEADLINE};
pub use traceback::{
    parse_traceback, resolve_traceback, ParsedError, ResolvedError, SourceName, CURRENT_SCRIPT,
    STOPPED_BY_USER,
};
pub use update::update;
pub use view_model::{AppViewModel, ButtonState, ProgressView};
