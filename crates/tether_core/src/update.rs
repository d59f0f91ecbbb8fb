use tether_logging::{tether_debug, tether_info, tether_warn};

use crate::file_tree::{base_name, normalize};
use crate::resolver::report_error;
use crate::state::{Activity, AppState, ConnectionState, RunPhase, Step, StepKind};
use crate::view_model::console_accepts_input;
use crate::workflow::{self, Continuation, Outcome, SaveContext};
use crate::{backup, provision, restore};
use crate::{ConsoleStyle, Effect, LocalOp, Msg, Progress, Request, RequestKind, Ticket};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    if matches!(msg, Msg::NoOp) {
        return (state, Vec::new());
    }

    let effects = match msg {
        Msg::Connected { port } => {
            tether_info!("board found on {}", port);
            state.connection = ConnectionState::Connected { port: port.clone() };
            state.set_status(format!("Connected to {port}"));
            state.begin(
                Continuation::Version { port },
                Step::Channel(Request::GetVersion),
            )
        }
        Msg::ConnectFailed { message } => {
            tether_warn!("no board: {}", message);
            state.connection = ConnectionState::Disconnected;
            state.set_status(format!("No board found: {message}"));
            Vec::new()
        }
        Msg::ReconnectRequested => match state.connection {
            ConnectionState::Connected { .. } | ConnectionState::Connecting => Vec::new(),
            ConnectionState::Disconnected | ConnectionState::Lost => {
                state.connection = ConnectionState::Connecting;
                state.set_status("Searching for board");
                vec![Effect::Connect]
            }
        },
        Msg::ConnectionLost => {
            tether_warn!("connection to board lost");
            let effects = state.reset_session();
            state.connection = ConnectionState::Lost;
            state.set_status("Connection to board lost");
            effects
        }
        Msg::OpenRequested { name } => open(&mut state, normalize(&name)),
        Msg::SaveRequested { name, code } => {
            let name = normalize(&name);
            let ctx = SaveContext {
                name: name.clone(),
                contents: code.clone(),
                new_file: !state.tree.exists(&name),
                open_in_editor: true,
                activity: Activity::Saving,
            };
            let effects = state.begin(
                Continuation::Save(ctx),
                Step::Channel(Request::PutFile { name: name.clone(), bytes: code }),
            );
            if !effects.is_empty() {
                state.set_status(format!("Saving {}", base_name(&name)));
            }
            effects
        }
        Msg::RunRequested { name, code } => {
            let name = normalize(&name);
            let effects = state.begin(
                Continuation::Run,
                Step::Channel(Request::Run {
                    name: name.clone(),
                    code,
                }),
            );
            if !effects.is_empty() {
                state.set_status(format!("Running {}", base_name(&name)));
                state.current_script = Some(name);
                state.run_phase = RunPhase::Downloading;
            }
            effects
        }
        Msg::StopRequested => match state.pending.as_ref().map(|p| p.step) {
            Some(StepKind::Channel(kind)) if kind.is_stoppable() => {
                let effects = state.supervisor.request_stop();
                if !effects.is_empty() {
                    state.set_status("Stopping");
                }
                effects
            }
            _ => {
                tether_debug!("stop requested with nothing running");
                Vec::new()
            }
        },
        Msg::InteractiveRequested => {
            let effects = state.begin(
                Continuation::Interactive,
                Step::Channel(Request::StartInteractive),
            );
            if !effects.is_empty() {
                state.set_status("Starting interactive mode");
            }
            effects
        }
        Msg::RemoveRequested { name } => {
            let name = normalize(&name);
            let mut effects = state.begin(
                Continuation::Remove { name: name.clone() },
                Step::Channel(Request::Remove { name: name.clone() }),
            );
            if !effects.is_empty() && state.buffers.is_open(&name) {
                state.buffers.close(&name);
                effects.push(Effect::CloseBuffer { name });
            }
            effects
        }
        Msg::RenameRequested { from, to } => {
            let (from, to) = (normalize(&from), normalize(&to));
            let mut effects = state.begin(
                Continuation::Rename {
                    from: from.clone(),
                    to: to.clone(),
                },
                Step::Channel(Request::Rename {
                    from: from.clone(),
                    to: to.clone(),
                }),
            );
            if !effects.is_empty() && state.buffers.is_open(&from) {
                state.buffers.rename(&from, &to);
                effects.push(Effect::RenameBuffer { from, to });
            }
            effects
        }
        Msg::MakeDirRequested { name } => {
            let name = normalize(&name);
            state.begin(
                Continuation::MakeDir { name: name.clone() },
                Step::Channel(Request::MakeDir { name }),
            )
        }
        Msg::BackupRequested { archive } => backup::start(&mut state, archive),
        Msg::RestoreRequested { archive } => restore::start(&mut state, archive),
        Msg::ImportRequested { local, target } => {
            let target = normalize(&target);
            state.begin(
                Continuation::Import { target },
                Step::Local(LocalOp::ReadHostFile { path: local }),
            )
        }
        Msg::ExportRequested { name, local } => {
            let name = normalize(&name);
            match state.tree.size(&name) {
                Some(size) => state.begin(
                    Continuation::Export {
                        name: name.clone(),
                        local,
                        writing: false,
                    },
                    Step::Channel(Request::GetFile { name, size }),
                ),
                None => {
                    state.set_status(format!("{name} is not a file on the board"));
                    Vec::new()
                }
            }
        }
        Msg::ExampleRequested(bundle) => provision::start_example(&mut state, bundle),
        Msg::ConsoleInput(bytes) => {
            if console_accepts_input(&state) {
                vec![Effect::SendInput(bytes)]
            } else {
                tether_debug!("dropping {} bytes of console input", bytes.len());
                Vec::new()
            }
        }
        Msg::BufferClosed { name } => {
            state.buffers.close(&name);
            Vec::new()
        }
        Msg::BufferEdited { name } => {
            state.buffers.clear_highlight(&name);
            Vec::new()
        }
        Msg::RequestDone { ticket, result } => {
            complete(&mut state, ticket, false, Outcome::Channel(result))
        }
        Msg::LocalDone { ticket, result } => {
            complete(&mut state, ticket, true, Outcome::Local(result))
        }
        Msg::ConsoleOutput(bytes) => vec![Effect::AppendConsole {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            style: ConsoleStyle::Output,
        }],
        Msg::ErrorText(text) => report_error(&mut state, &text),
        Msg::Progress(progress) => {
            if state.pending.is_some() {
                state.progress = Some(clamp(progress));
            }
            Vec::new()
        }
        Msg::CodeDownloaded => {
            if pending_kind(&state) == Some(RequestKind::Run) {
                state.run_phase = RunPhase::Running;
            }
            Vec::new()
        }
        Msg::InteractiveStarted => {
            if pending_kind(&state) == Some(RequestKind::StartInteractive) {
                state.interactive = true;
                state.set_status("Interactive mode active");
            }
            Vec::new()
        }
        Msg::StopDeadlineElapsed { generation } => escalate(&mut state, generation),
        Msg::NoOp => Vec::new(),
    };

    state.mark_dirty();
    (state, effects)
}

fn pending_kind(state: &AppState) -> Option<RequestKind> {
    match state.pending.as_ref()?.step {
        StepKind::Channel(kind) => Some(kind),
        StepKind::Local => None,
    }
}

fn clamp(progress: Progress) -> Progress {
    match progress {
        Progress::Percent(percent) if percent > 100 => {
            tether_warn!("progress {}% clamped to 100%", percent);
            Progress::Percent(100)
        }
        other => other,
    }
}

fn open(state: &mut AppState, name: String) -> Vec<Effect> {
    if state.buffers.is_open(&name) {
        return vec![Effect::FocusBuffer { name }];
    }
    if !state.is_connected() {
        state.set_status("Board not connected");
        return Vec::new();
    }
    match state.tree.size(&name) {
        Some(size) => state.begin(
            Continuation::Open {
                name: name.clone(),
                highlight: None,
            },
            Step::Channel(Request::GetFile { name, size }),
        ),
        None if state.tree.exists(&name) => {
            state.set_status(format!("{name} is a directory"));
            Vec::new()
        }
        None => {
            // Not on the board yet: an empty buffer that the first save creates.
            state.buffers.open(&name);
            vec![Effect::OpenBuffer {
                name,
                contents: Vec::new(),
            }]
        }
    }
}

/// Routes a completion to the pending continuation. Completions whose
/// ticket is not pending were abandoned and are dropped.
fn complete(state: &mut AppState, ticket: Ticket, local: bool, outcome: Outcome) -> Vec<Effect> {
    let Some(next) = state.take_pending(ticket, local) else {
        tether_warn!("ignoring completion #{} that is not pending", ticket);
        return Vec::new();
    };
    let mut effects = workflow::resume(state, next, outcome);
    effects.extend(state.settle());
    effects
}

fn escalate(state: &mut AppState, generation: u64) -> Vec<Effect> {
    if !state.supervisor.deadline_elapsed(generation) {
        tether_debug!("stop timer {} is stale", generation);
        return Vec::new();
    }
    if let Some(pending) = state.pending.take() {
        tether_warn!("force-terminating #{} ({})", pending.ticket, pending.activity());
    }
    state.set_status("Execution forcibly terminated");
    let mut effects = vec![Effect::ForceTerminate];
    effects.extend(state.settle());
    effects
}
