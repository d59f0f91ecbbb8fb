use crate::state::{Activity, AppState, ConnectionState, RunPhase, StepKind};
use crate::supervisor::StopPhase;
use crate::{Progress, RequestKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgressView {
    #[default]
    Hidden,
    Indeterminate,
    Percent(u8),
}

/// Run and console buttons are either hidden, a start button, or a stop button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Hidden,
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppViewModel {
    pub connection: ConnectionState,
    pub busy: bool,
    pub activity: Option<Activity>,
    pub progress: ProgressView,
    pub run_button: ButtonState,
    pub console_button: ButtonState,
    pub console_input_enabled: bool,
    pub file_tree_enabled: bool,
    pub status: String,
    pub file_count: usize,
    pub open_buffers: Vec<String>,
    pub escalations: u32,
    pub dirty: bool,
}

impl AppViewModel {
    pub(crate) fn from_state(state: &AppState, dirty: bool) -> Self {
        let connected = state.is_connected();
        let pending = state.pending.as_ref();
        let busy = pending.is_some();
        let stopping = state.supervisor.phase() != StopPhase::Idle;
        let running = pending.map(|p| p.step);

        let progress = match (busy, state.progress) {
            (false, _) => ProgressView::Hidden,
            (true, Some(Progress::Percent(percent))) => ProgressView::Percent(percent.min(100) as u8),
            (true, _) => ProgressView::Indeterminate,
        };

        let run_button = match running {
            _ if !connected => ButtonState::Hidden,
            None => ButtonState::Start,
            Some(StepKind::Channel(RequestKind::Run))
                if state.run_phase == RunPhase::Running && !stopping =>
            {
                ButtonState::Stop
            }
            Some(_) => ButtonState::Hidden,
        };
        let console_button = match running {
            _ if !connected => ButtonState::Hidden,
            None => ButtonState::Start,
            Some(StepKind::Channel(RequestKind::StartInteractive))
                if state.interactive && !stopping =>
            {
                ButtonState::Stop
            }
            Some(_) => ButtonState::Hidden,
        };

        Self {
            connection: state.connection.clone(),
            busy,
            activity: pending.map(|p| p.activity()),
            progress,
            run_button,
            console_button,
            console_input_enabled: console_accepts_input(state),
            file_tree_enabled: connected && !busy,
            status: state.status.clone(),
            file_count: state.tree.file_count(),
            open_buffers: state.buffers.names(),
            escalations: state.supervisor.escalations(),
            dirty,
        }
    }
}

/// Keystrokes go to the board only while a program or session reads them.
pub(crate) fn console_accepts_input(state: &AppState) -> bool {
    match state.pending.as_ref().map(|p| p.step) {
        Some(StepKind::Channel(RequestKind::Run)) => state.run_phase == RunPhase::Running,
        Some(StepKind::Channel(RequestKind::StartInteractive)) => state.interactive,
        _ => false,
    }
}
