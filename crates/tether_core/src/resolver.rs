use tether_logging::tether_debug;

use crate::buffers::ErrorMark;
use crate::effect::ConsoleStyle;
use crate::state::{AppState, DeferredFetch, Step};
use crate::traceback::resolve_traceback;
use crate::workflow::Continuation;
use crate::{Effect, Request};

/// Shows error text from the board. A traceback highlights its line in the
/// matching buffer, fetching the file first if it is only on the board.
/// Anything else is shown verbatim.
pub(crate) fn report_error(state: &mut AppState, text: &str) -> Vec<Effect> {
    let resolved = match resolve_traceback(text, state.current_script.as_deref()) {
        Ok(resolved) => resolved,
        Err(failure) => {
            tether_debug!("error text shown raw: {}", failure);
            return vec![Effect::AppendConsole {
                text: text.to_string(),
                style: ConsoleStyle::RawError,
            }];
        }
    };

    let mark = ErrorMark {
        line: resolved.line,
        message: resolved.message.clone(),
    };
    let mut effects = Vec::new();
    if state.buffers.highlight(&resolved.name, mark.clone()) {
        effects.push(Effect::HighlightLine {
            name: resolved.name.clone(),
            line: mark.line,
            message: mark.message,
        });
    } else if let Some(size) = state.tree.size(&resolved.name).filter(|size| *size > 0) {
        effects.extend(fetch_then_highlight(state, resolved.name.clone(), size, mark));
    }
    effects.push(Effect::AppendConsole {
        text: resolved.location,
        style: ConsoleStyle::Traceback,
    });
    effects.push(Effect::AppendConsole {
        text: resolved.message,
        style: ConsoleStyle::Traceback,
    });
    effects
}

/// Error text usually arrives while the failing run is still pending, so the
/// fetch waits until the board is idle.
fn fetch_then_highlight(state: &mut AppState, name: String, size: u64, mark: ErrorMark) -> Vec<Effect> {
    if state.pending.is_some() {
        tether_debug!("deferring fetch of {} until the board is idle", name);
        state.deferred_fetch = Some(DeferredFetch { name, size, mark });
        return Vec::new();
    }
    if !state.is_connected() {
        return Vec::new();
    }
    vec![state.dispatch(
        Step::Channel(Request::GetFile {
            name: name.clone(),
            size,
        }),
        Continuation::Open {
            name,
            highlight: Some(mark),
        },
    )]
}
