mod common;

use std::time::Duration;

use common::{connected, file, init_logging, issued};
use pretty_assertions::assert_eq;
use tether_core::{
    update, AppState, ButtonState, ChannelFailure, CoreConfig, Effect, Msg, Reply, StopPhase,
    Ticket, STOP_ESCALATION_DEADLINE,
};

/// Connected board with `/main.py` running and reading input.
fn running() -> (AppState, Ticket) {
    let state = connected(vec![file("/main.py", 11)]);
    let (state, effects) = update(
        state,
        Msg::RunRequested {
            name: "/main.py".to_string(),
            code: b"while True: pass".to_vec(),
        },
    );
    let (ticket, _) = issued(&effects).unwrap();
    assert_eq!(state.view().run_button, ButtonState::Hidden);
    let (state, _) = update(state, Msg::CodeDownloaded);
    assert_eq!(state.view().run_button, ButtonState::Stop);
    (state, ticket)
}

#[test]
fn graceful_stop_arms_the_escalation_timer() {
    init_logging();
    let (state, _) = running();
    let (state, effects) = update(state, Msg::StopRequested);

    assert_eq!(
        effects,
        vec![
            Effect::Interrupt,
            Effect::ArmStopTimer {
                generation: 1,
                after: STOP_ESCALATION_DEADLINE,
            },
        ]
    );
    assert_eq!(state.stop_phase(), StopPhase::StopRequested { generation: 1 });
    assert_eq!(state.view().run_button, ButtonState::Hidden);

    let (state, effects) = update(state, Msg::StopRequested);
    assert!(effects.is_empty());
    assert_eq!(state.stop_phase(), StopPhase::StopRequested { generation: 1 });
}

#[test]
fn completion_before_the_deadline_never_force_terminates() {
    init_logging();
    let (state, ticket) = running();
    let (state, _) = update(state, Msg::StopRequested);

    let (state, effects) = update(
        state,
        Msg::RequestDone {
            ticket,
            result: Err(ChannelFailure::new("KeyboardInterrupt")),
        },
    );
    assert_eq!(effects, vec![Effect::DisarmStopTimer { generation: 1 }]);
    assert_eq!(state.status(), "Code execution aborted with error");
    assert!(!state.is_busy());

    let (state, effects) = update(state, Msg::StopDeadlineElapsed { generation: 1 });
    assert!(effects.is_empty());
    assert!(!effects.contains(&Effect::ForceTerminate));
    assert_eq!(state.view().escalations, 0);
}

#[test]
fn deadline_force_terminates_and_abandons_the_run() {
    init_logging();
    let (state, ticket) = running();
    let (state, _) = update(state, Msg::StopRequested);

    let (state, effects) = update(state, Msg::StopDeadlineElapsed { generation: 1 });
    assert_eq!(effects, vec![Effect::ForceTerminate]);
    assert!(!state.is_busy());
    assert_eq!(state.stop_phase(), StopPhase::Idle);
    assert_eq!(state.status(), "Execution forcibly terminated");
    assert_eq!(state.view().escalations, 1);
    assert_eq!(state.view().run_button, ButtonState::Start);

    // The terminated run reporting in late changes nothing.
    let (state, effects) = update(
        state,
        Msg::RequestDone {
            ticket,
            result: Ok(Reply::Done),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.status(), "Execution forcibly terminated");

    let (_, effects) = update(state, Msg::StopDeadlineElapsed { generation: 1 });
    assert!(effects.is_empty());
}

#[test]
fn stop_with_nothing_running_does_nothing() {
    init_logging();
    let state = connected(vec![]);
    let (state, effects) = update(state, Msg::StopRequested);

    assert!(effects.is_empty());
    assert_eq!(state.stop_phase(), StopPhase::Idle);
}

#[test]
fn configured_deadline_is_used_for_the_timer() {
    init_logging();
    let config = CoreConfig {
        stop_deadline: Duration::from_millis(250),
    };
    let (state, effects) = update(
        AppState::with_config(config),
        Msg::Connected {
            port: common::PORT.to_string(),
        },
    );
    let (state, effects) = common::reply(state, &effects, Ok(Reply::Version(common::version())));
    let (state, _) = common::reply(state, &effects, Ok(Reply::Listing(vec![])));

    let (state, _) = update(state, Msg::InteractiveRequested);
    let (state, _) = update(state, Msg::InteractiveStarted);
    assert_eq!(state.view().console_button, ButtonState::Stop);

    let (_, effects) = update(state, Msg::StopRequested);
    assert_eq!(
        effects[1],
        Effect::ArmStopTimer {
            generation: 1,
            after: Duration::from_millis(250),
        }
    );
}

#[test]
fn console_input_reaches_the_board_only_while_a_program_reads_it() {
    init_logging();
    let state = connected(vec![file("/main.py", 11)]);
    let (state, effects) = update(state, Msg::ConsoleInput(b"1\r".to_vec()));
    assert!(effects.is_empty());

    let (state, _) = update(
        state,
        Msg::RunRequested {
            name: "/main.py".to_string(),
            code: b"input()".to_vec(),
        },
    );
    let (state, effects) = update(state, Msg::ConsoleInput(b"1\r".to_vec()));
    assert!(effects.is_empty());

    let (state, _) = update(state, Msg::CodeDownloaded);
    assert!(state.view().console_input_enabled);
    let (_, effects) = update(state, Msg::ConsoleInput(b"1\r".to_vec()));
    assert_eq!(effects, vec![Effect::SendInput(b"1\r".to_vec())]);
}
