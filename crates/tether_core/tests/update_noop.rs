use tether_core::{update, AppState, Msg};

#[test]
fn update_is_noop() {
    let state = AppState::new();
    let (next, effects) = update(state.clone(), Msg::NoOp);

    assert_eq!(state, next);
    assert!(effects.is_empty());
}

#[test]
fn other_messages_mark_the_view_dirty() {
    let (mut next, _) = update(AppState::new(), Msg::ReconnectRequested);

    assert!(next.view().dirty);
    assert!(next.consume_dirty());
    assert!(!next.view().dirty);
}
