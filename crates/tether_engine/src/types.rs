use tether_core::{ChannelFailure, Msg, Reply, Ticket};

use crate::BoardEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Connected { port: String },
    ConnectFailed { message: String },
    Board(BoardEvent),
    RequestDone {
        ticket: Ticket,
        result: Result<Reply, ChannelFailure>,
    },
    StopDeadlineElapsed { generation: u64 },
}

impl From<EngineEvent> for Msg {
    fn from(event: EngineEvent) -> Self {
        match event {
            EngineEvent::Connected { port } => Msg::Connected { port },
            EngineEvent::ConnectFailed { message } => Msg::ConnectFailed { message },
            EngineEvent::RequestDone { ticket, result } => Msg::RequestDone { ticket, result },
            EngineEvent::StopDeadlineElapsed { generation } => {
                Msg::StopDeadlineElapsed { generation }
            }
            EngineEvent::Board(board) => match board {
                BoardEvent::ConsoleOutput(bytes) => Msg::ConsoleOutput(bytes),
                BoardEvent::ErrorText(text) => Msg::ErrorText(text),
                BoardEvent::Progress(progress) => Msg::Progress(progress),
                BoardEvent::CodeDownloaded => Msg::CodeDownloaded,
                BoardEvent::InteractiveStarted => Msg::InteractiveStarted,
                BoardEvent::ConnectionLost => Msg::ConnectionLost,
            },
        }
    }
}
