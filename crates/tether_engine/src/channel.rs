use tether_core::{ChannelFailure, Progress, Reply, Request};

use crate::EngineEvent;

/// Unsolicited output the board produces while a request is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    ConsoleOutput(Vec<u8>),
    /// Error text printed by the program, usually a traceback.
    ErrorText(String),
    Progress(Progress),
    /// The code of a run request has been transferred and is executing.
    CodeDownloaded,
    InteractiveStarted,
    ConnectionLost,
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: BoardEvent);
}

/// Forwards board events into the engine's event queue.
pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: BoardEvent) {
        let _ = self.tx.send(EngineEvent::Board(event));
    }
}

/// The link to a board. At most one `execute` is in flight at a time;
/// `interrupt`, `force_terminate` and `send_input` may be called while it runs.
#[async_trait::async_trait]
pub trait CommandChannel: Send + Sync {
    /// Finds a board and returns the port it answered on.
    async fn connect(&self) -> Result<String, ChannelFailure>;

    async fn execute(&self, request: Request, sink: &dyn EventSink)
        -> Result<Reply, ChannelFailure>;

    /// Graceful stop of the running program.
    async fn interrupt(&self);

    /// Tears down whatever the board is doing and resets the link.
    async fn force_terminate(&self);

    async fn send_input(&self, bytes: Vec<u8>);
}
