use std::time::Duration;

use crate::{LocalOp, Request, Ticket};

/// Work the platform must carry out after an `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Hand `request` to the command channel; its completion comes back as
    /// `Msg::RequestDone` with the same ticket.
    Issue { ticket: Ticket, request: Request },
    /// Run host-side work; completion comes back as `Msg::LocalDone`.
    Local { ticket: Ticket, op: LocalOp },
    /// Ask the running program to stop (graceful).
    Interrupt,
    /// Tear down whatever the channel is doing, without the graceful protocol.
    ForceTerminate,
    ArmStopTimer { generation: u64, after: Duration },
    DisarmStopTimer { generation: u64 },
    /// Forward console keystrokes to the running program.
    SendInput(Vec<u8>),
    /// Try to (re)establish the link to the board.
    Connect,
    /// Release any archive left open by an abandoned workflow.
    DiscardArchive,
    ClearConsole,
    AppendConsole { text: String, style: ConsoleStyle },
    OpenBuffer { name: String, contents: Vec<u8> },
    FocusBuffer { name: String },
    CloseBuffer { name: String },
    CloseAllBuffers,
    RenameBuffer { from: String, to: String },
    MarkBufferSaved { name: String },
    HighlightLine { name: String, line: u32, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStyle {
    /// Program output.
    Output,
    /// Parsed traceback location and message.
    Traceback,
    /// Error text that could not be parsed, shown verbatim.
    RawError,
}
