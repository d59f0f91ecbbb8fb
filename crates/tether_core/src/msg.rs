use std::path::PathBuf;

use crate::{ChannelFailure, ExampleBundle, LocalFailure, LocalReply, Progress, Reply, Ticket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// The channel found a board on `port`.
    Connected { port: String },
    ConnectFailed { message: String },
    /// User asked to reconnect after the link was lost.
    ReconnectRequested,
    /// The channel declared the link lost.
    ConnectionLost,
    /// User opened a remote file from the file tree.
    OpenRequested { name: String },
    /// User saved an editor buffer.
    SaveRequested { name: String, code: Vec<u8> },
    /// User clicked Run on an editor buffer.
    RunRequested { name: String, code: Vec<u8> },
    /// User clicked Stop while a program or interactive session runs.
    StopRequested,
    /// User started an interactive session from the console.
    InteractiveRequested,
    RemoveRequested { name: String },
    RenameRequested { from: String, to: String },
    MakeDirRequested { name: String },
    /// Back up every remote file into a new archive.
    BackupRequested { archive: PathBuf },
    /// Restore every file of an archive onto the board.
    RestoreRequested { archive: PathBuf },
    /// Copy a host file to the remote path `target`.
    ImportRequested { local: PathBuf, target: String },
    /// Copy the remote file `name` to a host path.
    ExportRequested { name: String, local: PathBuf },
    /// Provision an example: main file plus supporting files.
    ExampleRequested(ExampleBundle),
    /// User typed into the console.
    ConsoleInput(Vec<u8>),
    BufferClosed { name: String },
    BufferEdited { name: String },
    /// Command channel completion for an issued request.
    RequestDone {
        ticket: Ticket,
        result: Result<Reply, ChannelFailure>,
    },
    /// Completion of host-side work.
    LocalDone {
        ticket: Ticket,
        result: Result<LocalReply, LocalFailure>,
    },
    /// Unsolicited program output.
    ConsoleOutput(Vec<u8>),
    /// Unsolicited error report, usually a traceback.
    ErrorText(String),
    Progress(Progress),
    /// The code to run has been transferred and is executing.
    CodeDownloaded,
    InteractiveStarted,
    /// Escalation timer `generation` fired.
    StopDeadlineElapsed { generation: u64 },
    /// Fallback for placeholder wiring.
    NoOp,
}
