use std::fmt;
use std::path::PathBuf;

/// Identifies one dispatched step so its completion can be routed back.
pub type Ticket = u64;

/// A single request against the board. Exactly one may be in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetVersion,
    ListDirectory,
    GetFile { name: String, size: u64 },
    PutFile { name: String, bytes: Vec<u8> },
    Remove { name: String },
    Rename { from: String, to: String },
    MakeDir { name: String },
    Run { name: String, code: Vec<u8> },
    StartInteractive,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::GetVersion => RequestKind::GetVersion,
            Request::ListDirectory => RequestKind::ListDirectory,
            Request::GetFile { .. } => RequestKind::GetFile,
            Request::PutFile { .. } => RequestKind::PutFile,
            Request::Remove { .. } => RequestKind::Remove,
            Request::Rename { .. } => RequestKind::Rename,
            Request::MakeDir { .. } => RequestKind::MakeDir,
            Request::Run { .. } => RequestKind::Run,
            Request::StartInteractive => RequestKind::StartInteractive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    GetVersion,
    ListDirectory,
    GetFile,
    PutFile,
    Remove,
    Rename,
    MakeDir,
    Run,
    StartInteractive,
}

impl RequestKind {
    /// Requests that keep a program running on the board until stopped.
    pub fn is_stoppable(self) -> bool {
        matches!(self, RequestKind::Run | RequestKind::StartInteractive)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::GetVersion => "get-version",
            RequestKind::ListDirectory => "list-directory",
            RequestKind::GetFile => "get-file",
            RequestKind::PutFile => "put-file",
            RequestKind::Remove => "remove",
            RequestKind::Rename => "rename",
            RequestKind::MakeDir => "mkdir",
            RequestKind::Run => "run",
            RequestKind::StartInteractive => "start-interactive",
        };
        f.write_str(name)
    }
}

/// Successful result of a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Version(BoardVersion),
    Listing(Vec<RemoteEntry>),
    File { name: String, bytes: Vec<u8> },
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardVersion {
    pub release: String,
    pub nodename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Absolute remote path, e.g. `/lib/util.py`.
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File { size: u64 },
    Dir,
}

/// Progress reported by the channel while a request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Indeterminate,
    Percent(u32),
}

/// Host-side work a workflow step needs done before it can continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalOp {
    /// Create (truncate) a backup archive for writing.
    CreateArchive { path: PathBuf },
    /// Append one named blob to the archive being written.
    AppendEntry { name: String, bytes: Vec<u8> },
    /// Open an existing archive for reading; replies with entry names in stored order.
    OpenArchive { path: PathBuf },
    ReadEntry { name: String },
    /// Close whichever archive is open, finalizing it if it is being written.
    CloseArchive,
    ReadHostFile { path: PathBuf },
    WriteHostFile { path: PathBuf, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalReply {
    Done,
    Entries(Vec<String>),
    Data(Vec<u8>),
}
