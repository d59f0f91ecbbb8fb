use std::fmt;

use thiserror::Error;

/// I/O or protocol failure reported by the command channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ChannelFailure {
    pub message: String,
}

impl ChannelFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of host-side work (archive or plain file I/O).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocalFailure {
    #[error("archive error: {0}")]
    Archive(String),
    #[error("file error: {0}")]
    HostFile(String),
}

/// Error text that does not have the traceback shape. Always recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("no stack frame follows the banner line")]
    NoFrame,
    #[error("stack frames are not followed by a message")]
    NoMessage,
    #[error("stack frame has no usable line number")]
    BadLineNumber,
    #[error("frame refers to the running script but no script is running")]
    NoCurrentScript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStep {
    CreateArchive,
    FetchFile,
    WriteEntry,
    OpenArchive,
    ReadEntry,
    MakeDir,
    PutFile,
    CloseArchive,
    ReadHostFile,
    WriteHostFile,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::CreateArchive => "creating archive",
            WorkflowStep::FetchFile => "fetching file",
            WorkflowStep::WriteEntry => "writing archive entry",
            WorkflowStep::OpenArchive => "opening archive",
            WorkflowStep::ReadEntry => "reading archive entry",
            WorkflowStep::MakeDir => "creating directory",
            WorkflowStep::PutFile => "writing file",
            WorkflowStep::CloseArchive => "closing archive",
            WorkflowStep::ReadHostFile => "reading local file",
            WorkflowStep::WriteHostFile => "writing local file",
        };
        f.write_str(name)
    }
}

/// A multi-step workflow stopped partway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{step} failed: {cause}")]
pub struct WorkflowAbort {
    pub step: WorkflowStep,
    pub cause: String,
}

impl WorkflowAbort {
    pub fn new(step: WorkflowStep, cause: impl fmt::Display) -> Self {
        Self {
            step,
            cause: cause.to_string(),
        }
    }
}
