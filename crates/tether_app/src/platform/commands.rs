//! Console command lines and what they ask for.

use std::path::PathBuf;

use tether_core::Msg;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  connect                      search for the board again
  ls                           list remote files
  open <remote>                load a remote file into an editor buffer
  save <remote> [host file]    write a buffer (or host file) to the board
  run <remote> [host file]     run a buffer (or host file) on the board
  stop                         stop the running program
  repl                         start an interactive session
  > <text>                     type into the running program
  rm <remote> | mv <from> <to> | mkdir <remote>
  backup [archive]             copy every remote file into a zip archive
  restore <archive>            write every archive entry onto the board
  import <host file> <remote>  | export <remote> <host file>
  example <host dir> <main>    provision an example project
  status | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Maps straight onto a core message.
    Core(Msg),
    Save { name: String, source: Option<PathBuf> },
    Run { name: String, source: Option<PathBuf> },
    Backup { archive: Option<PathBuf> },
    Example { dir: PathBuf, main: String },
    List,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(text) = line.strip_prefix('>') {
        let mut bytes = text.strip_prefix(' ').unwrap_or(text).as_bytes().to_vec();
        bytes.push(b'\r');
        return Ok(Command::Core(Msg::ConsoleInput(bytes)));
    }

    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, args)) = words.split_first() else {
        return Err(CommandError::Empty);
    };

    let command = match (verb, args) {
        ("connect", []) => Command::Core(Msg::ReconnectRequested),
        ("ls", []) => Command::List,
        ("open", [name]) => Command::Core(Msg::OpenRequested {
            name: name.to_string(),
        }),
        ("open", _) => return Err(CommandError::Usage("open <remote>")),
        ("save", [name]) => Command::Save {
            name: name.to_string(),
            source: None,
        },
        ("save", [name, source]) => Command::Save {
            name: name.to_string(),
            source: Some(PathBuf::from(source)),
        },
        ("save", _) => return Err(CommandError::Usage("save <remote> [host file]")),
        ("run", [name]) => Command::Run {
            name: name.to_string(),
            source: None,
        },
        ("run", [name, source]) => Command::Run {
            name: name.to_string(),
            source: Some(PathBuf::from(source)),
        },
        ("run", _) => return Err(CommandError::Usage("run <remote> [host file]")),
        ("stop", []) => Command::Core(Msg::StopRequested),
        ("repl", []) => Command::Core(Msg::InteractiveRequested),
        ("rm", [name]) => Command::Core(Msg::RemoveRequested {
            name: name.to_string(),
        }),
        ("rm", _) => return Err(CommandError::Usage("rm <remote>")),
        ("mv", [from, to]) => Command::Core(Msg::RenameRequested {
            from: from.to_string(),
            to: to.to_string(),
        }),
        ("mv", _) => return Err(CommandError::Usage("mv <from> <to>")),
        ("mkdir", [name]) => Command::Core(Msg::MakeDirRequested {
            name: name.to_string(),
        }),
        ("mkdir", _) => return Err(CommandError::Usage("mkdir <remote>")),
        ("backup", []) => Command::Backup { archive: None },
        ("backup", [archive]) => Command::Backup {
            archive: Some(PathBuf::from(archive)),
        },
        ("backup", _) => return Err(CommandError::Usage("backup [archive]")),
        ("restore", [archive]) => Command::Core(Msg::RestoreRequested {
            archive: PathBuf::from(archive),
        }),
        ("restore", _) => return Err(CommandError::Usage("restore <archive>")),
        ("import", [local, target]) => Command::Core(Msg::ImportRequested {
            local: PathBuf::from(local),
            target: target.to_string(),
        }),
        ("import", _) => return Err(CommandError::Usage("import <host file> <remote>")),
        ("export", [name, local]) => Command::Core(Msg::ExportRequested {
            name: name.to_string(),
            local: PathBuf::from(local),
        }),
        ("export", _) => return Err(CommandError::Usage("export <remote> <host file>")),
        ("example", [dir, main]) => Command::Example {
            dir: PathBuf::from(dir),
            main: main.to_string(),
        },
        ("example", _) => return Err(CommandError::Usage("example <host dir> <main>")),
        ("status", []) => Command::Status,
        ("help", _) => Command::Help,
        ("quit" | "exit", []) => Command::Quit,
        (other, _) => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(command)
}
