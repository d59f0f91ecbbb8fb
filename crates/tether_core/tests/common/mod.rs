#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Once;

use tether_core::{
    update, AppState, BoardVersion, ChannelFailure, Effect, EntryKind, LocalFailure, LocalOp,
    LocalReply, Msg, RemoteEntry, Reply, Request, RequestKind, Ticket,
};

pub const PORT: &str = "/dev/ttyUSB0";

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(tether_logging::initialize_for_tests);
}

pub fn file(path: &str, size: u64) -> RemoteEntry {
    RemoteEntry {
        path: path.to_string(),
        kind: EntryKind::File { size },
    }
}

pub fn dir(path: &str) -> RemoteEntry {
    RemoteEntry {
        path: path.to_string(),
        kind: EntryKind::Dir,
    }
}

pub fn version() -> BoardVersion {
    BoardVersion {
        release: "1.22.0".to_string(),
        nodename: "esp32".to_string(),
    }
}

pub fn issued(effects: &[Effect]) -> Option<(Ticket, Request)> {
    effects.iter().find_map(|effect| match effect {
        Effect::Issue { ticket, request } => Some((*ticket, request.clone())),
        _ => None,
    })
}

pub fn issued_local(effects: &[Effect]) -> Option<(Ticket, LocalOp)> {
    effects.iter().find_map(|effect| match effect {
        Effect::Local { ticket, op } => Some((*ticket, op.clone())),
        _ => None,
    })
}

/// Completes the request issued in `effects`.
pub fn reply(
    state: AppState,
    effects: &[Effect],
    result: Result<Reply, ChannelFailure>,
) -> (AppState, Vec<Effect>) {
    let (ticket, _) = issued(effects).expect("a request was issued");
    update(state, Msg::RequestDone { ticket, result })
}

/// Runs the connect sequence against a board holding `listing`.
pub fn connected(listing: Vec<RemoteEntry>) -> AppState {
    let (state, effects) = update(
        AppState::new(),
        Msg::Connected {
            port: PORT.to_string(),
        },
    );
    let (state, effects) = reply(state, &effects, Ok(Reply::Version(version())));
    let (state, effects) = reply(state, &effects, Ok(Reply::Listing(listing)));
    assert!(effects.is_empty());
    state
}

/// In-memory board plus host side, executing effects until none remain.
#[derive(Default)]
pub struct Harness {
    pub files: BTreeMap<String, Vec<u8>>,
    pub dirs: BTreeSet<String>,
    pub archives: BTreeMap<PathBuf, Vec<(String, Vec<u8>)>>,
    pub host_files: BTreeMap<PathBuf, Vec<u8>>,
    pub requests: Vec<Request>,
    pub local_ops: Vec<LocalOp>,
    pub other_effects: Vec<Effect>,
    /// The first request of this kind fails with the given message.
    pub fail_once: Option<(RequestKind, String)>,
    writing: Option<PathBuf>,
    reading: Option<PathBuf>,
}

impl Harness {
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        let mut harness = Self::default();
        for (path, bytes) in files {
            harness.files.insert(path.to_string(), bytes.to_vec());
            let mut current = String::new();
            let parts: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            for part in &parts[..parts.len() - 1] {
                current = format!("{current}/{part}");
                harness.dirs.insert(current.clone());
            }
        }
        harness
    }

    pub fn listing(&self) -> Vec<RemoteEntry> {
        let mut entries: Vec<RemoteEntry> = self.dirs.iter().map(|d| dir(d)).collect();
        entries.extend(
            self.files
                .iter()
                .map(|(path, bytes)| file(path, bytes.len() as u64)),
        );
        entries
    }

    pub fn connect(&mut self) -> AppState {
        let (state, effects) = update(
            AppState::new(),
            Msg::Connected {
                port: PORT.to_string(),
            },
        );
        self.drive(state, effects)
    }

    pub fn send(&mut self, state: AppState, msg: Msg) -> AppState {
        let (state, effects) = update(state, msg);
        self.drive(state, effects)
    }

    pub fn drive(&mut self, mut state: AppState, effects: Vec<Effect>) -> AppState {
        let mut queue: VecDeque<Effect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            let msg = match effect {
                Effect::Issue { ticket, request } => {
                    self.requests.push(request.clone());
                    Msg::RequestDone {
                        ticket,
                        result: self.execute(request),
                    }
                }
                Effect::Local { ticket, op } => {
                    self.local_ops.push(op.clone());
                    Msg::LocalDone {
                        ticket,
                        result: self.run_local(op),
                    }
                }
                other => {
                    self.other_effects.push(other);
                    continue;
                }
            };
            let (next, more) = update(state, msg);
            state = next;
            queue.extend(more);
        }
        state
    }

    pub fn archive_names(&self, path: &Path) -> Vec<String> {
        self.archives
            .get(path)
            .map(|entries| entries.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn parent_exists(&self, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some(("", _)) | None => true,
            Some((parent, _)) => self.dirs.contains(parent),
        }
    }

    fn execute(&mut self, request: Request) -> Result<Reply, ChannelFailure> {
        if let Some((kind, message)) = self.fail_once.clone() {
            if kind == request.kind() {
                self.fail_once = None;
                return Err(ChannelFailure::new(message));
            }
        }
        match request {
            Request::GetVersion => Ok(Reply::Version(version())),
            Request::ListDirectory => Ok(Reply::Listing(self.listing())),
            Request::GetFile { name, .. } => match self.files.get(&name) {
                Some(bytes) => Ok(Reply::File {
                    name,
                    bytes: bytes.clone(),
                }),
                None => Err(ChannelFailure::new("OSError: [Errno 2] ENOENT")),
            },
            Request::PutFile { name, bytes } => {
                if !self.parent_exists(&name) {
                    return Err(ChannelFailure::new("OSError: [Errno 2] ENOENT"));
                }
                self.files.insert(name, bytes);
                Ok(Reply::Done)
            }
            Request::Remove { name } => match self.files.remove(&name) {
                Some(_) => Ok(Reply::Done),
                None => Err(ChannelFailure::new("OSError: [Errno 2] ENOENT")),
            },
            Request::Rename { from, to } => match self.files.remove(&from) {
                Some(bytes) => {
                    self.files.insert(to, bytes);
                    Ok(Reply::Done)
                }
                None => Err(ChannelFailure::new("OSError: [Errno 2] ENOENT")),
            },
            Request::MakeDir { name } => {
                if !self.parent_exists(&name) || !self.dirs.insert(name) {
                    return Err(ChannelFailure::new("OSError: [Errno 17] EEXIST"));
                }
                Ok(Reply::Done)
            }
            Request::Run { .. } | Request::StartInteractive => Ok(Reply::Done),
        }
    }

    fn run_local(&mut self, op: LocalOp) -> Result<LocalReply, LocalFailure> {
        match op {
            LocalOp::CreateArchive { path } => {
                self.archives.insert(path.clone(), Vec::new());
                self.writing = Some(path);
                Ok(LocalReply::Done)
            }
            LocalOp::AppendEntry { name, bytes } => {
                let path = self
                    .writing
                    .clone()
                    .ok_or_else(|| LocalFailure::Archive("no archive open".into()))?;
                self.archives.entry(path).or_default().push((name, bytes));
                Ok(LocalReply::Done)
            }
            LocalOp::OpenArchive { path } => match self.archives.get(&path) {
                Some(entries) => {
                    self.reading = Some(path);
                    Ok(LocalReply::Entries(
                        entries.iter().map(|(name, _)| name.clone()).collect(),
                    ))
                }
                None => Err(LocalFailure::Archive("no such archive".into())),
            },
            LocalOp::ReadEntry { name } => self
                .reading
                .as_ref()
                .and_then(|path| self.archives.get(path))
                .and_then(|entries| entries.iter().find(|(entry, _)| *entry == name))
                .map(|(_, bytes)| LocalReply::Data(bytes.clone()))
                .ok_or_else(|| LocalFailure::Archive(format!("no entry {name}"))),
            LocalOp::CloseArchive => {
                self.writing = None;
                self.reading = None;
                Ok(LocalReply::Done)
            }
            LocalOp::ReadHostFile { path } => self
                .host_files
                .get(&path)
                .map(|bytes| LocalReply::Data(bytes.clone()))
                .ok_or_else(|| LocalFailure::HostFile("not found".into())),
            LocalOp::WriteHostFile { path, bytes } => {
                self.host_files.insert(path, bytes);
                Ok(LocalReply::Done)
            }
        }
    }
}
