//! A board simulated in memory, for tests and for running the console
//! front end without hardware.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::pin::pin;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tether_core::{
    BoardVersion, ChannelFailure, EntryKind, Progress, RemoteEntry, Reply, Request, RequestKind,
    CURRENT_SCRIPT,
};
use tether_logging::{tether_debug, tether_info};
use thiserror::Error;
use tokio::sync::Notify;

use crate::channel::{BoardEvent, CommandChannel, EventSink};

const ENOENT: &str = "OSError: [Errno 2] ENOENT";
const EEXIST: &str = "OSError: [Errno 17] EEXIST";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid board image: {0}")]
    Json(#[from] serde_json::Error),
}

/// File system contents and identity of a simulated board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardImage {
    pub release: String,
    pub nodename: String,
    #[serde(default)]
    pub dirs: BTreeSet<String>,
    #[serde(default)]
    pub files: BTreeMap<String, Vec<u8>>,
}

impl Default for BoardImage {
    fn default() -> Self {
        Self {
            release: "1.22.0".to_string(),
            nodename: "esp32".to_string(),
            dirs: BTreeSet::new(),
            files: BTreeMap::new(),
        }
    }
}

impl BoardImage {
    pub fn from_json(text: &str) -> Result<Self, ImageError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ImageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ImageError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    /// Adds a file and every directory above it.
    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        let mut current = String::new();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        for part in parts.iter().take(parts.len().saturating_sub(1)) {
            current.push('/');
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
        self.files.insert(format!("/{}", parts.join("/")), bytes.to_vec());
        self
    }

    fn parent_exists(&self, path: &str) -> bool {
        match path.rsplit_once('/') {
            Some(("", _)) | None => true,
            Some((parent, _)) => self.dirs.contains(parent),
        }
    }

    /// Moves directory `from` and everything below it to `to`.
    fn move_dir(&mut self, from: &str, to: &str) {
        let prefix = format!("{from}/");
        let moved = |path: &str| -> Option<String> {
            if path == from {
                Some(to.to_string())
            } else {
                path.strip_prefix(&prefix).map(|rest| format!("{to}/{rest}"))
            }
        };

        let dirs: Vec<String> = self.dirs.iter().filter(|d| moved(d.as_str()).is_some()).cloned().collect();
        for dir in dirs {
            self.dirs.remove(&dir);
            if let Some(target) = moved(&dir) {
                self.dirs.insert(target);
            }
        }
        let files: Vec<String> = self.files.keys().filter(|f| moved(f.as_str()).is_some()).cloned().collect();
        for file in files {
            if let (Some(bytes), Some(target)) = (self.files.remove(&file), moved(&file)) {
                self.files.insert(target, bytes);
            }
        }
    }

    fn listing(&self) -> Vec<RemoteEntry> {
        let dirs = self.dirs.iter().map(|dir| RemoteEntry {
            path: dir.clone(),
            kind: EntryKind::Dir,
        });
        let files = self.files.iter().map(|(path, bytes)| RemoteEntry {
            path: path.clone(),
            kind: EntryKind::File {
                size: bytes.len() as u64,
            },
        });
        dirs.chain(files).collect()
    }
}

/// How a simulated program reacts to a graceful stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunBehavior {
    /// Finishes right after printing its output.
    #[default]
    Complete,
    /// Runs until interrupted, then reports a keyboard interrupt.
    UntilInterrupted,
    /// Never stops on its own or on interrupt.
    IgnoreInterrupt,
}

struct BoardState {
    image: BoardImage,
    connected: bool,
    reachable: bool,
    fail_next: Option<(RequestKind, String)>,
    run_behavior: RunBehavior,
    run_output: Vec<u8>,
    run_error: Option<String>,
    requests: Vec<RequestKind>,
    interrupts: u32,
    terminations: u32,
    input: Vec<u8>,
}

pub struct MemoryBoard {
    port: String,
    state: Mutex<BoardState>,
    interrupted: Notify,
}

impl MemoryBoard {
    pub fn new(port: impl Into<String>, image: BoardImage) -> Self {
        Self {
            port: port.into(),
            state: Mutex::new(BoardState {
                image,
                connected: false,
                reachable: true,
                fail_next: None,
                run_behavior: RunBehavior::Complete,
                run_output: Vec::new(),
                run_error: None,
                requests: Vec::new(),
                interrupts: 0,
                terminations: 0,
                input: Vec::new(),
            }),
            interrupted: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn image(&self) -> BoardImage {
        self.lock().image.clone()
    }

    pub fn requests(&self) -> Vec<RequestKind> {
        self.lock().requests.clone()
    }

    pub fn interrupts(&self) -> u32 {
        self.lock().interrupts
    }

    pub fn terminations(&self) -> u32 {
        self.lock().terminations
    }

    pub fn input(&self) -> Vec<u8> {
        self.lock().input.clone()
    }

    /// The next request of `kind` fails with `message`.
    pub fn fail_next(&self, kind: RequestKind, message: impl Into<String>) {
        self.lock().fail_next = Some((kind, message.into()));
    }

    pub fn set_run_behavior(&self, behavior: RunBehavior) {
        self.lock().run_behavior = behavior;
    }

    /// Output every run prints before it ends.
    pub fn set_run_output(&self, output: &[u8]) {
        self.lock().run_output = output.to_vec();
    }

    /// Error text every run prints, making it fail.
    pub fn set_run_error(&self, text: Option<String>) {
        self.lock().run_error = text;
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Drops the link; the next request reports the loss.
    pub fn unplug(&self) {
        self.lock().connected = false;
    }

    fn apply(&self, request: Request, sink: &dyn EventSink) -> Result<Reply, ChannelFailure> {
        let mut state = self.lock();
        let image = &mut state.image;
        match request {
            Request::GetVersion => Ok(Reply::Version(BoardVersion {
                release: image.release.clone(),
                nodename: image.nodename.clone(),
            })),
            Request::ListDirectory => Ok(Reply::Listing(image.listing())),
            Request::GetFile { name, .. } => {
                let bytes = image
                    .files
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| ChannelFailure::new(ENOENT))?;
                sink.emit(BoardEvent::Progress(Progress::Percent(100)));
                Ok(Reply::File { name, bytes })
            }
            Request::PutFile { name, bytes } => {
                if !image.parent_exists(&name) || image.dirs.contains(&name) {
                    return Err(ChannelFailure::new(ENOENT));
                }
                sink.emit(BoardEvent::Progress(Progress::Percent(100)));
                image.files.insert(name, bytes);
                Ok(Reply::Done)
            }
            Request::Remove { name } => {
                if image.files.remove(&name).is_some() {
                    return Ok(Reply::Done);
                }
                let prefix = format!("{name}/");
                let occupied = image.files.keys().any(|path| path.starts_with(&prefix))
                    || image.dirs.iter().any(|dir| dir.starts_with(&prefix));
                if occupied || !image.dirs.remove(&name) {
                    return Err(ChannelFailure::new(ENOENT));
                }
                Ok(Reply::Done)
            }
            Request::Rename { from, to } => {
                if image.dirs.contains(&to) || image.files.contains_key(&to) {
                    return Err(ChannelFailure::new(EEXIST));
                }
                if !image.parent_exists(&to) {
                    return Err(ChannelFailure::new(ENOENT));
                }
                if let Some(bytes) = image.files.remove(&from) {
                    image.files.insert(to, bytes);
                    return Ok(Reply::Done);
                }
                if !image.dirs.contains(&from) {
                    return Err(ChannelFailure::new(ENOENT));
                }
                image.move_dir(&from, &to);
                Ok(Reply::Done)
            }
            Request::MakeDir { name } => {
                if image.dirs.contains(&name) || image.files.contains_key(&name) {
                    return Err(ChannelFailure::new(EEXIST));
                }
                if !image.parent_exists(&name) {
                    return Err(ChannelFailure::new(ENOENT));
                }
                image.dirs.insert(name);
                Ok(Reply::Done)
            }
            Request::Run { .. } | Request::StartInteractive => {
                Err(ChannelFailure::new("long-running request routed as a file request"))
            }
        }
    }

    async fn run(&self, sink: &dyn EventSink) -> Result<Reply, ChannelFailure> {
        // Registered before the program is reported running, so an interrupt
        // sent in response is never missed.
        let mut interrupted = pin!(self.interrupted.notified());
        interrupted.as_mut().enable();
        sink.emit(BoardEvent::CodeDownloaded);
        let (behavior, output, error) = {
            let state = self.lock();
            (state.run_behavior, state.run_output.clone(), state.run_error.clone())
        };
        if !output.is_empty() {
            sink.emit(BoardEvent::ConsoleOutput(output));
        }
        match behavior {
            RunBehavior::Complete => {}
            RunBehavior::UntilInterrupted => {
                interrupted.await;
                sink.emit(BoardEvent::ErrorText(format!(
                    "Traceback (most recent call last):\r\n  File \"{CURRENT_SCRIPT}\", line 1, in <module>\r\nKeyboardInterrupt: \r\n"
                )));
                return Err(ChannelFailure::new("interrupted"));
            }
            RunBehavior::IgnoreInterrupt => std::future::pending::<()>().await,
        }
        match error {
            Some(text) => {
                sink.emit(BoardEvent::ErrorText(text));
                Err(ChannelFailure::new("program raised an exception"))
            }
            None => Ok(Reply::Done),
        }
    }

    async fn interactive(&self, sink: &dyn EventSink) -> Result<Reply, ChannelFailure> {
        let mut interrupted = pin!(self.interrupted.notified());
        interrupted.as_mut().enable();
        sink.emit(BoardEvent::InteractiveStarted);
        let behavior = self.lock().run_behavior;
        if behavior == RunBehavior::IgnoreInterrupt {
            std::future::pending::<()>().await;
        }
        interrupted.await;
        Ok(Reply::Done)
    }
}

#[async_trait::async_trait]
impl CommandChannel for MemoryBoard {
    async fn connect(&self) -> Result<String, ChannelFailure> {
        let mut state = self.lock();
        if !state.reachable {
            return Err(ChannelFailure::new(format!("no board answered on {}", self.port)));
        }
        state.connected = true;
        tether_info!("memory board connected on {}", self.port);
        Ok(self.port.clone())
    }

    async fn execute(
        &self,
        request: Request,
        sink: &dyn EventSink,
    ) -> Result<Reply, ChannelFailure> {
        let kind = request.kind();
        {
            let mut state = self.lock();
            state.requests.push(kind);
            if !state.connected {
                drop(state);
                sink.emit(BoardEvent::ConnectionLost);
                return Err(ChannelFailure::new("board not connected"));
            }
            if state.fail_next.as_ref().is_some_and(|(failing, _)| *failing == kind) {
                if let Some((_, message)) = state.fail_next.take() {
                    return Err(ChannelFailure::new(message));
                }
            }
        }
        tether_debug!("memory board handles {}", kind);
        match request {
            Request::Run { .. } => self.run(sink).await,
            Request::StartInteractive => self.interactive(sink).await,
            other => self.apply(other, sink),
        }
    }

    async fn interrupt(&self) {
        self.lock().interrupts += 1;
        self.interrupted.notify_waiters();
    }

    async fn force_terminate(&self) {
        self.lock().terminations += 1;
    }

    async fn send_input(&self, bytes: Vec<u8>) {
        self.lock().input.extend(bytes);
    }
}
