//! Tether engine: board I/O and host-side effect execution.
mod archive;
mod channel;
mod engine;
mod memory;
mod persist;
mod types;
mod workspace;

pub use archive::{ArchiveError, ArchiveStore};
pub use channel::{BoardEvent, ChannelEventSink, CommandChannel, EventSink};
pub use engine::EngineHandle;
pub use memory::{BoardImage, ImageError, MemoryBoard, RunBehavior};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use types::EngineEvent;
pub use workspace::LocalWorkspace;
