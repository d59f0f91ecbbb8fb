use std::collections::BTreeMap;
use std::io::Write;

use tether_core::{Effect, Msg};
use tether_engine::{EngineHandle, LocalWorkspace};
use tether_logging::{set_op_ticket, tether_debug, tether_info, tether_warn};

use super::render;

/// Carries out core effects: board requests go to the engine, host work runs
/// here, console and editor effects are written to `out`.
pub struct EffectRunner<W: Write> {
    engine: EngineHandle,
    workspace: LocalWorkspace,
    /// Editor buffers by remote name, as last loaded or saved.
    buffers: BTreeMap<String, Vec<u8>>,
    focused: Option<String>,
    out: W,
}

impl<W: Write> EffectRunner<W> {
    pub fn new(engine: EngineHandle, out: W) -> Self {
        Self {
            engine,
            workspace: LocalWorkspace::new(),
            buffers: BTreeMap::new(),
            focused: None,
            out,
        }
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.engine
    }

    pub fn buffer(&self, name: &str) -> Option<&[u8]> {
        self.buffers.get(name).map(Vec::as_slice)
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// Remembers what the user is about to save so the buffer reflects it.
    pub fn stage_buffer(&mut self, name: &str, contents: Vec<u8>) {
        self.buffers.insert(name.to_string(), contents);
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    /// Runs `effects` in order. Host-side completions are returned for the
    /// caller to feed back into `update`.
    pub fn run(&mut self, effects: Vec<Effect>) -> Vec<Msg> {
        let mut immediate = Vec::new();
        for effect in effects {
            if let Some(msg) = self.run_one(effect) {
                immediate.push(msg);
            }
        }
        immediate
    }

    fn run_one(&mut self, effect: Effect) -> Option<Msg> {
        match effect {
            Effect::Issue { ticket, request } => {
                set_op_ticket(Some(ticket));
                tether_debug!("issue {}", request.kind());
                self.engine.execute(ticket, request);
                set_op_ticket(None);
            }
            Effect::Local { ticket, op } => {
                set_op_ticket(Some(ticket));
                let result = self.workspace.execute(op);
                if let Err(failure) = &result {
                    tether_warn!("host step failed: {}", failure);
                }
                set_op_ticket(None);
                return Some(Msg::LocalDone { ticket, result });
            }
            Effect::Interrupt => self.engine.interrupt(),
            Effect::ForceTerminate => self.engine.force_terminate(),
            Effect::ArmStopTimer { generation, after } => {
                self.engine.arm_stop_timer(generation, after)
            }
            Effect::DisarmStopTimer { generation } => self.engine.disarm_stop_timer(generation),
            Effect::SendInput(bytes) => self.engine.send_input(bytes),
            Effect::Connect => self.engine.connect(),
            Effect::DiscardArchive => self.workspace.discard_archive(),
            Effect::ClearConsole => self.print("\n"),
            Effect::AppendConsole { text, style } => {
                self.print(&render::console_text(&text, style))
            }
            Effect::OpenBuffer { name, contents } => {
                self.print(&format!("-- opened {} ({} bytes)\n", name, contents.len()));
                self.buffers.insert(name.clone(), contents);
                self.focused = Some(name);
            }
            Effect::FocusBuffer { name } => {
                self.print(&format!("-- editing {name}\n"));
                self.focused = Some(name);
            }
            Effect::CloseBuffer { name } => {
                self.buffers.remove(&name);
                if self.focused.as_deref() == Some(name.as_str()) {
                    self.focused = None;
                }
            }
            Effect::CloseAllBuffers => {
                self.buffers.clear();
                self.focused = None;
            }
            Effect::RenameBuffer { from, to } => {
                if let Some(contents) = self.buffers.remove(&from) {
                    self.buffers.insert(to.clone(), contents);
                }
                if self.focused.as_deref() == Some(from.as_str()) {
                    self.focused = Some(to);
                }
            }
            Effect::MarkBufferSaved { name } => tether_debug!("buffer {} saved", name),
            Effect::HighlightLine {
                name,
                line,
                message,
            } => {
                tether_info!("highlight {}:{}", name, line);
                self.print(&format!("-- {name}:{line}: {message}\n"));
                self.focused = Some(name);
            }
        }
        None
    }

    fn print(&mut self, text: &str) {
        if let Err(err) = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
        {
            tether_warn!("console write failed: {}", err);
        }
    }
}
