use std::collections::HashMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tether_core::{Request, Ticket};
use tether_logging::{tether_debug, tether_error, tether_info, tether_warn};
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{ChannelEventSink, CommandChannel};
use crate::EngineEvent;

enum EngineCommand {
    Connect,
    Execute { ticket: Ticket, request: Request },
    Interrupt,
    ForceTerminate,
    SendInput(Vec<u8>),
    ArmStopTimer { generation: u64, after: Duration },
    DisarmStopTimer { generation: u64 },
}

/// Runs a [`CommandChannel`] on its own thread and tokio runtime. Commands go
/// in through the handle's methods; results come back as [`EngineEvent`]s.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(channel: Arc<dyn CommandChannel>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    tether_error!("engine runtime failed to start: {}", err);
                    return;
                }
            };
            let mut worker = Worker {
                channel,
                event_tx,
                in_flight: None,
                timers: HashMap::new(),
            };
            while let Ok(command) = cmd_rx.recv() {
                worker.handle(&runtime, command);
            }
            tether_debug!("engine command queue closed");
        });

        Self { cmd_tx, event_rx }
    }

    pub fn connect(&self) {
        self.send(EngineCommand::Connect);
    }

    pub fn execute(&self, ticket: Ticket, request: Request) {
        self.send(EngineCommand::Execute { ticket, request });
    }

    pub fn interrupt(&self) {
        self.send(EngineCommand::Interrupt);
    }

    pub fn force_terminate(&self) {
        self.send(EngineCommand::ForceTerminate);
    }

    pub fn send_input(&self, bytes: Vec<u8>) {
        self.send(EngineCommand::SendInput(bytes));
    }

    /// After `after`, emits `StopDeadlineElapsed { generation }` unless disarmed first.
    pub fn arm_stop_timer(&self, generation: u64, after: Duration) {
        self.send(EngineCommand::ArmStopTimer { generation, after });
    }

    pub fn disarm_stop_timer(&self, generation: u64) {
        self.send(EngineCommand::DisarmStopTimer { generation });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            tether_warn!("engine thread is gone, command dropped");
        }
    }
}

struct Worker {
    channel: Arc<dyn CommandChannel>,
    event_tx: mpsc::Sender<EngineEvent>,
    in_flight: Option<(Ticket, AbortHandle)>,
    timers: HashMap<u64, CancellationToken>,
}

impl Worker {
    fn handle(&mut self, runtime: &tokio::runtime::Runtime, command: EngineCommand) {
        match command {
            EngineCommand::Connect => {
                let channel = self.channel.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    let event = match channel.connect().await {
                        Ok(port) => EngineEvent::Connected { port },
                        Err(failure) => EngineEvent::ConnectFailed {
                            message: failure.to_string(),
                        },
                    };
                    let _ = event_tx.send(event);
                });
            }
            EngineCommand::Execute { ticket, request } => {
                let channel = self.channel.clone();
                let event_tx = self.event_tx.clone();
                let task = runtime.spawn(async move {
                    tether_debug!("executing #{} {}", ticket, request.kind());
                    let sink = ChannelEventSink::new(event_tx.clone());
                    let result = channel.execute(request, &sink).await;
                    if let Err(failure) = &result {
                        tether_info!("request #{} failed: {}", ticket, failure);
                    }
                    let _ = event_tx.send(EngineEvent::RequestDone { ticket, result });
                });
                self.in_flight = Some((ticket, task.abort_handle()));
            }
            EngineCommand::Interrupt => {
                let channel = self.channel.clone();
                runtime.spawn(async move { channel.interrupt().await });
            }
            EngineCommand::ForceTerminate => {
                if let Some((ticket, task)) = self.in_flight.take() {
                    if !task.is_finished() {
                        tether_warn!("aborting request #{}", ticket);
                        task.abort();
                    }
                }
                let channel = self.channel.clone();
                runtime.spawn(async move { channel.force_terminate().await });
            }
            EngineCommand::SendInput(bytes) => {
                let channel = self.channel.clone();
                runtime.spawn(async move { channel.send_input(bytes).await });
            }
            EngineCommand::ArmStopTimer { generation, after } => {
                let token = CancellationToken::new();
                let cancelled = token.clone();
                let event_tx = self.event_tx.clone();
                runtime.spawn(async move {
                    tokio::select! {
                        _ = cancelled.cancelled() => {}
                        _ = tokio::time::sleep(after) => {
                            let _ = event_tx.send(EngineEvent::StopDeadlineElapsed { generation });
                        }
                    }
                });
                prune_timers(&mut self.timers, generation);
                self.timers.insert(generation, token);
            }
            EngineCommand::DisarmStopTimer { generation } => {
                if let Some(token) = self.timers.remove(&generation) {
                    token.cancel();
                }
            }
        }
    }
}

/// Drops timers armed before `generation`, including fired ones that were
/// never disarmed.
fn prune_timers(timers: &mut HashMap<u64, CancellationToken>, generation: u64) {
    timers.retain(|&armed, token| {
        let keep = armed >= generation && !token.is_cancelled();
        if !keep {
            token.cancel();
        }
        keep
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arming_drops_earlier_generations() {
        let mut timers = HashMap::new();
        let fired = CancellationToken::new();
        let disarmed = CancellationToken::new();
        disarmed.cancel();
        timers.insert(1, fired.clone());
        timers.insert(2, disarmed);

        prune_timers(&mut timers, 3);

        assert!(timers.is_empty());
        assert!(fired.is_cancelled());
    }

    #[test]
    fn live_timer_of_the_same_generation_survives() {
        let mut timers = HashMap::new();
        timers.insert(4, CancellationToken::new());

        prune_timers(&mut timers, 4);

        assert_eq!(timers.len(), 1);
    }
}
