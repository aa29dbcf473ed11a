// src/worker.rs
use std::io;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};

use crate::config::ConfigurationSnapshot;
use crate::pipeline::ChannelPipeline;
use crate::types::{ChannelKind, Sample, ScopeEvent, WorkerCommand};

/// One channel's pipeline running on its own thread.
///
/// Requests queue in a single-consumer inbox; when several are waiting only
/// the newest is processed. The pipeline state is locked for a whole pass, so
/// passes on the same channel never overlap.
pub struct ChannelWorker {
    channel: ChannelKind,
    inbox: Sender<WorkerCommand>,
    state: Arc<Mutex<ChannelPipeline>>,
    handle: Option<JoinHandle<()>>,
}

impl ChannelWorker {
    pub fn spawn(channel: ChannelKind, events: Sender<ScopeEvent>) -> io::Result<Self> {
        let (inbox, rx) = mpsc::channel::<WorkerCommand>();
        let state = Arc::new(Mutex::new(ChannelPipeline::new(channel)));
        let thread_state = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(format!("scope-{:?}", channel).to_lowercase())
            .spawn(move || run(channel, rx, thread_state, events))?;
        Ok(Self {
            channel,
            inbox,
            state,
            handle: Some(handle),
        })
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// Posts a snapshot for processing. Returns `false` if the worker has
    /// already stopped.
    pub fn process(&self, snapshot: Arc<ConfigurationSnapshot>) -> bool {
        self.inbox.send(WorkerCommand::Process(snapshot)).is_ok()
    }

    /// Last successfully computed curve. Waits for an in-flight pass.
    pub fn curve(&self) -> Arc<Vec<Sample>> {
        let pipeline = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(pipeline.curve())
    }

    /// Stops the thread after it finishes any queued pass.
    pub fn shutdown(&mut self) {
        self.inbox.send(WorkerCommand::Shutdown).ok();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("{} worker panicked", self.channel);
            }
        }
    }
}

impl Drop for ChannelWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    channel: ChannelKind,
    rx: Receiver<WorkerCommand>,
    state: Arc<Mutex<ChannelPipeline>>,
    events: Sender<ScopeEvent>,
) {
    info!("{channel} worker started");
    while let Ok(command) = rx.recv() {
        let WorkerCommand::Process(mut snapshot) = command else {
            break;
        };

        // Coalesce: later requests supersede queued ones.
        let mut stop = false;
        loop {
            match rx.try_recv() {
                Ok(WorkerCommand::Process(newer)) => {
                    debug!("{channel}: superseding queued request");
                    snapshot = newer;
                }
                Ok(WorkerCommand::Shutdown) => {
                    stop = true;
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if !run_pass(&state, snapshot, &events) || stop {
            break;
        }
    }
    info!("{channel} worker stopped");
}

/// Processes one snapshot and publishes the results. Returns `false` once
/// nobody is listening any more.
fn run_pass(
    state: &Mutex<ChannelPipeline>,
    snapshot: Arc<ConfigurationSnapshot>,
    events: &Sender<ScopeEvent>,
) -> bool {
    let mut pipeline = state.lock().unwrap_or_else(PoisonError::into_inner);
    let outgoing = match pipeline.process(snapshot) {
        Ok(output) => {
            debug!(
                "{}: {} points, {:.3} Hz",
                output.channel,
                output.samples.len(),
                output.frequency_hz
            );
            output.into_events()
        }
        Err(err) => {
            warn!("{}: {err}", pipeline.channel());
            vec![ScopeEvent::Error(pipeline.describe_error(&err))]
        }
    };
    // Results go out while the lock is still held, so a following pass on
    // this channel cannot publish ahead of them.
    outgoing.into_iter().all(|event| events.send(event).is_ok())
}
