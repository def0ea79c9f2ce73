//! Background pass computation
//!
//! One live generation at a time. Submitting a new request drops the
//! receiver of the previous one, so its thread fails on its next send and
//! exits without delivering anything further.

use std::io;
use std::ops::ControlFlow;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::thread;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::engine::{run_request, PassSink};
use super::request::{Pass, PassRequest};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Wall-clock cadence of progress and partial-result messages
    pub flush_interval_ms: u64,
    /// Bound of the result channel
    pub channel_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 100,
            channel_capacity: 64,
        }
    }
}

impl WorkerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassMessageKind {
    /// Monotonic percentage of the scan completed
    Progress(u8),
    /// Passes accepted since the previous batch, unsorted across batches
    Partial(Vec<Pass>),
    /// Every accepted pass, sorted by AOS. Last message of a generation.
    Complete(Vec<Pass>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassMessage {
    pub generation: u64,
    pub kind: PassMessageKind,
}

/// Forwards engine output onto the generation's channel
struct ChannelSink {
    generation: u64,
    sender: SyncSender<PassMessage>,
}

impl ChannelSink {
    fn send(&self, kind: PassMessageKind) -> ControlFlow<()> {
        let message = PassMessage {
            generation: self.generation,
            kind,
        };
        match self.sender.send(message) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }
}

impl PassSink for ChannelSink {
    fn progress(&mut self, percent: u8) -> ControlFlow<()> {
        self.send(PassMessageKind::Progress(percent))
    }

    fn partial(&mut self, passes: Vec<Pass>) -> ControlFlow<()> {
        self.send(PassMessageKind::Partial(passes))
    }
}

struct LiveRun {
    generation: u64,
    receiver: Receiver<PassMessage>,
    _handle: thread::JoinHandle<()>,
}

pub struct PassWorker {
    config: WorkerConfig,
    generation: u64,
    live: Option<LiveRun>,
}

impl PassWorker {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            generation: 0,
            live: None,
        }
    }

    /// Generation of the most recent submission (0 before the first)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the live generation has not yet delivered its final result
    pub fn is_running(&self) -> bool {
        self.live.is_some()
    }

    /// Start scanning `request`, superseding any computation in flight.
    ///
    /// Returns the new generation number.
    pub fn submit(&mut self, request: PassRequest) -> io::Result<u64> {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let flush_interval = self.config.flush_interval();
        let (sender, receiver) = mpsc::sync_channel(self.config.channel_capacity.max(1));

        info!(
            "Pass generation {}: {} objects over {:.2} days",
            generation,
            request.targets.len(),
            request.duration_days
        );

        let handle = thread::Builder::new()
            .name(format!("pass-worker-{}", generation))
            .spawn(move || {
                let mut sink = ChannelSink { generation, sender };
                match run_request(&request, flush_interval, &mut sink) {
                    ControlFlow::Continue(passes) => {
                        let _ = sink.send(PassMessageKind::Complete(passes));
                    }
                    ControlFlow::Break(()) => {
                        debug!("Pass generation {} superseded", generation);
                    }
                }
            })?;

        self.live = Some(LiveRun {
            generation,
            receiver,
            _handle: handle,
        });
        Ok(generation)
    }

    /// Abandon the live generation; it will never deliver a final result
    pub fn cancel(&mut self) {
        if let Some(run) = self.live.take() {
            debug!("Cancelling pass generation {}", run.generation);
        }
    }

    /// Drain whatever the live generation has produced so far
    pub fn poll(&mut self) -> Vec<PassMessage> {
        let mut messages = Vec::new();
        while let Some(run) = &self.live {
            match run.receiver.try_recv() {
                Ok(message) => {
                    let done = matches!(message.kind, PassMessageKind::Complete(_));
                    messages.push(message);
                    if done {
                        self.live = None;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.live = None,
            }
        }
        messages
    }

    /// Wait up to `timeout` for the next message of the live generation
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<PassMessage> {
        let run = self.live.as_ref()?;
        match run.receiver.recv_timeout(timeout) {
            Ok(message) => {
                if matches!(message.kind, PassMessageKind::Complete(_)) {
                    self.live = None;
                }
                Some(message)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.live = None;
                None
            }
        }
    }
}

impl Default for PassWorker {
    fn default() -> Self {
        Self::new(WorkerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::testing::{circular_target, scenario_request};
    use crate::time::Epoch;
    use std::f64::consts::PI;
    use std::time::Instant;

    fn drain(worker: &mut PassWorker) -> Vec<PassMessage> {
        let deadline = Instant::now() + Duration::from_secs(120);
        let mut messages = Vec::new();
        while worker.is_running() && Instant::now() < deadline {
            if let Some(message) = worker.recv_timeout(Duration::from_millis(50)) {
                messages.push(message);
            }
        }
        messages
    }

    #[test]
    fn test_single_generation_completes() {
        let start = Epoch::new(2024, 100.0);
        let mut worker = PassWorker::new(WorkerConfig {
            flush_interval_ms: 0,
            channel_capacity: 4,
        });
        let generation = worker.submit(scenario_request(start, 0.9 * PI)).unwrap();
        assert_eq!(generation, 1);

        let messages = drain(&mut worker);
        assert!(!worker.is_running());

        let complete: Vec<&Vec<Pass>> = messages
            .iter()
            .filter_map(|m| match &m.kind {
                PassMessageKind::Complete(passes) => Some(passes),
                _ => None,
            })
            .collect();
        assert_eq!(complete.len(), 1);
        assert!(matches!(
            messages.last().map(|m| &m.kind),
            Some(PassMessageKind::Complete(_))
        ));

        let streamed: usize = messages
            .iter()
            .map(|m| match &m.kind {
                PassMessageKind::Partial(passes) => passes.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(streamed, complete[0].len());
    }

    #[test]
    fn test_superseded_generation_is_silent() {
        let start = Epoch::new(2024, 100.0);
        let mut worker = PassWorker::default();

        let mut heavy = scenario_request(start, 0.9 * PI);
        heavy.duration_days = 5.0;
        heavy.targets = (0..50)
            .map(|i| circular_target(start, i as f64 * 0.1))
            .collect();
        let first = worker.submit(heavy).unwrap();

        let second = worker.submit(scenario_request(start, 0.9 * PI)).unwrap();
        assert_ne!(first, second);
        assert_eq!(worker.generation(), second);

        let messages = drain(&mut worker);
        assert!(messages.iter().all(|m| m.generation == second));
        let completes = messages
            .iter()
            .filter(|m| matches!(m.kind, PassMessageKind::Complete(_)))
            .count();
        assert_eq!(completes, 1);
    }

    #[test]
    fn test_cancel_stops_delivery() {
        let start = Epoch::new(2024, 100.0);
        let mut worker = PassWorker::default();
        worker.submit(scenario_request(start, 0.9 * PI)).unwrap();
        worker.cancel();
        assert!(!worker.is_running());
        assert!(worker.poll().is_empty());
        assert!(worker.recv_timeout(Duration::from_millis(10)).is_none());
    }
}
