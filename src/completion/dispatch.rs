//! Background lanes that run provider work off the controller thread.
//!
//! Each lane is a single thread draining a job queue, so history queries
//! run one at a time in submission order and a slow suggest fetch never
//! holds up the store. Results come back to the controller as
//! [`Envelope`]s on one channel; the controller drains it on its own turn.

use crate::completion::provider::{Envelope, ProviderKind, ProviderReply};
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared flag telling a running job to give up
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A named worker thread with a job queue
#[derive(Debug)]
pub struct WorkerLane {
    name: String,
    tx: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerLane {
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || lane_loop(rx))?;

        log::debug!("Started worker lane {}", name);

        Ok(Self {
            name: name.to_string(),
            tx: Some(tx),
            handle: Some(handle),
        })
    }

    /// Queue a job. Returns false when the lane has shut down.
    fn submit(&self, job: Job) -> bool {
        match &self.tx {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }
}

fn lane_loop(rx: Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        job();
    }
}

impl Drop for WorkerLane {
    fn drop(&mut self) {
        // closing the queue ends the loop once pending jobs ran
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Worker lane {} panicked", self.name);
            }
        }
    }
}

/// Where providers send work and how results find their way back
#[derive(Debug)]
pub struct ReplySink {
    tx: Sender<Envelope>,
    history: WorkerLane,
    network: WorkerLane,
}

impl ReplySink {
    /// Start the lanes. Replies are delivered to the receiver returned
    /// alongside.
    pub fn new() -> Result<(Self, Receiver<Envelope>)> {
        let (tx, rx) = mpsc::channel();
        let sink = Self {
            tx,
            history: WorkerLane::spawn("history-lane")?,
            network: WorkerLane::spawn("network-lane")?,
        };
        Ok((sink, rx))
    }

    /// Run `job` on the history lane. Returns false if it could not be queued.
    pub fn on_history_lane<F>(&self, provider: ProviderKind, token: u64, job: F) -> bool
    where
        F: FnOnce() -> ProviderReply + Send + 'static,
    {
        self.history.submit(self.wrap(provider, token, job))
    }

    /// Run `job` on the network lane. Returns false if it could not be queued.
    pub fn on_network_lane<F>(&self, provider: ProviderKind, token: u64, job: F) -> bool
    where
        F: FnOnce() -> ProviderReply + Send + 'static,
    {
        self.network.submit(self.wrap(provider, token, job))
    }

    /// Deliver `reply` after `delay`
    pub fn after(&self, delay: Duration, provider: ProviderKind, token: u64, reply: ProviderReply) {
        let tx = self.tx.clone();
        let envelope = Envelope {
            provider,
            token,
            reply,
        };

        if delay.is_zero() {
            let _ = tx.send(envelope);
            return;
        }

        let spawned = thread::Builder::new()
            .name("suggest-timer".to_string())
            .spawn(move || {
                thread::sleep(delay);
                // the controller may be gone by now
                let _ = tx.send(envelope);
            });
        if let Err(e) = spawned {
            log::warn!("Failed to start timer for {}: {}", provider.name(), e);
        }
    }

    fn wrap<F>(&self, provider: ProviderKind, token: u64, job: F) -> Job
    where
        F: FnOnce() -> ProviderReply + Send + 'static,
    {
        let tx = self.tx.clone();
        Box::new(move || {
            let reply = job();
            let _ = tx.send(Envelope {
                provider,
                token,
                reply,
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_reply_in_order() {
        let (sink, rx) = ReplySink::new().unwrap();
        for token in 1..=3 {
            assert!(sink.on_history_lane(ProviderKind::HistoryUrl, token, || {
                ProviderReply::PastSearches(Vec::new())
            }));
        }

        let tokens: Vec<u64> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap().token)
            .collect();
        assert_eq!(tokens, vec![1, 2, 3]);
    }

    #[test]
    fn test_timer_delivers_once() {
        let (sink, rx) = ReplySink::new().unwrap();
        sink.after(
            Duration::from_millis(10),
            ProviderKind::Search,
            7,
            ProviderReply::SuggestTimer,
        );

        let envelope = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(envelope.provider, ProviderKind::Search);
        assert_eq!(envelope.token, 7);
        assert!(matches!(envelope.reply, ProviderReply::SuggestTimer));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_canceled());
        flag.cancel();
        assert!(clone.is_canceled());
    }
}
