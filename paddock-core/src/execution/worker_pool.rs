//! Live execution worker pool
//!
//! Packages submitted by the dispatcher are pushed onto a bounded crossbeam
//! channel and picked up by a fixed set of worker threads, each calling the
//! `ExchangeClient`. Transient failures are retried with linear back-off up
//! to a hard attempt ceiling. Every package produces exactly one
//! `ExecutionEvent` on the unbounded results channel, which the dispatcher
//! applies between snapshots. Workers never block on a result, so a full
//! submission queue always drains. Orders never cross the thread boundary; packages
//! carry copies of the fields the exchange needs.
//!
//! Shutdown is cooperative: the submission channel is closed, workers drain
//! what was already dispatched, and the pool joins them. A package still
//! retrying when shutdown is requested gives up after its current attempt.

use super::backoff::{BackoffConfig, LinearBackoff};
use super::types::{ExecutionEvent, ExecutionOutcome, InstructionReport};
use super::PackageSink;
use crate::config::LiveConfig;
use crate::core::PaddockError;
use crate::order::OrderPackage;
use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Connection to a real exchange
pub trait ExchangeClient: Send + Sync {
    /// Send one package, returning one report per instruction
    fn execute(&self, package: &OrderPackage) -> Result<Vec<InstructionReport>, PaddockError>;
}

/// Counters shared by the workers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub dispatched: u64,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
}

pub struct WorkerPool {
    sender: Option<Sender<OrderPackage>>,
    events: Receiver<ExecutionEvent>,
    workers: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<PoolStats>>,
}

impl WorkerPool {
    pub fn new(client: Arc<dyn ExchangeClient>, config: &LiveConfig) -> Self {
        Self::with_backoff(client, config.workers, config.queue_capacity, config.backoff())
    }

    pub fn with_backoff(
        client: Arc<dyn ExchangeClient>,
        workers: usize,
        queue_capacity: usize,
        backoff: BackoffConfig,
    ) -> Self {
        let (sender, receiver) = bounded::<OrderPackage>(queue_capacity.max(1));
        let (event_tx, events) = unbounded::<ExecutionEvent>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(Mutex::new(PoolStats::default()));

        let workers = (0..workers.max(1))
            .map(|index| {
                let worker = Worker {
                    index,
                    client: Arc::clone(&client),
                    packages: receiver.clone(),
                    events: event_tx.clone(),
                    backoff: backoff.clone(),
                    shutdown: Arc::clone(&shutdown),
                    stats: Arc::clone(&stats),
                };
                thread::Builder::new()
                    .name(format!("paddock-exec-{index}"))
                    .spawn(move || worker.run())
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(err) => {
                    error!(error = %err, "failed to spawn execution worker");
                    None
                }
            })
            .collect::<Vec<_>>();
        info!(workers = workers.len(), queue_capacity, "execution pool started");

        Self {
            sender: Some(sender),
            events,
            workers,
            shutdown,
            stats,
        }
    }

    /// Events that are ready now
    pub fn poll_events(&self) -> Vec<ExecutionEvent> {
        self.events.try_iter().collect()
    }

    /// Wait up to `timeout` for the next event
    pub fn next_event(&self, timeout: Duration) -> Option<ExecutionEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn stats(&self) -> PoolStats {
        *self.stats.lock()
    }

    /// Packages submitted whose event has not been produced yet
    pub fn in_flight(&self) -> u64 {
        let stats = self.stats.lock();
        stats.dispatched - stats.completed - stats.failed
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Close submission, let dispatched packages finish, join the workers
    ///
    /// Returns the events produced while draining.
    pub fn shutdown(&mut self) -> Vec<ExecutionEvent> {
        self.shutdown.store(true, Ordering::Release);
        self.sender.take();
        // collect results while the workers finish
        let mut drained = Vec::new();
        while !self.workers.iter().all(|h| h.is_finished()) {
            match self.events.recv_timeout(Duration::from_millis(5)) {
                Ok(event) => drained.push(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("execution worker panicked");
            }
        }
        drained.extend(self.poll_events());
        info!(drained = drained.len(), "execution pool stopped");
        drained
    }
}

impl PackageSink for WorkerPool {
    fn submit(&mut self, package: OrderPackage) {
        let Some(sender) = &self.sender else {
            warn!(package_id = %package.id, "pool shut down, package dropped");
            return;
        };
        self.stats.lock().dispatched += 1;
        if let Err(err) = sender.send(package) {
            self.stats.lock().failed += 1;
            error!(package_id = %err.0.id, "execution workers gone, package dropped");
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}

struct Worker {
    index: usize,
    client: Arc<dyn ExchangeClient>,
    packages: Receiver<OrderPackage>,
    events: Sender<ExecutionEvent>,
    backoff: BackoffConfig,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<PoolStats>>,
}

impl Worker {
    fn run(self) {
        debug!(worker = self.index, "execution worker started");
        for package in self.packages.iter() {
            let event = self.execute(package);
            {
                let mut stats = self.stats.lock();
                match event.outcome {
                    ExecutionOutcome::Completed(_) => stats.completed += 1,
                    ExecutionOutcome::Failed(_) => stats.failed += 1,
                }
            }
            if self.events.send(event).is_err() {
                warn!(worker = self.index, "dispatcher gone, stopping");
                break;
            }
        }
        debug!(worker = self.index, "execution worker stopped");
    }

    fn execute(&self, mut package: OrderPackage) -> ExecutionEvent {
        let mut backoff = LinearBackoff::new(self.backoff.clone());
        let outcome = loop {
            package.attempts += 1;
            match self.client.execute(&package) {
                Ok(reports) => break ExecutionOutcome::Completed(reports),
                Err(err) if err.is_transient() => {
                    let delay = match backoff.next_delay() {
                        Some(delay) if !self.shutdown.load(Ordering::Acquire) => delay,
                        _ => {
                            error!(
                                package_id = %package.id,
                                attempts = package.attempts,
                                error = %err,
                                "retries exhausted"
                            );
                            break ExecutionOutcome::Failed(PaddockError::RetryExhausted {
                                package_id: package.id,
                                attempts: package.attempts,
                                last_error: err.to_string(),
                            });
                        }
                    };
                    self.stats.lock().retries += 1;
                    warn!(package_id = %package.id, attempt = package.attempts, ?delay, error = %err, "retrying");
                    thread::sleep(delay);
                }
                Err(err) => {
                    error!(package_id = %package.id, error = %err, "package failed");
                    break ExecutionOutcome::Failed(err);
                }
            }
        };
        ExecutionEvent {
            package_id: package.id,
            market_id: package.market_id.clone(),
            package_type: package.package_type,
            order_ids: package.order_ids().collect(),
            attempts: package.attempts,
            outcome,
        }
    }
}
