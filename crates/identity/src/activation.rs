//! Background activation loop.
//!
//! # Lifecycle
//!
//! ```text
//! Created ──start()──▶ Running ──close()──▶ Closed
//!    └──────────────close()───────────────────▲
//! ```
//!
//! While running, one tokio task ticks on the configured interval. Each tick
//! runs a collection cycle on the blocking pool and hands the record to the
//! [`Submitter`]. Failed cycles are logged and retried on the next tick. The
//! first accepted submission marks the node activated and ends the loop.
//!
//! `close()` signals the task and waits for an in-flight cycle up to the
//! configured close timeout, then aborts the task. Dropping the loop drops
//! the stop channel, which also ends the task.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use nodeinit_core::Config;

use crate::ami::{Ami, AmiRegistry};
use crate::collector::{ActivationRecord, Collector};
use crate::error::{ActivateError, ActivateResult};
use crate::proof::{HostProbe, SystemProbe};

/// Submitter-defined failure.
pub type SubmitError = anyhow::Error;

/// Receives completed records and registers them with the control plane.
pub trait Submitter: Send + Sync {
    fn submit(&self, record: &ActivationRecord) -> Result<(), SubmitError>;
}

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Created,
    Running,
    Closed,
}

enum State {
    Created,
    Running {
        stop_tx: watch::Sender<bool>,
        handle: JoinHandle<()>,
    },
    Closed,
}

/// Periodic collect-and-submit driver.
pub struct ActivationLoop {
    collector: Arc<Collector>,
    submitter: Arc<dyn Submitter>,
    interval: Duration,
    close_timeout: Duration,
    activated: watch::Sender<bool>,
    state: Mutex<State>,
}

impl ActivationLoop {
    /// Build the loop for the configured engine backend.
    ///
    /// Fails before anything is scheduled if the configuration is invalid or
    /// the engine kind has no registered AMI backend.
    pub fn new(
        config: &Config,
        backends: &AmiRegistry,
        submitter: Arc<dyn Submitter>,
    ) -> ActivateResult<Self> {
        config.validate()?;
        let ami = backends.open(&config.engine)?;
        info!(engine = %config.engine.kind, "AMI backend opened");

        Self::with_ami(config, Arc::new(HostProbe::new()), ami, submitter)
    }

    /// Build the loop around an already constructed AMI and system probe.
    pub fn with_ami(
        config: &Config,
        probe: Arc<dyn SystemProbe>,
        ami: Arc<dyn Ami>,
        submitter: Arc<dyn Submitter>,
    ) -> ActivateResult<Self> {
        config.validate()?;

        let fingerprints = config.init.activate.fingerprints.clone();
        for (index, fingerprint) in fingerprints.iter().enumerate() {
            if !fingerprint.proof.is_supported() {
                warn!(
                    index,
                    proof = %fingerprint.proof,
                    "unsupported proof configured; activation cannot succeed until it is fixed"
                );
            }
        }

        let (activated, _) = watch::channel(false);
        Ok(Self {
            collector: Arc::new(Collector::new(fingerprints, probe, ami)),
            submitter,
            interval: config.init.cloud.active.interval(),
            close_timeout: config.init.cloud.active.close_timeout(),
            activated,
            state: Mutex::new(State::Created),
        })
    }

    /// Run one collection cycle on the calling thread.
    pub fn collect(&self) -> ActivateResult<ActivationRecord> {
        self.collector.collect()
    }

    /// Spawn the background loop on the current tokio runtime.
    pub fn start(&self) -> ActivateResult<()> {
        let mut state = self.lock_state();
        match *state {
            State::Created => {}
            State::Running { .. } => {
                warn!("activation loop already running");
                return Ok(());
            }
            State::Closed => {
                return Err(ActivateError::InvalidState(
                    "activation loop is closed".to_string(),
                ))
            }
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            ActivateError::InvalidState(format!("start requires a tokio runtime: {}", e))
        })?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = runtime.spawn(run(
            Arc::clone(&self.collector),
            Arc::clone(&self.submitter),
            self.interval,
            self.activated.clone(),
            stop_rx,
        ));

        *state = State::Running { stop_tx, handle };
        Ok(())
    }

    /// Stop the loop. Idempotent, and safe before `start`.
    pub async fn close(&self) {
        let previous = std::mem::replace(&mut *self.lock_state(), State::Closed);
        let State::Running { stop_tx, mut handle } = previous else {
            return;
        };

        // The task may already have exited after activating.
        let _ = stop_tx.send(true);

        match tokio::time::timeout(self.close_timeout, &mut handle).await {
            Ok(Ok(())) => debug!("activation loop joined"),
            Ok(Err(e)) => warn!("activation loop ended abnormally: {}", e),
            Err(_) => {
                warn!(
                    timeout_ms = self.close_timeout.as_millis() as u64,
                    "in-flight activation cycle outlived close timeout; abandoning it"
                );
                handle.abort();
            }
        }
    }

    pub fn state(&self) -> LoopState {
        match *self.lock_state() {
            State::Created => LoopState::Created,
            State::Running { .. } => LoopState::Running,
            State::Closed => LoopState::Closed,
        }
    }

    pub fn is_activated(&self) -> bool {
        *self.activated.borrow()
    }

    /// Watch for the node becoming activated.
    pub fn activated(&self) -> watch::Receiver<bool> {
        self.activated.subscribe()
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run(
    collector: Arc<Collector>,
    submitter: Arc<dyn Submitter>,
    interval: Duration,
    activated: watch::Sender<bool>,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!(
        interval_ms = interval.as_millis() as u64,
        proofs = collector.fingerprints().len(),
        "activation loop started"
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        let cycle_collector = Arc::clone(&collector);
        let cycle_submitter = Arc::clone(&submitter);
        let cycle = tokio::task::spawn_blocking(move || {
            run_cycle(&cycle_collector, cycle_submitter.as_ref())
        });

        match cycle.await {
            Ok(Ok(record)) => {
                info!(
                    digest = %record.digest(),
                    hostname = %record.node_info.hostname,
                    "node activated"
                );
                activated.send_replace(true);
                break;
            }
            Ok(Err(e)) => {
                warn!(
                    permanent = e.is_permanent(),
                    "activation attempt failed, retrying on next tick: {}", e
                );
            }
            Err(e) => {
                error!("activation cycle task failed: {}", ActivateError::Task(e));
            }
        }
    }

    info!("activation loop stopped");
}

fn run_cycle(collector: &Collector, submitter: &dyn Submitter) -> ActivateResult<ActivationRecord> {
    let record = collector.collect()?;
    submitter.submit(&record).map_err(ActivateError::Submit)?;
    Ok(record)
}
