//! Run controller: single sends, timed load runs, cancellation and the
//! algorithm / topology actions that talk to the decision service.
//!
//! All state lives in one actor task. [`RunController`] is a cheap, cloneable
//! handle: actions go through a command queue and are answered over oneshot
//! channels; state is observed through a `watch` snapshot and the event bus.

mod actor;
mod run;
mod types;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use lbviz_client::DecisionService;
use lbviz_events::{EventBus, SimEvent};
use lbviz_types::{Algorithm, RunConfig, SimError, SimResult, Target};

use actor::ControllerActor;
use types::{Command, Completion};

pub use types::{ControllerConfig, RunTicket, SimSnapshot};

/// Handle to the controller actor.
#[derive(Clone)]
pub struct RunController {
    command_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<Arc<SimSnapshot>>,
    events: EventBus,
}

impl RunController {
    /// Spawn the controller actor on the current runtime.
    #[must_use]
    pub fn start(service: Arc<dyn DecisionService>, mut config: ControllerConfig) -> Self {
        config.command_capacity = config.command_capacity.max(1);
        config.result_capacity = config.result_capacity.max(1);

        let events = EventBus::new(config.event_capacity);
        let (command_tx, command_rx) = mpsc::channel::<Command>(config.command_capacity);
        let (completion_tx, completion_rx) =
            mpsc::channel::<Completion>(config.command_capacity.saturating_mul(2));

        let (actor, snapshot_rx) =
            ControllerActor::new(service, &config, events.clone(), completion_tx);
        tokio::spawn(actor.run(command_rx, completion_rx));

        Self {
            command_tx,
            snapshot_rx,
            events,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> SimResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| SimError::ControllerClosed)?;
        reply_rx.await.map_err(|_| SimError::ControllerClosed)
    }

    /// Issue one decision request outside a run.
    ///
    /// Returns once the request is dispatched; its outcome arrives as a
    /// `CycleApplied` / `CycleFailed` event. The returned value is the
    /// generation the request was tagged with.
    ///
    /// # Errors
    /// `AlreadyRunning` while a run is active; `ControllerClosed` after shutdown.
    pub async fn start_single(&self) -> SimResult<u64> {
        self.request(|reply| Command::StartSingle { reply }).await?
    }

    /// Start a load run. Clears the result log.
    ///
    /// # Errors
    /// `AlreadyRunning` (nothing about the active run changes) or
    /// `ControllerClosed`.
    pub async fn start_run(&self, config: RunConfig) -> SimResult<RunTicket> {
        self.request(|reply| Command::StartRun { config, reply })
            .await?
    }

    /// Stop the active run. Returns false when no run was active.
    ///
    /// A request still in flight is dropped; its result is never applied.
    ///
    /// # Errors
    /// `ControllerClosed` after shutdown.
    pub async fn cancel_run(&self) -> SimResult<bool> {
        self.request(|reply| Command::CancelRun { reply }).await
    }

    /// Ask the decision service to switch algorithms and wait for the answer.
    ///
    /// The mirrored algorithm changes only on success. While waiting, the
    /// snapshot shows the request as pending.
    ///
    /// # Errors
    /// `Transport` when the service refused or could not be reached.
    pub async fn switch_algorithm(&self, algorithm: Algorithm) -> SimResult<()> {
        self.request(|reply| Command::SwitchAlgorithm { algorithm, reply })
            .await?
    }

    /// Add `ip{display_index}` locally and register it with the service in
    /// the background.
    ///
    /// # Errors
    /// `DuplicateId` if the index is taken.
    pub async fn add_target(&self, display_index: u32) -> SimResult<Target> {
        self.request(|reply| Command::AddTarget {
            display_index: Some(display_index),
            reply,
        })
        .await?
    }

    /// Add the next target (`ip{count + 1}`).
    ///
    /// # Errors
    /// `ControllerClosed` after shutdown.
    pub async fn add_next_target(&self) -> SimResult<Target> {
        self.request(|reply| Command::AddTarget {
            display_index: None,
            reply,
        })
        .await?
    }

    /// Empty the result log.
    ///
    /// # Errors
    /// `ControllerClosed` after shutdown.
    pub async fn clear_results(&self) -> SimResult<()> {
        self.request(|reply| Command::ClearResults { reply }).await
    }

    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SimSnapshot> {
        Arc::clone(&self.snapshot_rx.borrow())
    }

    /// Receiver that wakes on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<SimSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Stream of simulation events from now on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    /// Wait until no run is active and return the state at that point.
    ///
    /// # Errors
    /// `ControllerClosed` if the actor stopped while waiting.
    pub async fn wait_until_idle(&self) -> SimResult<Arc<SimSnapshot>> {
        let mut snapshot_rx = self.snapshot_rx.clone();
        let snapshot = snapshot_rx
            .wait_for(|snapshot| !snapshot.run_state.is_running())
            .await
            .map_err(|_| SimError::ControllerClosed)?;
        Ok(Arc::clone(&snapshot))
    }

    /// Cancel any run and stop the actor. Later calls fail with
    /// `ControllerClosed`.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| Command::Shutdown { reply })
            .await
            .is_err()
        {
            tracing::debug!("run controller already stopped");
        }
    }
}
