use std::time::Duration;

use tokio::sync::oneshot;

use lbviz_types::{
    Algorithm, AlgorithmMirror, DEFAULT_INITIAL_TARGETS, Decision, Edge, ResultEntry, RunConfig,
    RunOutcome, RunState, SimResult, Target, TransportError,
};

use crate::result_log::DEFAULT_RESULT_LOG_CAPACITY;

/// Settings for [`super::RunController::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Targets seeded at startup (`ip1..=ipN`), assumed known to the service.
    pub initial_targets: u32,
    /// Result log ring size.
    pub result_capacity: usize,
    /// Event bus buffer per subscriber.
    pub event_capacity: usize,
    /// Command queue depth.
    pub command_capacity: usize,
    /// Algorithm the service is assumed to start with.
    pub initial_algorithm: Algorithm,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_targets: DEFAULT_INITIAL_TARGETS,
            result_capacity: DEFAULT_RESULT_LOG_CAPACITY,
            event_capacity: 1024,
            command_capacity: 64,
            initial_algorithm: Algorithm::default(),
        }
    }
}

/// Accepted run, returned by `start_run`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunTicket {
    /// Generation tag of the run.
    pub generation: u64,
    /// Planned cycles; `None` for a continuous run.
    pub cycles_total: Option<u64>,
    /// Pause between a settled cycle and the next request.
    pub interval: Duration,
}

/// Everything a renderer needs, published after each state change.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSnapshot {
    /// Targets in insertion order.
    pub targets: Vec<Target>,
    /// Edges in insertion order.
    pub edges: Vec<Edge>,
    /// Result lines, oldest first.
    pub results: Vec<ResultEntry>,
    /// Result lines dropped by the ring buffer since the last clear.
    pub results_evicted: u64,
    /// Confirmed and pending algorithm.
    pub algorithm: AlgorithmMirror,
    /// Current run state.
    pub run_state: RunState,
    /// Config of the active (or most recent) run.
    pub run_config: Option<RunConfig>,
    /// How the most recent run ended.
    pub last_run: Option<RunOutcome>,
    /// Current generation; responses tagged with anything else are dropped.
    pub generation: u64,
}

pub(super) enum Command {
    StartSingle {
        reply: oneshot::Sender<SimResult<u64>>,
    },
    StartRun {
        config: RunConfig,
        reply: oneshot::Sender<SimResult<RunTicket>>,
    },
    CancelRun {
        reply: oneshot::Sender<bool>,
    },
    SwitchAlgorithm {
        algorithm: Algorithm,
        reply: oneshot::Sender<SimResult<()>>,
    },
    AddTarget {
        display_index: Option<u32>,
        reply: oneshot::Sender<SimResult<Target>>,
    },
    ClearResults {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Settled remote call, routed back to the actor.
pub(super) enum Completion {
    Cycle {
        generation: u64,
        cycle: Option<u64>,
        result: Result<Decision, TransportError>,
    },
    Algorithm {
        requested: Algorithm,
        result: Result<(), TransportError>,
        reply: oneshot::Sender<SimResult<()>>,
    },
    Registration {
        id: String,
        result: Result<(), TransportError>,
    },
}
