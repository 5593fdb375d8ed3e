//! Event bus for lbviz simulation events
//!
//! The run controller publishes one event per observable state change; the
//! terminal UI and headless drivers subscribe instead of polling.
//!
//! # Architecture
//!
//! ```text
//! controller actor (single writer)
//!      ↓
//! EventBus.publish() → broadcast::Sender
//!      ↓
//! Fan-out to renderer / headless printer / tests
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use lbviz_types::{Algorithm, RunState};

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SimEventKind {
    /// Run controller moved between states.
    RunStateChanged {
        /// Previous state.
        from: RunState,
        /// New state.
        to: RunState,
    },
    /// A decision was applied to the topology.
    CycleApplied {
        /// Run generation the cycle belongs to.
        generation: u64,
        /// 1-based cycle number within the run; `None` for single sends.
        cycle: Option<u64>,
        /// Selected target id as reported by the service.
        target_id: String,
    },
    /// A decision request failed; the run keeps going.
    CycleFailed {
        /// Run generation the cycle belongs to.
        generation: u64,
        /// 1-based cycle number within the run; `None` for single sends.
        cycle: Option<u64>,
        /// Error text.
        error: String,
    },
    /// A response from a superseded generation was dropped.
    StaleDiscarded {
        /// Generation the response was issued under.
        generation: u64,
    },
    /// A line was added to the result log.
    ResultAppended {
        /// Line text.
        text: String,
    },
    /// The result log was cleared.
    ResultsCleared,
    /// The decision service confirmed an algorithm switch.
    AlgorithmChanged {
        /// Newly confirmed algorithm.
        algorithm: Algorithm,
    },
    /// The decision service refused (or never answered) an algorithm switch.
    AlgorithmRejected {
        /// Requested algorithm.
        requested: Algorithm,
        /// Error text.
        error: String,
    },
    /// A target was added to the local topology.
    TargetAdded {
        /// Target id.
        id: String,
    },
    /// The decision service answered a target registration.
    TargetRegistration {
        /// Target id.
        id: String,
        /// Whether the registration succeeded.
        confirmed: bool,
    },
}

impl SimEventKind {
    /// Short routing topic (`run/state`, `cycle/applied`, ...).
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::RunStateChanged { .. } => "run/state",
            Self::CycleApplied { .. } => "cycle/applied",
            Self::CycleFailed { .. } => "cycle/failed",
            Self::StaleDiscarded { .. } => "cycle/stale",
            Self::ResultAppended { .. } => "results/appended",
            Self::ResultsCleared => "results/cleared",
            Self::AlgorithmChanged { .. } => "algorithm/changed",
            Self::AlgorithmRejected { .. } => "algorithm/rejected",
            Self::TargetAdded { .. } => "topology/added",
            Self::TargetRegistration { .. } => "topology/registration",
        }
    }
}

/// Core event model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    /// Unique event identifier
    pub id: String,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Payload
    pub kind: SimEventKind,
}

impl SimEvent {
    /// Create a new event stamped now.
    #[must_use]
    pub fn new(kind: SimEventKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// One-line JSON form for headless event streams.
    ///
    /// # Errors
    /// Returns the serializer error (not expected for these types).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for SimEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.kind.topic()
        )
    }
}

/// Async event bus
///
/// Uses `tokio::sync::broadcast` channel for:
/// - 1-to-many fan-out
/// - Non-blocking publish
/// - Automatic cleanup on receiver drop
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SimEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Get the bus capacity
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Publish an event to all subscribers
    ///
    /// Returns the number of subscribers who received the event.
    /// Returns 0 if there are no subscribers (not an error).
    pub fn publish(&self, event: SimEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Wrap `kind` in a fresh event and publish it.
    pub fn emit(&self, kind: SimEventKind) -> usize {
        self.publish(SimEvent::new(kind))
    }

    /// Subscribe to all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.tx.subscribe()
    }

    /// Get current subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
