//! lbviz-types - Shared data model for the load balancer visualizer
//!
//! Targets, edges, the mirrored balancing algorithm, run configuration and
//! state, result log entries and the typed form of a distribution decision.
//! Everything here is plain data; the simulation crate owns the mutation rules.

#![allow(clippy::doc_markdown)]

mod error;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use error::{SimError, SimResult, TransportError};

/// Lowest accepted request rate (requests per second).
pub const MIN_RATE_PER_SECOND: f64 = 1.0;
/// Highest accepted request rate (requests per second).
pub const MAX_RATE_PER_SECOND: f64 = 100.0;
/// Duration of the default load test.
pub const DEFAULT_RUN_DURATION_SECS: f64 = 10.0;
/// Size of the initial target pool the decision service is seeded with.
pub const DEFAULT_INITIAL_TARGETS: u32 = 3;

/// Endpoint of an edge in the diagram.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRef {
    /// The load balancer node (`lb`).
    Balancer,
    /// A backend target, by id.
    Target(String),
    /// The downstream service node.
    Service,
}

impl NodeRef {
    /// Diagram node id (`lb`, `ipN`, `service`).
    #[must_use]
    pub fn node_id(&self) -> &str {
        match self {
            Self::Balancer => "lb",
            Self::Target(id) => id,
            Self::Service => "service",
        }
    }
}

/// Connection drawn between two diagram nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Stable edge id (`e-lb-ip1`, `e-ip1-service`).
    pub id: String,
    /// Source node.
    pub from: NodeRef,
    /// Destination node.
    pub to: NodeRef,
}

impl Edge {
    /// The two edges implied by a target: balancer -> target -> service.
    #[must_use]
    pub fn implied_by(target_id: &str) -> [Self; 2] {
        [
            Self {
                id: format!("e-lb-{target_id}"),
                from: NodeRef::Balancer,
                to: NodeRef::Target(target_id.to_string()),
            },
            Self {
                id: format!("e-{target_id}-service"),
                from: NodeRef::Target(target_id.to_string()),
                to: NodeRef::Service,
            },
        ]
    }
}

/// Outcome of registering a target with the decision service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    /// Added locally, remote registration not answered yet.
    Pending,
    /// The decision service knows this target.
    Confirmed,
    /// Registration failed; the target stays in the local topology.
    Failed(String),
}

/// One backend endpoint that can receive a distributed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Immutable, unique id (`ip{display_index}`).
    pub id: String,
    /// Number shown in the diagram label.
    pub display_index: u32,
    /// Cumulative selections as last reported by the decision service.
    pub selection_count: u64,
    /// Marks the most recently selected target.
    pub highlighted: bool,
    /// Remote registration state.
    pub registration: Registration,
}

impl Target {
    /// Id derived from a display index.
    #[must_use]
    pub fn id_for(display_index: u32) -> String {
        format!("ip{display_index}")
    }

    /// Fresh target with zero selections.
    #[must_use]
    pub fn new(display_index: u32, registration: Registration) -> Self {
        Self {
            id: Self::id_for(display_index),
            display_index,
            selection_count: 0,
            highlighted: false,
            registration,
        }
    }
}

/// Balancing algorithm run by the remote decision service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Rotate through targets in order.
    #[default]
    RoundRobin,
    /// Pick uniformly at random.
    Random,
    /// Pick the target with the fewest selections.
    LeastConnections,
}

impl Algorithm {
    /// All algorithms in button order.
    pub const ALL: [Self; 3] = [Self::RoundRobin, Self::Random, Self::LeastConnections];

    /// Path segment used by `/api/set_algorithm/{name}`.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::LeastConnections => "least_connections",
        }
    }

    /// Human label (`round robin`).
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::RoundRobin => "round robin",
            Self::Random => "random",
            Self::LeastConnections => "least connections",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|algo| algo.wire_name() == normalized)
            .ok_or_else(|| format!("unknown algorithm `{s}`"))
    }
}

/// Local mirror of the remote algorithm.
///
/// `confirmed` only changes after the decision service accepted a switch;
/// `pending` holds a requested switch that has not been answered yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlgorithmMirror {
    /// Last algorithm the service acknowledged.
    pub confirmed: Algorithm,
    /// Requested switch still in flight.
    pub pending: Option<Algorithm>,
}

/// Rate and length of a run.
///
/// Only constructible through [`RunConfig::new`], [`RunConfig::continuous`] or
/// deserialization, which all validate; the rate is always within
/// `[MIN_RATE_PER_SECOND, MAX_RATE_PER_SECOND]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRunConfig")]
pub struct RunConfig {
    rate_per_second: f64,
    duration_seconds: Option<f64>,
}

#[derive(Deserialize)]
struct RawRunConfig {
    rate_per_second: f64,
    #[serde(default)]
    duration_seconds: Option<f64>,
}

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = SimError;

    fn try_from(raw: RawRunConfig) -> SimResult<Self> {
        match raw.duration_seconds {
            Some(duration) => Self::new(raw.rate_per_second, duration),
            None => Self::continuous(raw.rate_per_second),
        }
    }
}

impl RunConfig {
    /// Bounded run. The rate is clamped to `[1, 100]`.
    ///
    /// # Errors
    /// Returns `SimError::InvalidRunConfig` for a non-finite rate or a negative
    /// or non-finite duration.
    pub fn new(rate_per_second: f64, duration_seconds: f64) -> SimResult<Self> {
        if !duration_seconds.is_finite() || duration_seconds < 0.0 {
            return Err(SimError::InvalidRunConfig(format!(
                "duration must be a non-negative number of seconds, got {duration_seconds}"
            )));
        }
        Ok(Self {
            rate_per_second: clamp_rate(rate_per_second)?,
            duration_seconds: Some(duration_seconds),
        })
    }

    /// Run that keeps going until cancelled.
    ///
    /// # Errors
    /// Returns `SimError::InvalidRunConfig` for a non-finite rate.
    pub fn continuous(rate_per_second: f64) -> SimResult<Self> {
        Ok(Self {
            rate_per_second: clamp_rate(rate_per_second)?,
            duration_seconds: None,
        })
    }

    /// Requests per second.
    #[must_use]
    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    /// Run length; `None` runs until cancelled.
    #[must_use]
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration_seconds
    }

    /// `floor(duration * rate)`, or `None` for continuous runs.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cycles_total(&self) -> Option<u64> {
        let rate = self.bounded_rate();
        self.duration_seconds
            .map(|duration| (duration * rate).floor().max(0.0) as u64)
    }

    /// Spacing between cycles: `1000 / rate` milliseconds.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.bounded_rate())
    }

    fn bounded_rate(&self) -> f64 {
        if self.rate_per_second.is_finite() {
            self.rate_per_second
                .clamp(MIN_RATE_PER_SECOND, MAX_RATE_PER_SECOND)
        } else {
            MIN_RATE_PER_SECOND
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            rate_per_second: MIN_RATE_PER_SECOND,
            duration_seconds: Some(DEFAULT_RUN_DURATION_SECS),
        }
    }
}

fn clamp_rate(rate_per_second: f64) -> SimResult<f64> {
    if !rate_per_second.is_finite() {
        return Err(SimError::InvalidRunConfig(format!(
            "rate must be a finite number, got {rate_per_second}"
        )));
    }
    Ok(rate_per_second.clamp(MIN_RATE_PER_SECOND, MAX_RATE_PER_SECOND))
}

/// Lifecycle of the run controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// No run in progress.
    #[default]
    Idle,
    /// A run is issuing cycles.
    Running {
        /// Cycles applied so far.
        completed: u64,
        /// Total cycles, `None` for continuous runs.
        total: Option<u64>,
    },
    /// Transient: the run issued all its cycles.
    Completed,
    /// Transient: the run was cancelled.
    Cancelled,
}

impl RunState {
    /// True while a run owns the controller.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// How the last run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// All cycles were issued.
    Completed {
        /// Cycles applied.
        cycles: u64,
    },
    /// Stopped by `cancel_run`.
    Cancelled {
        /// Cycles applied before cancellation.
        cycles: u64,
    },
}

/// Category of a result line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// A decision was applied.
    Success,
    /// A remote call failed.
    Failure,
    /// Informational line (run started, target registered, ...).
    Info,
}

/// Immutable line in the result log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    /// Rendered text.
    pub text: String,
    /// Category.
    pub kind: ResultKind,
    /// Time the entry was created.
    pub at: DateTime<Utc>,
}

impl ResultEntry {
    fn now(kind: ResultKind, text: String) -> Self {
        Self {
            text,
            kind,
            at: Utc::now(),
        }
    }

    /// `Request handled by {ip}. Response: "{message}"`.
    #[must_use]
    pub fn success(target_id: &str, message: &str) -> Self {
        Self::now(
            ResultKind::Success,
            format!("Request handled by {target_id}. Response: \"{message}\""),
        )
    }

    /// `Error: {error}`.
    #[must_use]
    pub fn failure(error: impl fmt::Display) -> Self {
        Self::now(ResultKind::Failure, format!("Error: {error}"))
    }

    /// Free-form informational line.
    #[must_use]
    pub fn info(text: impl Into<String>) -> Self {
        Self::now(ResultKind::Info, text.into())
    }
}

/// One distribution decision returned by the decision service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Selected target (matched case-insensitively against local ids).
    pub target_id: String,
    /// Message returned with the decision.
    pub message: String,
    /// Cumulative selection count per target id.
    pub counts_by_target: HashMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_names_roundtrip() {
        for algo in Algorithm::ALL {
            assert_eq!(algo.wire_name().parse::<Algorithm>(), Ok(algo));
        }
        assert_eq!(
            "Least Connections".parse::<Algorithm>(),
            Ok(Algorithm::LeastConnections)
        );
        assert!("weighted".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_algorithm_label() {
        assert_eq!(Algorithm::RoundRobin.label(), "round robin");
        assert_eq!(Algorithm::default(), Algorithm::RoundRobin);
    }

    #[test]
    fn test_run_config_cycles_and_interval() {
        let config = RunConfig::new(2.0, 5.0).unwrap();
        assert_eq!(config.cycles_total(), Some(10));
        assert_eq!(config.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_run_config_clamps_rate() {
        assert_eq!(RunConfig::new(0.0, 10.0).unwrap().rate_per_second(), 1.0);
        assert_eq!(RunConfig::new(500.0, 1.0).unwrap().rate_per_second(), 100.0);
    }

    #[test]
    fn test_run_config_rejects_bad_duration() {
        assert!(matches!(
            RunConfig::new(1.0, -1.0),
            Err(SimError::InvalidRunConfig(_))
        ));
        assert!(RunConfig::new(f64::NAN, 1.0).is_err());
        assert_eq!(RunConfig::continuous(5.0).unwrap().cycles_total(), None);
    }

    #[test]
    fn test_run_config_deserialize_validates() {
        let config: RunConfig =
            serde_json::from_str(r#"{"rate_per_second":0.0,"duration_seconds":5.0}"#).unwrap();
        assert_eq!(config.rate_per_second(), 1.0);
        assert_eq!(config.cycles_total(), Some(5));
        assert_eq!(config.interval(), Duration::from_secs(1));

        let continuous: RunConfig = serde_json::from_str(r#"{"rate_per_second":250}"#).unwrap();
        assert_eq!(continuous.rate_per_second(), 100.0);
        assert_eq!(continuous.duration_seconds(), None);

        let negative =
            serde_json::from_str::<RunConfig>(r#"{"rate_per_second":2.0,"duration_seconds":-1}"#);
        assert!(negative.is_err());
    }

    #[test]
    fn test_run_config_serializes_back() {
        let config = RunConfig::new(4.0, 2.5).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"rate_per_second":4.0,"duration_seconds":2.5}"#);
        assert_eq!(serde_json::from_str::<RunConfig>(&json).unwrap(), config);
    }

    #[test]
    fn test_edges_implied_by_target() {
        let [inbound, outbound] = Edge::implied_by("ip4");
        assert_eq!(inbound.id, "e-lb-ip4");
        assert_eq!(inbound.from, NodeRef::Balancer);
        assert_eq!(outbound.id, "e-ip4-service");
        assert_eq!(outbound.to.node_id(), "service");
    }

    #[test]
    fn test_result_entry_text() {
        let ok = ResultEntry::success("ip2", "hello");
        assert_eq!(ok.text, "Request handled by ip2. Response: \"hello\"");
        assert_eq!(ok.kind, ResultKind::Success);

        let err = ResultEntry::failure(SimError::DuplicateId("ip1".to_string()));
        assert!(err.text.starts_with("Error: "));
        assert_eq!(err.kind, ResultKind::Failure);
    }
}
