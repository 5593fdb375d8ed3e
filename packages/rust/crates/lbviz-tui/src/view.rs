//! Presentation adapter: snapshot -> diagram view model, user intent -> controller.

use std::collections::HashMap;

use lbviz_sim::{RunController, SimSnapshot};
use lbviz_types::{
    Algorithm, AlgorithmMirror, NodeRef, Registration, ResultKind, RunConfig, RunOutcome,
    RunState, SimError,
};

/// Label of the balancer node.
pub const BALANCER_LABEL: &str = "LB";
/// Label of the downstream service node.
pub const SERVICE_LABEL: &str = "Service";

/// Diagram column of a node.
pub const BALANCER_COLUMN: u16 = 0;
/// Column holding every target.
pub const TARGET_COLUMN: u16 = 1;
/// Column of the service node.
pub const SERVICE_COLUMN: u16 = 2;

/// Kind of diagram node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// The load balancer.
    Balancer,
    /// A backend target.
    Target,
    /// The downstream service.
    Service,
}

/// One positioned diagram node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    /// Node id (`lb`, `ipN`, `service`).
    pub id: String,
    /// Rendered label (`IP2: 7`).
    pub label: String,
    /// Node kind.
    pub kind: NodeKind,
    /// Selected by the most recent decision.
    pub highlighted: bool,
    /// Layout column (0 balancer, 1 targets, 2 service).
    pub column: u16,
    /// Layout row; targets sit at `display_index - 1`.
    pub row: u32,
    /// Registration state, targets only.
    pub registration: Option<Registration>,
}

/// Edge between two nodes, by short node name (`LB`, `IP1`, `Service`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeView {
    /// Edge id.
    pub id: String,
    /// Source name.
    pub from: String,
    /// Destination name.
    pub to: String,
}

/// One line of the result panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine {
    /// Text.
    pub text: String,
    /// Category, used for coloring.
    pub kind: ResultKind,
}

/// Header labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderView {
    /// Active algorithm (`round robin`, or `round robin -> random` while a switch is pending).
    pub algorithm: String,
    /// Run button label.
    pub run_button: String,
    /// Rate label.
    pub rate: String,
    /// Outcome of the previous run, if any.
    pub last_run: Option<String>,
}

/// Renderer input built from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramView {
    /// Balancer, targets, service.
    pub nodes: Vec<NodeView>,
    /// Edges in insertion order.
    pub edges: Vec<EdgeView>,
    /// Result lines, oldest first.
    pub results: Vec<ResultLine>,
    /// Lines dropped from the result log.
    pub results_evicted: u64,
    /// Header labels.
    pub header: HeaderView,
    /// Whether a run is active.
    pub running: bool,
}

/// Values the view takes from the UI rather than the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewOptions {
    /// Rate the next run will use.
    pub rate_per_second: f64,
    /// Length the next run will use.
    pub duration_seconds: f64,
}

impl DiagramView {
    /// Build the view model.
    #[must_use]
    pub fn from_snapshot(snapshot: &SimSnapshot, options: &ViewOptions) -> Self {
        let max_row = snapshot
            .targets
            .iter()
            .map(|t| t.display_index.saturating_sub(1))
            .max()
            .unwrap_or(0);
        let middle_row = max_row / 2;

        let mut names: HashMap<&str, String> = HashMap::new();
        names.insert(NodeRef::Balancer.node_id(), BALANCER_LABEL.to_string());
        names.insert(NodeRef::Service.node_id(), SERVICE_LABEL.to_string());

        let mut nodes = Vec::with_capacity(snapshot.targets.len() + 2);
        nodes.push(NodeView {
            id: NodeRef::Balancer.node_id().to_string(),
            label: BALANCER_LABEL.to_string(),
            kind: NodeKind::Balancer,
            highlighted: false,
            column: BALANCER_COLUMN,
            row: middle_row,
            registration: None,
        });
        for target in &snapshot.targets {
            names.insert(target.id.as_str(), format!("IP{}", target.display_index));
            nodes.push(NodeView {
                id: target.id.clone(),
                label: target_label(target.display_index, target.selection_count),
                kind: NodeKind::Target,
                highlighted: target.highlighted,
                column: TARGET_COLUMN,
                row: target.display_index.saturating_sub(1),
                registration: Some(target.registration.clone()),
            });
        }
        nodes.push(NodeView {
            id: NodeRef::Service.node_id().to_string(),
            label: SERVICE_LABEL.to_string(),
            kind: NodeKind::Service,
            highlighted: false,
            column: SERVICE_COLUMN,
            row: middle_row,
            registration: None,
        });

        let name_of = |node: &NodeRef| {
            names
                .get(node.node_id())
                .cloned()
                .unwrap_or_else(|| node.node_id().to_string())
        };
        let edges = snapshot
            .edges
            .iter()
            .map(|edge| EdgeView {
                id: edge.id.clone(),
                from: name_of(&edge.from),
                to: name_of(&edge.to),
            })
            .collect();

        let results = snapshot
            .results
            .iter()
            .map(|entry| ResultLine {
                text: entry.text.clone(),
                kind: entry.kind,
            })
            .collect();

        Self {
            nodes,
            edges,
            results,
            results_evicted: snapshot.results_evicted,
            header: HeaderView {
                algorithm: algorithm_label(snapshot.algorithm),
                run_button: run_button_label(snapshot.run_state, options.duration_seconds),
                rate: format!("{} requests per second", format_number(options.rate_per_second)),
                last_run: snapshot.last_run.map(last_run_label),
            },
            running: snapshot.run_state.is_running(),
        }
    }

    /// Target nodes only, in insertion order.
    pub fn targets(&self) -> impl Iterator<Item = &NodeView> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Target)
    }

    /// Highest row in use.
    #[must_use]
    pub fn max_row(&self) -> u32 {
        self.nodes.iter().map(|n| n.row).max().unwrap_or(0)
    }
}

/// `IP{n}: {count}`.
#[must_use]
pub fn target_label(display_index: u32, selection_count: u64) -> String {
    format!("IP{display_index}: {selection_count}")
}

/// Confirmed algorithm label, or `confirmed -> pending` while a switch is in flight.
#[must_use]
pub fn algorithm_label(mirror: AlgorithmMirror) -> String {
    match mirror.pending {
        Some(pending) if pending != mirror.confirmed => {
            format!("{} -> {}", mirror.confirmed.label(), pending.label())
        }
        _ => mirror.confirmed.label().to_string(),
    }
}

/// `Testing... (3/10)` while running, else `Run {d}s Load Test`.
#[must_use]
pub fn run_button_label(state: RunState, duration_seconds: f64) -> String {
    match state {
        RunState::Running {
            completed,
            total: Some(total),
        } => format!("Testing... ({completed}/{total})"),
        RunState::Running {
            completed,
            total: None,
        } => format!("Testing... ({completed})"),
        _ => format!("Run {}s Load Test", format_number(duration_seconds)),
    }
}

fn last_run_label(outcome: RunOutcome) -> String {
    match outcome {
        RunOutcome::Completed { cycles } => format!("last run: completed {cycles} requests"),
        RunOutcome::Cancelled { cycles } => format!("last run: cancelled after {cycles} requests"),
    }
}

/// Whole numbers without a fraction (`10`), others as-is (`2.5`).
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Action requested from the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserIntent {
    /// Switch the remote algorithm.
    SelectAlgorithm(Algorithm),
    /// One request outside a run.
    SendOnce,
    /// Add the next target.
    AddTarget,
    /// Start a load run.
    StartRun {
        /// Requests per second.
        rate_per_second: f64,
        /// Run length.
        duration_seconds: f64,
    },
    /// Stop the active run.
    CancelRun,
    /// Empty the result log.
    ClearResults,
}

/// Forward `intent` to the controller.
///
/// Returns a status line for the UI: errors, or short confirmations for
/// actions whose effect is not otherwise visible. Never panics.
pub async fn dispatch(controller: &RunController, intent: UserIntent) -> Option<String> {
    tracing::debug!(?intent, "dispatching user intent");
    let outcome = match intent {
        UserIntent::SelectAlgorithm(algorithm) => controller
            .switch_algorithm(algorithm)
            .await
            .map(|()| Some(format!("Algorithm set to {}", algorithm.label()))),
        UserIntent::SendOnce => controller.start_single().await.map(|_| None),
        UserIntent::AddTarget => controller
            .add_next_target()
            .await
            .map(|target| Some(format!("Added {}", target.id))),
        UserIntent::StartRun {
            rate_per_second,
            duration_seconds,
        } => match RunConfig::new(rate_per_second, duration_seconds) {
            Ok(config) => controller.start_run(config).await.map(|_| None),
            Err(error) => Err(error),
        },
        UserIntent::CancelRun => controller.cancel_run().await.map(|cancelled| {
            (!cancelled).then(|| "No load test running".to_string())
        }),
        UserIntent::ClearResults => controller.clear_results().await.map(|()| None),
    };
    match outcome {
        Ok(status) => status,
        Err(error) => Some(intent_error_status(&error)),
    }
}

fn intent_error_status(error: &SimError) -> String {
    match error {
        SimError::AlreadyRunning { completed, total } => match total {
            Some(total) => format!("Load test already running ({completed}/{total})"),
            None => format!("Load test already running ({completed})"),
        },
        other => other.to_string(),
    }
}
