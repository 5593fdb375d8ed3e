//! Headless drivers for scripting and CI: no terminal, plain or JSON lines.

use std::io::Write;

use anyhow::{Context, bail};
use tokio::sync::broadcast::{self, error::RecvError};

use lbviz_events::{SimEvent, SimEventKind};
use lbviz_sim::{RunController, SimSnapshot};
use lbviz_types::{Algorithm, Registration, RunConfig, RunOutcome, RunState};

use crate::view::{algorithm_label, target_label};

/// Output format of headless commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Result lines, then a summary.
    #[default]
    Text,
    /// Every controller event as one JSON object per line.
    Json,
}

/// Run one load test to completion (or until Ctrl-C), then print a summary.
///
/// # Errors
/// Fails when the algorithm switch is rejected, the run cannot start, or the
/// output cannot be written.
pub async fn run_load_test<W: Write>(
    controller: &RunController,
    config: RunConfig,
    algorithm: Option<Algorithm>,
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<SimSnapshotSummary> {
    if let Some(algorithm) = algorithm {
        controller
            .switch_algorithm(algorithm)
            .await
            .with_context(|| format!("failed to switch to {}", algorithm.label()))?;
    }

    let mut events = controller.events();
    let ticket = controller
        .start_run(config)
        .await
        .context("failed to start load test")?;
    tracing::info!(
        run_generation = ticket.generation,
        cycles_total = ?ticket.cycles_total,
        interval_ms = ticket.interval.as_millis(),
        "load test started"
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancel_requested = false;

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    write_event(out, &event, mode)?;
                    if let SimEventKind::RunStateChanged {
                        to: RunState::Completed | RunState::Cancelled,
                        ..
                    } = event.kind
                    {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event stream lagged; some lines were not printed");
                    // The terminal transition may be among the skipped events.
                    if !controller.snapshot().run_state.is_running() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut ctrl_c, if !cancel_requested => {
                cancel_requested = true;
                tracing::info!("interrupt received; cancelling load test");
                controller.cancel_run().await?;
            }
        }
    }

    let snapshot = controller.wait_until_idle().await?;
    let summary = SimSnapshotSummary::from_snapshot(&snapshot);
    if mode == OutputMode::Text {
        for line in summary.lines() {
            writeln!(out, "{line}")?;
        }
    }
    Ok(summary)
}

/// Send `count` single requests, one after another.
///
/// # Errors
/// Fails when the controller has shut down or output cannot be written.
/// Failed requests are printed, not returned.
pub async fn send_requests<W: Write>(
    controller: &RunController,
    count: u32,
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut events = controller.events();
    for _ in 0..count {
        let generation = controller.start_single().await?;
        loop {
            let event = next_event(&mut events).await?;
            write_event(out, &event, mode)?;
            match event.kind {
                SimEventKind::CycleApplied { generation: g, .. }
                | SimEventKind::CycleFailed { generation: g, .. }
                | SimEventKind::StaleDiscarded { generation: g }
                    if g == generation =>
                {
                    break;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Add the target `ip{display_index}` (next free index when `None`) and wait
/// for the service's answer.
///
/// # Errors
/// Fails on a duplicate id or a rejected registration.
pub async fn add_target<W: Write>(
    controller: &RunController,
    display_index: Option<u32>,
    mode: OutputMode,
    out: &mut W,
) -> anyhow::Result<()> {
    let mut events = controller.events();
    let target = match display_index {
        Some(index) => controller.add_target(index).await?,
        None => controller.add_next_target().await?,
    };
    loop {
        let event = next_event(&mut events).await?;
        write_event(out, &event, mode)?;
        if let SimEventKind::TargetRegistration { id, confirmed } = &event.kind
            && *id == target.id
        {
            if *confirmed {
                if mode == OutputMode::Text {
                    writeln!(out, "Registered {id}")?;
                }
                return Ok(());
            }
            let reason = controller
                .snapshot()
                .targets
                .iter()
                .find(|t| t.id == target.id)
                .and_then(|t| match &t.registration {
                    Registration::Failed(reason) => Some(reason.clone()),
                    _ => None,
                })
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("failed to register {id}: {reason}");
        }
    }
}

async fn next_event(events: &mut broadcast::Receiver<SimEvent>) -> anyhow::Result<SimEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Ok(event),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged");
            }
            Err(RecvError::Closed) => bail!("run controller has shut down"),
        }
    }
}

fn write_event<W: Write>(out: &mut W, event: &SimEvent, mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Json => writeln!(out, "{}", event.to_json_line()?)?,
        OutputMode::Text => {
            if let SimEventKind::ResultAppended { text } = &event.kind {
                writeln!(out, "{text}")?;
            }
        }
    }
    Ok(())
}

/// Final state of a headless run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSnapshotSummary {
    /// Confirmed algorithm label.
    pub algorithm: String,
    /// How the last run ended.
    pub last_run: Option<RunOutcome>,
    /// `IP{n}: {count}` per target.
    pub targets: Vec<String>,
    /// Result lines kept.
    pub results: usize,
    /// Result lines dropped.
    pub results_evicted: u64,
}

impl SimSnapshotSummary {
    /// Summarize a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: &SimSnapshot) -> Self {
        Self {
            algorithm: algorithm_label(snapshot.algorithm),
            last_run: snapshot.last_run,
            targets: snapshot
                .targets
                .iter()
                .map(|t| target_label(t.display_index, t.selection_count))
                .collect(),
            results: snapshot.results.len(),
            results_evicted: snapshot.results_evicted,
        }
    }

    /// Printable summary.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!("Algorithm: {}", self.algorithm)];
        match self.last_run {
            Some(RunOutcome::Completed { cycles }) => {
                lines.push(format!("Run: completed {cycles} requests"));
            }
            Some(RunOutcome::Cancelled { cycles }) => {
                lines.push(format!("Run: cancelled after {cycles} requests"));
            }
            None => {}
        }
        lines.push(format!("Targets: {}", self.targets.join(", ")));
        if self.results_evicted > 0 {
            lines.push(format!(
                "Results: {} lines ({} dropped)",
                self.results, self.results_evicted
            ));
        } else {
            lines.push(format!("Results: {} lines", self.results));
        }
        lines
    }
}
