//! Single owner of all simulation state.
//!
//! Commands and settled remote calls are applied one at a time, so target
//! counts, the result log and the run state are never touched concurrently.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use lbviz_client::DecisionService;
use lbviz_events::{EventBus, SimEventKind};
use lbviz_types::{
    Algorithm, AlgorithmMirror, Decision, Registration, ResultEntry, RunConfig, RunOutcome,
    RunState, SimError, SimResult, Target, TransportError,
};

use crate::result_log::ResultLog;
use crate::topology::TopologyStore;

use super::run::drive_run;
use super::types::{Command, Completion, ControllerConfig, RunTicket, SimSnapshot};

struct ActiveRun {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub(super) struct ControllerActor {
    service: Arc<dyn DecisionService>,
    topology: TopologyStore,
    results: ResultLog,
    algorithm: AlgorithmMirror,
    run_state: RunState,
    run_config: Option<RunConfig>,
    last_run: Option<RunOutcome>,
    generation: u64,
    active_run: Option<ActiveRun>,
    // Switches reach the service one at a time, in request order.
    algorithm_queue: VecDeque<(Algorithm, oneshot::Sender<SimResult<()>>)>,
    algorithm_in_flight: bool,
    events: EventBus,
    snapshot_tx: watch::Sender<Arc<SimSnapshot>>,
    completion_tx: mpsc::Sender<Completion>,
}

impl ControllerActor {
    pub(super) fn new(
        service: Arc<dyn DecisionService>,
        config: &ControllerConfig,
        events: EventBus,
        completion_tx: mpsc::Sender<Completion>,
    ) -> (Self, watch::Receiver<Arc<SimSnapshot>>) {
        let topology = TopologyStore::with_initial_targets(config.initial_targets);
        let results = ResultLog::with_capacity(config.result_capacity);
        let algorithm = AlgorithmMirror {
            confirmed: config.initial_algorithm,
            pending: None,
        };
        let initial = SimSnapshot {
            targets: topology.targets().to_vec(),
            edges: topology.edges().to_vec(),
            results: Vec::new(),
            results_evicted: 0,
            algorithm,
            run_state: RunState::Idle,
            run_config: None,
            last_run: None,
            generation: 0,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(initial));
        let actor = Self {
            service,
            topology,
            results,
            algorithm,
            run_state: RunState::Idle,
            run_config: None,
            last_run: None,
            generation: 0,
            active_run: None,
            algorithm_queue: VecDeque::new(),
            algorithm_in_flight: false,
            events,
            snapshot_tx,
            completion_tx,
        };
        (actor, snapshot_rx)
    }

    pub(super) async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<Command>,
        mut completion_rx: mpsc::Receiver<Completion>,
    ) {
        tracing::debug!(targets = self.topology.len(), "run controller started");
        loop {
            tokio::select! {
                maybe_command = command_rx.recv() => {
                    match maybe_command {
                        Some(Command::Shutdown { reply }) => {
                            self.stop_active_run();
                            let _ = reply.send(());
                            break;
                        }
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
                Some(completion) = completion_rx.recv() => self.handle_completion(completion),
            }
        }
        self.stop_active_run();
        tracing::debug!("run controller stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartSingle { reply } => {
                let _ = reply.send(self.start_single());
            }
            Command::StartRun { config, reply } => {
                let _ = reply.send(self.start_run(config));
            }
            Command::CancelRun { reply } => {
                let _ = reply.send(self.cancel_run());
            }
            Command::SwitchAlgorithm { algorithm, reply } => {
                self.switch_algorithm(algorithm, reply);
            }
            Command::AddTarget {
                display_index,
                reply,
            } => {
                let _ = reply.send(self.add_target(display_index));
            }
            Command::ClearResults { reply } => {
                self.results.clear();
                self.events.emit(SimEventKind::ResultsCleared);
                self.publish_snapshot();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Cycle {
                generation,
                cycle,
                result,
            } => self.apply_cycle(generation, cycle, result),
            Completion::Algorithm {
                requested,
                result,
                reply,
            } => {
                let outcome = self.apply_algorithm(requested, result);
                let _ = reply.send(outcome);
            }
            Completion::Registration { id, result } => self.apply_registration(&id, result),
        }
    }

    fn start_single(&mut self) -> SimResult<u64> {
        if let RunState::Running { completed, total } = self.run_state {
            return Err(SimError::AlreadyRunning { completed, total });
        }
        let generation = self.generation;
        let service = Arc::clone(&self.service);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = service.select_target().await;
            let _ = completion_tx
                .send(Completion::Cycle {
                    generation,
                    cycle: None,
                    result,
                })
                .await;
        });
        tracing::debug!(run_generation = generation, "single request dispatched");
        Ok(generation)
    }

    fn start_run(&mut self, config: RunConfig) -> SimResult<RunTicket> {
        if let RunState::Running { completed, total } = self.run_state {
            return Err(SimError::AlreadyRunning { completed, total });
        }

        self.generation += 1;
        let generation = self.generation;
        let total = config.cycles_total();
        let ticket = RunTicket {
            generation,
            cycles_total: total,
            interval: config.interval(),
        };

        self.results.clear();
        self.events.emit(SimEventKind::ResultsCleared);
        self.topology.clear_highlights();
        self.run_config = Some(config);
        self.last_run = None;
        self.set_run_state(RunState::Running { completed: 0, total });
        tracing::info!(
            run_generation = generation,
            rate_per_second = config.rate_per_second(),
            cycles_total = ?total,
            "load run started"
        );

        if total == Some(0) {
            self.finish_run(RunOutcome::Completed { cycles: 0 });
        } else {
            let cancel = CancellationToken::new();
            let handle = tokio::spawn(drive_run(
                Arc::clone(&self.service),
                generation,
                config,
                cancel.clone(),
                self.completion_tx.clone(),
            ));
            self.active_run = Some(ActiveRun {
                generation,
                cancel,
                handle,
            });
        }

        self.publish_snapshot();
        Ok(ticket)
    }

    fn cancel_run(&mut self) -> bool {
        let RunState::Running { completed, .. } = self.run_state else {
            return false;
        };
        // Anything still in flight for the old generation becomes stale.
        self.generation += 1;
        self.finish_run(RunOutcome::Cancelled { cycles: completed });
        self.publish_snapshot();
        true
    }

    fn switch_algorithm(&mut self, algorithm: Algorithm, reply: oneshot::Sender<SimResult<()>>) {
        self.algorithm.pending = Some(algorithm);
        self.algorithm_queue.push_back((algorithm, reply));
        self.publish_snapshot();
        if self.algorithm_in_flight {
            tracing::debug!(
                %algorithm,
                queued = self.algorithm_queue.len(),
                "algorithm switch queued behind an unanswered switch"
            );
        } else {
            self.issue_next_algorithm();
        }
    }

    fn issue_next_algorithm(&mut self) {
        let Some((algorithm, reply)) = self.algorithm_queue.pop_front() else {
            return;
        };
        self.algorithm_in_flight = true;
        let service = Arc::clone(&self.service);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = service.set_algorithm(algorithm).await;
            let _ = completion_tx
                .send(Completion::Algorithm {
                    requested: algorithm,
                    result,
                    reply,
                })
                .await;
        });
    }

    fn add_target(&mut self, display_index: Option<u32>) -> SimResult<Target> {
        let display_index =
            display_index.unwrap_or_else(|| self.topology.next_display_index());
        let target = match self.topology.add_target(display_index) {
            Ok(target) => target,
            Err(error) => {
                tracing::warn!(display_index, %error, "target not added");
                return Err(error);
            }
        };
        self.events.emit(SimEventKind::TargetAdded {
            id: target.id.clone(),
        });
        self.publish_snapshot();

        let service = Arc::clone(&self.service);
        let completion_tx = self.completion_tx.clone();
        let id = target.id.clone();
        tokio::spawn(async move {
            let result = service.register_target(&id).await;
            let _ = completion_tx
                .send(Completion::Registration { id, result })
                .await;
        });
        Ok(target)
    }

    fn apply_cycle(
        &mut self,
        generation: u64,
        cycle: Option<u64>,
        result: Result<Decision, TransportError>,
    ) {
        if generation != self.generation || (cycle.is_some() && !self.run_state.is_running()) {
            tracing::debug!(
                run_generation = generation,
                current = self.generation,
                ?cycle,
                "stale decision discarded"
            );
            self.events.emit(SimEventKind::StaleDiscarded { generation });
            return;
        }

        match result {
            Ok(decision) => {
                let matched = self
                    .topology
                    .apply_decision(&decision.target_id, &decision.counts_by_target);
                if !matched {
                    tracing::warn!(target_id = %decision.target_id, "decision names an unknown target");
                }
                self.append_result(ResultEntry::success(&decision.target_id, &decision.message));
                self.events.emit(SimEventKind::CycleApplied {
                    generation,
                    cycle,
                    target_id: decision.target_id,
                });
            }
            Err(error) => {
                tracing::warn!(
                    run_generation = generation,
                    ?cycle,
                    %error,
                    "decision request failed"
                );
                self.append_result(ResultEntry::failure(&error));
                self.events.emit(SimEventKind::CycleFailed {
                    generation,
                    cycle,
                    error: error.to_string(),
                });
            }
        }

        if cycle.is_some()
            && let RunState::Running { completed, total } = self.run_state
        {
            let completed = completed + 1;
            self.set_run_state(RunState::Running { completed, total });
            if total.is_some_and(|total| completed >= total) {
                self.finish_run(RunOutcome::Completed { cycles: completed });
            }
        }
        self.publish_snapshot();
    }

    fn apply_algorithm(
        &mut self,
        requested: Algorithm,
        result: Result<(), TransportError>,
    ) -> SimResult<()> {
        self.algorithm_in_flight = false;
        self.algorithm.pending = self.algorithm_queue.back().map(|(queued, _)| *queued);
        let outcome = match result {
            Ok(()) => {
                self.algorithm.confirmed = requested;
                tracing::info!(algorithm = %requested, "balancing algorithm switched");
                self.events
                    .emit(SimEventKind::AlgorithmChanged { algorithm: requested });
                Ok(())
            }
            Err(error) => {
                tracing::warn!(algorithm = %requested, %error, "algorithm switch failed");
                self.append_result(ResultEntry::failure(format!(
                    "failed to switch to {}: {error}",
                    requested.label()
                )));
                self.events.emit(SimEventKind::AlgorithmRejected {
                    requested,
                    error: error.to_string(),
                });
                Err(SimError::Transport(error))
            }
        };
        self.publish_snapshot();
        self.issue_next_algorithm();
        outcome
    }

    fn apply_registration(&mut self, id: &str, result: Result<(), TransportError>) {
        let confirmed = result.is_ok();
        let registration = match result {
            Ok(()) => {
                tracing::info!(target_id = id, "target registered");
                Registration::Confirmed
            }
            Err(error) => {
                tracing::warn!(target_id = id, %error, "target registration failed");
                self.append_result(ResultEntry::failure(format!(
                    "failed to register {id}: {error}"
                )));
                Registration::Failed(error.to_string())
            }
        };
        self.topology.set_registration(id, registration);
        // Subscribers reacting to the event must already see the new state.
        self.publish_snapshot();
        self.events.emit(SimEventKind::TargetRegistration {
            id: id.to_string(),
            confirmed,
        });
    }

    /// Leave `Running` through the transient terminal state into `Idle`.
    fn finish_run(&mut self, outcome: RunOutcome) {
        self.stop_active_run();
        let (terminal, line) = match outcome {
            RunOutcome::Completed { cycles } => (
                RunState::Completed,
                format!("Load test completed: {cycles} requests"),
            ),
            RunOutcome::Cancelled { cycles } => (
                RunState::Cancelled,
                format!("Load test cancelled after {cycles} requests"),
            ),
        };
        tracing::info!(run_generation = self.generation, ?outcome, "load run finished");
        self.last_run = Some(outcome);
        self.append_result(ResultEntry::info(line));
        self.set_run_state(terminal);
        self.set_run_state(RunState::Idle);
    }

    fn stop_active_run(&mut self) {
        if let Some(active) = self.active_run.take() {
            active.cancel.cancel();
            tracing::trace!(
                run_generation = active.generation,
                finished = active.handle.is_finished(),
                "run task signalled to stop"
            );
        }
    }

    fn set_run_state(&mut self, to: RunState) {
        let from = self.run_state;
        if from == to {
            return;
        }
        self.run_state = to;
        self.events.emit(SimEventKind::RunStateChanged { from, to });
    }

    fn append_result(&mut self, entry: ResultEntry) {
        let text = entry.text.clone();
        self.results.append(entry);
        self.events.emit(SimEventKind::ResultAppended { text });
    }

    fn publish_snapshot(&self) {
        let snapshot = SimSnapshot {
            targets: self.topology.targets().to_vec(),
            edges: self.topology.edges().to_vec(),
            results: self.results.snapshot(),
            results_evicted: self.results.evicted(),
            algorithm: self.algorithm,
            run_state: self.run_state,
            run_config: self.run_config,
            last_run: self.last_run,
            generation: self.generation,
        };
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}
