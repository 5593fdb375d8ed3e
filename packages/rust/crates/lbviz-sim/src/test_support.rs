//! Scripted decision service for controller and UI tests.
//!
//! Rotates through a fixed list of targets (cumulative counts, like the real
//! service's round robin) unless a response has been queued explicitly. Each
//! call can be delayed so tests under a paused clock can observe in-flight
//! behavior.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use lbviz_client::{DecisionService, GET_IP_PATH};
use lbviz_types::{Algorithm, Decision, TransportError};

#[derive(Debug, Default)]
struct Script {
    targets: Vec<String>,
    counts: HashMap<String, u64>,
    next: usize,
    queued: VecDeque<Result<Decision, TransportError>>,
    delays: HashMap<usize, Duration>,
    algorithm_delays: HashMap<Algorithm, Duration>,
    remote_algorithm: Option<Algorithm>,
    algorithm_error: Option<TransportError>,
    register_error: Option<TransportError>,
    registered: Vec<String>,
    algorithms: Vec<Algorithm>,
    spans: Vec<(Instant, Instant)>,
}

/// In-memory [`DecisionService`] with call accounting.
#[derive(Debug, Default)]
pub struct ScriptedDecisionService {
    script: Mutex<Script>,
    default_delay: Mutex<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    switches_in_flight: AtomicUsize,
    max_switches_in_flight: AtomicUsize,
}

impl ScriptedDecisionService {
    /// Service that rotates over `ip1..=ip{count}`.
    #[must_use]
    pub fn rotating(count: u32) -> Self {
        let service = Self::default();
        if let Ok(mut script) = service.script.lock() {
            script.targets = (1..=count).map(|n| format!("ip{n}")).collect();
            script.counts = script.targets.iter().map(|id| (id.clone(), 0)).collect();
        }
        service
    }

    /// Delay applied to every `select_target` call.
    #[must_use]
    pub fn with_delay(self, delay: Duration) -> Self {
        if let Ok(mut default_delay) = self.default_delay.lock() {
            *default_delay = delay;
        }
        self
    }

    /// Delay only the `call`-th `select_target` call (1-based).
    #[must_use]
    pub fn with_call_delay(self, call: usize, delay: Duration) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.delays.insert(call, delay);
        }
        self
    }

    /// Delay the answer to every `set_algorithm(algorithm)` call. The switch
    /// takes effect remotely on arrival; only the answer is late.
    #[must_use]
    pub fn with_algorithm_delay(self, algorithm: Algorithm, delay: Duration) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.algorithm_delays.insert(algorithm, delay);
        }
        self
    }

    /// Answer the next `select_target` call with `response` instead of rotating.
    pub fn push_response(&self, response: Result<Decision, TransportError>) {
        if let Ok(mut script) = self.script.lock() {
            script.queued.push_back(response);
        }
    }

    /// Make every `set_algorithm` call fail with `error`.
    #[must_use]
    pub fn failing_algorithm_switch(self, error: TransportError) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.algorithm_error = Some(error);
        }
        self
    }

    /// Make every `register_target` call fail with `error`.
    #[must_use]
    pub fn failing_registration(self, error: TransportError) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.register_error = Some(error);
        }
        self
    }

    /// `select_target` calls started so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding `select_target` calls.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// `(start, end)` of every completed `select_target` call, in completion order.
    #[must_use]
    pub fn spans(&self) -> Vec<(Instant, Instant)> {
        self.script
            .lock()
            .map(|script| script.spans.clone())
            .unwrap_or_default()
    }

    /// Targets passed to `register_target`.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        self.script
            .lock()
            .map(|script| script.registered.clone())
            .unwrap_or_default()
    }

    /// Algorithms passed to `set_algorithm`.
    #[must_use]
    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.script
            .lock()
            .map(|script| script.algorithms.clone())
            .unwrap_or_default()
    }

    /// Algorithm the service is running after the last accepted switch.
    #[must_use]
    pub fn remote_algorithm(&self) -> Option<Algorithm> {
        self.script
            .lock()
            .ok()
            .and_then(|script| script.remote_algorithm)
    }

    /// Highest number of simultaneously unanswered `set_algorithm` calls.
    #[must_use]
    pub fn max_switches_in_flight(&self) -> usize {
        self.max_switches_in_flight.load(Ordering::SeqCst)
    }

    /// Sleep (on the tokio clock) until at least `n` calls have started.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    fn next_response(&self) -> Result<Decision, TransportError> {
        let Ok(mut script) = self.script.lock() else {
            return Err(TransportError::Network {
                endpoint: GET_IP_PATH.to_string(),
                message: "script poisoned".to_string(),
            });
        };
        if let Some(queued) = script.queued.pop_front() {
            return queued;
        }
        if script.targets.is_empty() {
            return Err(TransportError::Network {
                endpoint: GET_IP_PATH.to_string(),
                message: "no targets".to_string(),
            });
        }
        let index = script.next % script.targets.len();
        let id = script.targets[index].clone();
        script.next += 1;
        *script.counts.entry(id.clone()).or_default() += 1;
        Ok(Decision {
            target_id: id,
            message: "hello".to_string(),
            counts_by_target: script.counts.clone(),
        })
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DecisionService for ScriptedDecisionService {
    async fn select_target(&self) -> Result<Decision, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        // Dropped calls (cancelled runs) still leave the in-flight count.
        let _in_flight = InFlightGuard(&self.in_flight);
        let started = Instant::now();

        let delay = self
            .script
            .lock()
            .ok()
            .and_then(|script| script.delays.get(&call).copied())
            .or_else(|| self.default_delay.lock().ok().map(|delay| *delay))
            .unwrap_or_default();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let response = self.next_response();
        if let Ok(mut script) = self.script.lock() {
            script.spans.push((started, Instant::now()));
        }
        response
    }

    async fn set_algorithm(&self, algorithm: Algorithm) -> Result<(), TransportError> {
        let now_in_flight = self.switches_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_switches_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        let _in_flight = InFlightGuard(&self.switches_in_flight);

        let (result, delay) = {
            let Ok(mut script) = self.script.lock() else {
                return Ok(());
            };
            script.algorithms.push(algorithm);
            let result = match &script.algorithm_error {
                Some(error) => Err(error.clone()),
                None => {
                    script.remote_algorithm = Some(algorithm);
                    Ok(())
                }
            };
            let delay = script
                .algorithm_delays
                .get(&algorithm)
                .copied()
                .unwrap_or_default();
            (result, delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn register_target(&self, target_id: &str) -> Result<(), TransportError> {
        let Ok(mut script) = self.script.lock() else {
            return Ok(());
        };
        script.registered.push(target_id.to_string());
        if let Some(error) = &script.register_error {
            return Err(error.clone());
        }
        if !script.targets.iter().any(|known| known == target_id) {
            script.targets.push(target_id.to_string());
            script.counts.insert(target_id.to_string(), 0);
        }
        Ok(())
    }
}
