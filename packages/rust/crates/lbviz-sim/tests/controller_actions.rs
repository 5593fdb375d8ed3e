#![allow(missing_docs)]
//! Algorithm switching, target management and lifecycle of the controller.

use std::sync::Arc;
use std::time::Duration;

use lbviz_client::DecisionService;
use lbviz_sim::test_support::ScriptedDecisionService;
use lbviz_sim::{ControllerConfig, RunController, SimSnapshot};
use lbviz_types::{
    Algorithm, Registration, ResultKind, RunConfig, SimError, TransportError,
};

fn start(service: &Arc<ScriptedDecisionService>) -> RunController {
    let service: Arc<dyn DecisionService> = Arc::clone(service) as Arc<dyn DecisionService>;
    RunController::start(service, ControllerConfig::default())
}

fn registration_of(snapshot: &SimSnapshot, id: &str) -> Option<Registration> {
    snapshot
        .targets
        .iter()
        .find(|t| t.id == id)
        .map(|t| t.registration.clone())
}

#[tokio::test]
async fn switch_algorithm_updates_mirror_on_success() {
    let service = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = start(&service);
    assert_eq!(controller.snapshot().algorithm.confirmed, Algorithm::RoundRobin);

    controller
        .switch_algorithm(Algorithm::Random)
        .await
        .expect("switch");

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.algorithm.confirmed, Algorithm::Random);
    assert_eq!(snapshot.algorithm.pending, None);
    assert_eq!(service.algorithms(), [Algorithm::Random]);
}

#[tokio::test]
async fn rejected_switch_keeps_confirmed_algorithm() {
    let service = Arc::new(ScriptedDecisionService::rotating(3).failing_algorithm_switch(
        TransportError::Status {
            endpoint: "/api/set_algorithm/least_connections".to_string(),
            status: 400,
        },
    ));
    let controller = start(&service);

    let err = controller
        .switch_algorithm(Algorithm::LeastConnections)
        .await
        .unwrap_err();
    assert!(matches!(err, SimError::Transport(TransportError::Status { status: 400, .. })));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.algorithm.confirmed, Algorithm::RoundRobin);
    assert_eq!(snapshot.algorithm.pending, None);
    let last = snapshot.results.last().expect("failure logged");
    assert_eq!(last.kind, ResultKind::Failure);
    assert!(last.text.starts_with("Error: failed to switch to least connections"));
}

#[tokio::test(start_paused = true)]
async fn overlapping_switches_settle_on_the_last_request() {
    let service = Arc::new(
        ScriptedDecisionService::rotating(3)
            .with_algorithm_delay(Algorithm::Random, Duration::from_millis(100))
            .with_algorithm_delay(Algorithm::LeastConnections, Duration::from_millis(10)),
    );
    let controller = start(&service);

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.switch_algorithm(Algorithm::Random).await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    let second = tokio::spawn({
        let controller = controller.clone();
        async move { controller.switch_algorithm(Algorithm::LeastConnections).await }
    });

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(service.algorithms(), [Algorithm::Random]);
    assert_eq!(
        controller.snapshot().algorithm.pending,
        Some(Algorithm::LeastConnections)
    );

    first.await.expect("join").expect("first switch");
    second.await.expect("join").expect("second switch");

    assert_eq!(
        service.algorithms(),
        [Algorithm::Random, Algorithm::LeastConnections]
    );
    assert_eq!(service.max_switches_in_flight(), 1);
    assert_eq!(service.remote_algorithm(), Some(Algorithm::LeastConnections));
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.algorithm.confirmed, Algorithm::LeastConnections);
    assert_eq!(snapshot.algorithm.pending, None);
}

#[tokio::test(start_paused = true)]
async fn rejected_switch_does_not_block_the_queued_one() {
    let service = Arc::new(
        ScriptedDecisionService::rotating(3)
            .with_algorithm_delay(Algorithm::Random, Duration::from_millis(50))
            .failing_algorithm_switch(TransportError::Timeout {
                endpoint: "/api/set_algorithm/random".to_string(),
                timeout_ms: 5000,
            }),
    );
    let controller = start(&service);

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.switch_algorithm(Algorithm::Random).await }
    });
    tokio::time::sleep(Duration::from_millis(1)).await;
    let second = controller.switch_algorithm(Algorithm::LeastConnections).await;

    assert!(first.await.expect("join").is_err());
    assert!(second.is_err());
    assert_eq!(
        service.algorithms(),
        [Algorithm::Random, Algorithm::LeastConnections]
    );
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.algorithm.confirmed, Algorithm::RoundRobin);
    assert_eq!(snapshot.algorithm.pending, None);
}

#[tokio::test]
async fn add_next_target_registers_and_confirms() {
    let service = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = start(&service);
    let mut snapshots = controller.subscribe();

    let target = controller.add_next_target().await.expect("add");
    assert_eq!(target.id, "ip4");
    assert_eq!(target.selection_count, 0);
    assert_eq!(target.registration, Registration::Pending);

    let snapshot = snapshots
        .wait_for(|s| registration_of(s, "ip4") == Some(Registration::Confirmed))
        .await
        .expect("registration settled")
        .clone();
    assert_eq!(snapshot.targets.len(), 4);
    assert_eq!(snapshot.edges.len(), 8);
    assert_eq!(service.registered(), ["ip4"]);

    let next = controller.add_next_target().await.expect("add");
    assert_eq!(next.id, "ip5");
}

#[tokio::test]
async fn registration_failure_keeps_target_and_marks_it() {
    let service = Arc::new(ScriptedDecisionService::rotating(3).failing_registration(
        TransportError::Rejected {
            endpoint: "/api/add_ip".to_string(),
            message: "Invalid IP".to_string(),
        },
    ));
    let controller = start(&service);
    let mut snapshots = controller.subscribe();

    controller.add_target(7).await.expect("add");
    let snapshot = snapshots
        .wait_for(|s| matches!(registration_of(s, "ip7"), Some(Registration::Failed(_))))
        .await
        .expect("registration settled")
        .clone();

    assert_eq!(snapshot.targets.len(), 4);
    assert_eq!(snapshot.edges.len(), 8);
    let last = snapshot.results.last().expect("failure logged");
    assert_eq!(
        last.text,
        "Error: failed to register ip7: /api/add_ip rejected the request: Invalid IP"
    );
}

#[tokio::test]
async fn duplicate_target_is_refused() {
    let service = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = start(&service);

    let err = controller.add_target(2).await.unwrap_err();
    assert_eq!(err, SimError::DuplicateId("ip2".to_string()));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.targets.len(), 3);
    assert_eq!(snapshot.edges.len(), 6);
    assert!(service.registered().is_empty());
}

#[tokio::test]
async fn edges_stay_twice_the_target_count() {
    let service = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = start(&service);

    for index in [10, 4, 12] {
        controller.add_target(index).await.expect("add");
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.edges.len(), snapshot.targets.len() * 2);
    }
    let ids: Vec<String> = controller
        .snapshot()
        .targets
        .iter()
        .map(|t| t.id.clone())
        .collect();
    assert_eq!(ids, ["ip1", "ip2", "ip3", "ip10", "ip4", "ip12"]);
}

#[tokio::test]
async fn clear_results_empties_log() {
    let service = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = start(&service);
    let mut snapshots = controller.subscribe();

    controller.start_single().await.expect("single");
    snapshots
        .wait_for(|s| !s.results.is_empty())
        .await
        .expect("applied");

    controller.clear_results().await.expect("clear");
    assert!(controller.snapshot().results.is_empty());
}

#[tokio::test]
async fn result_log_is_bounded() {
    let service: Arc<dyn DecisionService> = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = RunController::start(
        service,
        ControllerConfig {
            result_capacity: 3,
            ..ControllerConfig::default()
        },
    );
    let mut snapshots = controller.subscribe();

    for expected in 1..=5_u64 {
        controller.start_single().await.expect("single");
        snapshots
            .wait_for(|s| s.targets.iter().map(|t| t.selection_count).sum::<u64>() >= expected)
            .await
            .expect("applied");
    }

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.results.len(), 3);
    assert_eq!(snapshot.results_evicted, 2);
}

#[tokio::test]
async fn calls_after_shutdown_fail() {
    let service = Arc::new(ScriptedDecisionService::rotating(3));
    let controller = start(&service);

    controller.shutdown().await;
    let err = controller.start_single().await.unwrap_err();
    assert_eq!(err, SimError::ControllerClosed);
    let err = controller
        .start_run(RunConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err, SimError::ControllerClosed);
}
