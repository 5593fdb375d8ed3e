use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use lbviz_client::DecisionService;
use lbviz_types::RunConfig;

use super::types::Completion;

/// Drive one run: request, hand the outcome to the actor, pause, repeat.
///
/// At most one request is outstanding. The next request starts only after the
/// previous one settled and the interval elapsed. Cancelling drops an
/// outstanding request; the actor also discards anything already queued for
/// this generation.
pub(super) async fn drive_run(
    service: Arc<dyn DecisionService>,
    generation: u64,
    config: RunConfig,
    cancel: CancellationToken,
    completion_tx: mpsc::Sender<Completion>,
) {
    let total = config.cycles_total();
    let interval = config.interval();
    let mut issued: u64 = 0;

    loop {
        if total.is_some_and(|total| issued >= total) || cancel.is_cancelled() {
            break;
        }
        issued += 1;
        tracing::debug!(run_generation = generation, cycle = issued, ?total, "run cycle issued");

        let result = tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!(
                    run_generation = generation,
                    cycle = issued,
                    "run cancelled with a request in flight"
                );
                break;
            }
            result = service.select_target() => result,
        };

        let cycle = Completion::Cycle {
            generation,
            cycle: Some(issued),
            result,
        };
        if completion_tx.send(cycle).await.is_err() {
            break;
        }

        if total.is_some_and(|total| issued >= total) {
            break;
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }

    tracing::debug!(run_generation = generation, issued, "run task finished");
}
