//! Interactive loop: input events and controller snapshots drive redraws.

use std::time::Duration;

use tokio::sync::mpsc;

use lbviz_sim::RunController;

use crate::event::{Event, EventHandler, EventHandlerConfig};
use crate::renderer::TuiRenderer;
use crate::state::AppState;
use crate::view::{DiagramView, dispatch};

/// Run the terminal UI until the user quits.
///
/// Controller calls are spawned so a slow decision service never blocks
/// input; their status lines come back over a channel.
///
/// # Errors
/// Returns terminal setup or draw errors.
pub async fn run_tui(
    controller: RunController,
    mut state: AppState,
    tick_rate: Duration,
) -> anyhow::Result<()> {
    let mut renderer = TuiRenderer::new()?;
    let mut events = EventHandler::new(EventHandlerConfig { tick_rate });
    let mut snapshots = controller.subscribe();
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<String>();

    tracing::info!(title = state.title(), "starting TUI");

    loop {
        let view = DiagramView::from_snapshot(&snapshots.borrow_and_update(), &state.view_options());
        renderer.draw(&view, &state)?;

        tokio::select! {
            event = events.next() => match event {
                Some(Event::Input(action)) => {
                    if let Some(intent) = state.handle_action(action) {
                        let controller = controller.clone();
                        let status_tx = status_tx.clone();
                        tokio::spawn(async move {
                            if let Some(status) = dispatch(&controller, intent).await {
                                let _ = status_tx.send(status);
                            }
                        });
                    }
                }
                Some(Event::Resize(..) | Event::Tick) => {}
                Some(Event::Error(message)) => {
                    tracing::warn!(error = %message, "terminal input failed");
                    break;
                }
                None => break,
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::warn!("controller stopped publishing snapshots");
                    break;
                }
            }
            Some(status) = status_rx.recv() => state.set_status(Some(status)),
        }

        if state.should_quit() {
            break;
        }
    }

    if controller.snapshot().run_state.is_running()
        && let Err(error) = controller.cancel_run().await
    {
        tracing::debug!(%error, "could not cancel the run on exit");
    }
    drop(renderer);
    tracing::info!("TUI exited");
    Ok(())
}
