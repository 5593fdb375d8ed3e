//! Event handling for TUI - Keyboard input and timing events

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::{
    thread,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;

use lbviz_types::Algorithm;

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// `1` / `2` / `3` - pick an algorithm
    SelectAlgorithm(Algorithm),
    /// `s` - send one request
    SendOnce,
    /// `a` - add a target
    AddTarget,
    /// `r` - start a load test
    StartRun,
    /// `c` - cancel the load test
    CancelRun,
    /// `x` - clear results
    ClearResults,
    /// `+` - raise the rate
    RateUp,
    /// `-` - lower the rate
    RateDown,
    /// `q`, Esc or Ctrl-c
    Quit,
}

impl KeyAction {
    /// Check if this is a quit action
    #[must_use]
    pub fn is_quit(&self) -> bool {
        self == &KeyAction::Quit
    }
}

/// Event from the input system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Mapped key press
    Input(KeyAction),
    /// Window resize
    Resize(u16, u16),
    /// Periodic tick
    Tick,
    /// Error occurred
    Error(String),
}

/// Map a key press to an action. Releases and repeats are ignored.
#[must_use]
pub fn map_key_event(key: KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return (key.code == KeyCode::Char('c')).then_some(KeyAction::Quit);
    }
    match key.code {
        KeyCode::Char('1') => Some(KeyAction::SelectAlgorithm(Algorithm::RoundRobin)),
        KeyCode::Char('2') => Some(KeyAction::SelectAlgorithm(Algorithm::Random)),
        KeyCode::Char('3') => Some(KeyAction::SelectAlgorithm(Algorithm::LeastConnections)),
        KeyCode::Char('s') => Some(KeyAction::SendOnce),
        KeyCode::Char('a') => Some(KeyAction::AddTarget),
        KeyCode::Char('r') => Some(KeyAction::StartRun),
        KeyCode::Char('c') => Some(KeyAction::CancelRun),
        KeyCode::Char('x') => Some(KeyAction::ClearResults),
        KeyCode::Char('+' | '=') | KeyCode::Up => Some(KeyAction::RateUp),
        KeyCode::Char('-') | KeyCode::Down => Some(KeyAction::RateDown),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Quit),
        _ => None,
    }
}

fn map_crossterm_event(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) => map_key_event(key).map(Event::Input),
        CrosstermEvent::Resize(width, height) => Some(Event::Resize(width, height)),
        _ => None,
    }
}

/// Event handler configuration
#[derive(Debug, Clone)]
pub struct EventHandlerConfig {
    /// Tick interval
    pub tick_rate: Duration,
}

impl Default for EventHandlerConfig {
    fn default() -> Self {
        Self {
            tick_rate: Duration::from_millis(250),
        }
    }
}

/// Terminal input reader.
///
/// A blocking thread polls crossterm and forwards into a tokio channel so the
/// UI loop can `select!` input against controller updates. The thread stops
/// once the handler is dropped.
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
    /// Create a new event handler
    #[must_use]
    pub fn new(config: EventHandlerConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        let tick_rate = config.tick_rate;
        thread::spawn(move || {
            let mut last_tick = Instant::now();

            loop {
                let timeout = tick_rate.saturating_sub(last_tick.elapsed());

                match event::poll(timeout) {
                    Ok(true) => match event::read() {
                        Ok(raw) => {
                            if let Some(mapped) = map_crossterm_event(raw)
                                && sender.send(mapped).is_err()
                            {
                                break;
                            }
                        }
                        Err(err) => {
                            let _ = sender.send(Event::Error(format!("Failed to read event: {err}")));
                            break;
                        }
                    },
                    Ok(false) => {}
                    Err(err) => {
                        let _ = sender.send(Event::Error(format!("Failed to poll events: {err}")));
                        break;
                    }
                }

                if last_tick.elapsed() >= tick_rate {
                    if sender.send(Event::Tick).is_err() {
                        break;
                    }
                    last_tick = Instant::now();
                }
            }
        });

        Self { receiver }
    }

    /// Receive the next event; `None` once the input thread stopped.
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}
