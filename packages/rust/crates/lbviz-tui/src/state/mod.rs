//! Application state management for TUI
//!
//! Only UI-local values live here. Everything the simulation owns comes from
//! the controller snapshot on each redraw.

use lbviz_types::{MAX_RATE_PER_SECOND, MIN_RATE_PER_SECOND};

use crate::event::KeyAction;
use crate::view::{UserIntent, ViewOptions};

/// Main application state
#[derive(Debug, Clone)]
pub struct AppState {
    title: String,
    rate_per_second: f64,
    duration_seconds: f64,
    status_message: Option<String>,
    should_quit: bool,
}

impl AppState {
    /// Create a new application state
    #[must_use]
    pub fn new(title: impl Into<String>, rate_per_second: f64, duration_seconds: f64) -> Self {
        Self {
            title: title.into(),
            rate_per_second: rate_per_second.clamp(MIN_RATE_PER_SECOND, MAX_RATE_PER_SECOND),
            duration_seconds,
            status_message: None,
            should_quit: false,
        }
    }

    /// Get title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Rate the next run will use
    #[must_use]
    pub fn rate_per_second(&self) -> f64 {
        self.rate_per_second
    }

    /// Length the next run will use
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    /// Step the rate by `delta`, staying within `[1, 100]`.
    pub fn adjust_rate(&mut self, delta: f64) {
        self.rate_per_second =
            (self.rate_per_second + delta).clamp(MIN_RATE_PER_SECOND, MAX_RATE_PER_SECOND);
    }

    /// Inputs the diagram view takes from the UI.
    #[must_use]
    pub fn view_options(&self) -> ViewOptions {
        ViewOptions {
            rate_per_second: self.rate_per_second,
            duration_seconds: self.duration_seconds,
        }
    }

    /// Get status message
    #[must_use]
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Set status message
    pub fn set_status(&mut self, message: Option<String>) {
        self.status_message = message;
    }

    /// Check if should quit
    #[must_use]
    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Request application quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Apply a key action. Local actions are handled here; the rest come back
    /// as an intent for the controller.
    pub fn handle_action(&mut self, action: KeyAction) -> Option<UserIntent> {
        match action {
            KeyAction::Quit => {
                self.quit();
                None
            }
            KeyAction::RateUp => {
                self.adjust_rate(1.0);
                None
            }
            KeyAction::RateDown => {
                self.adjust_rate(-1.0);
                None
            }
            KeyAction::SelectAlgorithm(algorithm) => Some(UserIntent::SelectAlgorithm(algorithm)),
            KeyAction::SendOnce => Some(UserIntent::SendOnce),
            KeyAction::AddTarget => Some(UserIntent::AddTarget),
            KeyAction::StartRun => Some(UserIntent::StartRun {
                rate_per_second: self.rate_per_second,
                duration_seconds: self.duration_seconds,
            }),
            KeyAction::CancelRun => Some(UserIntent::CancelRun),
            KeyAction::ClearResults => {
                self.status_message = None;
                Some(UserIntent::ClearResults)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_adjust_is_clamped() {
        let mut state = AppState::new("t", 99.0, 10.0);
        state.adjust_rate(1.0);
        state.adjust_rate(1.0);
        assert!((state.rate_per_second() - 100.0).abs() < f64::EPSILON);

        let mut state = AppState::new("t", 1.0, 10.0);
        state.adjust_rate(-1.0);
        assert!((state.rate_per_second() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_start_run_uses_current_rate() {
        let mut state = AppState::new("t", 2.0, 5.0);
        state.handle_action(KeyAction::RateUp);
        assert_eq!(
            state.handle_action(KeyAction::StartRun),
            Some(UserIntent::StartRun {
                rate_per_second: 3.0,
                duration_seconds: 5.0
            })
        );
    }

    #[test]
    fn test_quit_is_local() {
        let mut state = AppState::new("t", 1.0, 10.0);
        assert_eq!(state.handle_action(KeyAction::Quit), None);
        assert!(state.should_quit());
    }
}
