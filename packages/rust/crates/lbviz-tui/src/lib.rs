//! lbviz-tui - terminal front end for the load balancer visualizer
//!
//! Renders the controller snapshot as a balancer -> targets -> service diagram
//! and turns key presses into controller calls. The same controller also backs
//! headless subcommands (`run`, `send`, `add-target`) for scripting and CI.

pub mod app;
pub mod cli;
pub mod config;
pub mod event;
pub mod headless;
pub mod renderer;
pub mod state;
pub mod view;

pub use app::run_tui;
pub use config::{LbvizSettings, load_settings, set_config_home_override};
pub use event::{Event, EventHandler, EventHandlerConfig, KeyAction, map_key_event};
pub use headless::{OutputMode, SimSnapshotSummary, add_target, run_load_test, send_requests};
pub use renderer::{TuiRenderer, render};
pub use state::AppState;
pub use view::{DiagramView, EdgeView, HeaderView, NodeKind, NodeView, UserIntent, ViewOptions, dispatch};
