//! lbviz-sim - Simulation driver for the load balancer visualizer
//!
//! Owns the local picture of the balancer: targets and their edges, the
//! result log, the mirrored algorithm and the run state. Distribution
//! decisions always come from a remote [`lbviz_client::DecisionService`].
//!
//! # Modules
//!
//! - `topology`: targets, implied edges, decision application
//! - `result_log`: bounded outcome log
//! - `controller`: actor that sequences requests, runs and cancellation
//!
//! # Usage
//!
//! ```rust,ignore
//! use lbviz_sim::{ControllerConfig, RunController};
//!
//! let controller = RunController::start(service, ControllerConfig::default());
//! controller.start_run(RunConfig::new(5.0, 10.0)?).await?;
//! let done = controller.wait_until_idle().await?;
//! ```

mod controller;
mod result_log;
mod topology;

#[doc(hidden)]
pub mod test_support;

pub use controller::{ControllerConfig, RunController, RunTicket, SimSnapshot};
pub use result_log::{DEFAULT_RESULT_LOG_CAPACITY, ResultLog};
pub use topology::{TopologySnapshot, TopologyStore};
