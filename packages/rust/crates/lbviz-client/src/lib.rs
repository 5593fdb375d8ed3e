//! Decision client for lbviz.
//!
//! The remote decision service owns the balancing algorithm; this crate only
//! asks it for decisions and forwards topology/algorithm changes:
//! - `GET  /api/get_ip` -> selected target, message, cumulative stats
//! - `GET  /api/set_algorithm/{name}`
//! - `POST /api/add_ip` with `{ "ip": "<target id>" }`
//!
//! [`DecisionService`] is the seam the run controller is written against;
//! [`HttpDecisionClient`] is the reqwest-backed implementation.

mod client;
mod config;
mod service;

pub use client::HttpDecisionClient;
pub use config::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT_MS, DecisionClientConfig};
pub use service::{ADD_IP_PATH, DecisionService, GET_IP_PATH, SET_ALGORITHM_PATH};
