use async_trait::async_trait;

use lbviz_types::{Algorithm, Decision, TransportError};

/// Path of the decision request.
pub const GET_IP_PATH: &str = "/api/get_ip";
/// Prefix of the algorithm switch; the wire name is appended.
pub const SET_ALGORITHM_PATH: &str = "/api/set_algorithm";
/// Path of the target registration.
pub const ADD_IP_PATH: &str = "/api/add_ip";

/// Remote decision service abstraction so the run controller can be driven by
/// the HTTP client or by test doubles.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Ask for one distribution decision.
    async fn select_target(&self) -> Result<Decision, TransportError>;

    /// Switch the remote balancing algorithm.
    async fn set_algorithm(&self, algorithm: Algorithm) -> Result<(), TransportError>;

    /// Register a newly added target with the service.
    async fn register_target(&self, target_id: &str) -> Result<(), TransportError>;
}
