//! Outbound task communication for A2A-style agents.
//!
//! The [`DeliveryCoordinator`] picks a delivery strategy (stream, poll, or
//! webhook-wait) per message; [`AgentComm`] folds the resulting event
//! stream into conversational text; [`CommunicationManager`] fans the same
//! machinery out across many concurrent agents and tasks.

pub mod comm;
pub mod delivery;
pub mod error;
pub mod jsonrpc_transport;
pub mod manager;
pub mod registry;
pub mod sse;
pub mod transport;

pub use comm::{AgentComm, NO_RESPONSE_FALLBACK};
pub use delivery::{DeliveryConfig, DeliveryCoordinator, DeliveryMode, DeliveryStream};
pub use error::ClientError;
pub use jsonrpc_transport::JsonRpcTransport;
pub use manager::{ActiveTask, CommunicationManager, SendOptions};
pub use registry::{AgentRegistry, InMemoryAgentRegistry};
pub use sse::parse_sse_stream;
pub use transport::{EventStream, Transport};
