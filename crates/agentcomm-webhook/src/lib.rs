//! Inbound webhook correlation for agent push notifications.
//!
//! Agents report task progress by POSTing JSON-RPC envelopes to this
//! listener; the [`CallbackRegistry`] routes each authenticated payload to
//! the channels registered for its task id.

pub mod error;
pub mod registry;
pub mod server;

pub use error::WebhookError;
pub use registry::{CallbackRegistry, TaskSender};
pub use server::{create_router, serve, WEBHOOK_TOKEN_HEADER};
