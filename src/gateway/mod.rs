//! Tool-call gateway.
//!
//! Agents call named tools; the gateway maps each name to a backend HTTP
//! operation declared in YAML ([`config`]), fills `{param}` placeholders
//! ([`template`]), forwards the call ([`dispatch`]), and on success may
//! publish a formatted event ([`events`]). [`routes`] is the HTTP surface.

pub mod config;
pub mod dispatch;
pub mod events;
pub mod routes;
pub mod template;

pub use config::{ConfigurationError, GatewayConfig};
pub use dispatch::{BackendRequest, DispatchError, Dispatcher, ToolCallRequest};
pub use events::{EventHub, EventPublisher, GatewayEvent, HttpRelay};
