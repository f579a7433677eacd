//! Conversational graph memory for AI agents.
//!
//! Conversations and messages are stored as nodes and edges in an embedded
//! SQLite graph and served over HTTP. A separate tool-call gateway lets agents
//! reach that API through named tools declared in YAML.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration with environment overrides
//! - [`db`]: SQLite initialization, schema, and migrations
//! - [`graph`]: conversation/message persistence, traversal, and search
//! - [`embedding`]: text embedding providers
//! - [`tasks`]: background embedding worker
//! - [`api`]: Graph Memory API routes
//! - [`gateway`]: YAML-driven tool-call gateway
//! - [`server`]: process bootstrap for both services

pub mod api;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod server;
pub mod tasks;
