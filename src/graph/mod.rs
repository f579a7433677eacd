//! Conversation graph: nodes, edges, traversal, and search over the SQLite store.

pub mod conversations;
pub mod search;
pub mod seed;
pub mod traversal;
pub mod types;
