//! Node, edge, and wire types for the conversation graph.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use serde::{Deserialize, Serialize};

/// Discriminator stored in the `type` column of `nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Conversation,
    Message,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Message => "message",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "message" => Ok(Self::Message),
            _ => Err(format!("unknown node type: {s}")),
        }
    }
}

/// Read straight from the `type` column; anything outside the two known
/// kinds is a conversion error rather than a silently mislabelled node.
impl FromSql for NodeType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// Relationship label from a conversation to each of its messages.
pub const HAS_MESSAGE: &str = "HAS_MESSAGE";

/// A conversation vertex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
    /// Bumped every time a message is appended.
    pub updated_at: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// A message vertex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    /// `"user"` or `"assistant"` by convention; not enforced.
    pub role: String,
    pub text: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

#[derive(Debug, Deserialize)]
pub struct ConversationCreate {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    pub conversation_id: String,
    pub role: String,
    pub text: String,
}

/// Node in a [`GraphData`] response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

/// Directed link in a [`GraphData`] response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

/// Force-graph friendly subgraph: `{nodes, links}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

/// Maximum number of characters kept in a node label.
pub const LABEL_MAX_CHARS: usize = 50;

/// Build a display label: title for conversations, text for messages, cut to
/// [`LABEL_MAX_CHARS`] characters.
pub fn node_label(title: Option<&str>, text: Option<&str>) -> String {
    title
        .or(text)
        .unwrap_or_default()
        .chars()
        .take(LABEL_MAX_CHARS)
        .collect()
}
