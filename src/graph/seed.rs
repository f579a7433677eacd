//! Sample data for demos and manual testing.

use rusqlite::Connection;
use serde::Serialize;

use crate::error::GraphResult;
use crate::graph::conversations::{add_message, create_conversation};

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub conversation_id: String,
    pub message_ids: Vec<String>,
    pub status: &'static str,
}

const SAMPLE_MESSAGES: &[(&str, &str)] = &[
    ("user", "Hello, can you help me with graph databases?"),
    (
        "assistant",
        "Of course! Graph databases are great for storing connected data. They use nodes and relationships to represent information.",
    ),
    ("user", "What are the benefits of storing conversations as a graph?"),
    (
        "assistant",
        "Every message stays linked to its conversation, so neighbourhoods can be walked, searched, and visualised directly.",
    ),
];

/// Create one sample conversation with a short exchange.
pub fn seed_sample_data(conn: &mut Connection) -> GraphResult<SeedResult> {
    let conversation_id = create_conversation(conn, "Sample Conversation")?;
    let message_ids = SAMPLE_MESSAGES
        .iter()
        .map(|(role, text)| add_message(conn, &conversation_id, role, text))
        .collect::<GraphResult<Vec<_>>>()?;

    tracing::info!(conversation_id = %conversation_id, messages = message_ids.len(), "sample data created");

    Ok(SeedResult {
        conversation_id,
        message_ids,
        status: "Sample data created successfully",
    })
}
