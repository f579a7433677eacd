//! Conversation and message persistence.
//!
//! Appending a message creates the message vertex, links it from its
//! conversation with a `HAS_MESSAGE` edge, and bumps the conversation's
//! `updated_at`, all inside one transaction.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{GraphError, GraphResult};
use crate::graph::types::{Conversation, Message, NodeType, HAS_MESSAGE};

/// Create a conversation vertex and return its id.
pub fn create_conversation(conn: &Connection, title: &str) -> GraphResult<String> {
    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO nodes (id, type, title, created_at, updated_at) \
         VALUES (?1, 'conversation', ?2, ?3, ?3)",
        params![id, title, now],
    )?;

    tracing::debug!(id = %id, "conversation created");
    Ok(id)
}

/// All conversations, most recently created first.
pub fn list_conversations(conn: &Connection) -> GraphResult<Vec<Conversation>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, created_at, updated_at FROM nodes \
         WHERE type = 'conversation' ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map([], conversation_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Fetch one conversation by id.
pub fn get_conversation(conn: &Connection, id: &str) -> GraphResult<Option<Conversation>> {
    let conv = conn
        .query_row(
            "SELECT id, title, created_at, updated_at FROM nodes \
             WHERE id = ?1 AND type = 'conversation'",
            params![id],
            conversation_from_row,
        )
        .optional()?;
    Ok(conv)
}

/// Append a message to a conversation and return the new message id.
///
/// Fails with [`GraphError::ConversationNotFound`] if `conversation_id` does
/// not name a conversation; nothing is written in that case.
pub fn add_message(
    conn: &mut Connection,
    conversation_id: &str,
    role: &str,
    text: &str,
) -> GraphResult<String> {
    let tx = conn.transaction()?;

    let exists: Option<String> = tx
        .query_row(
            "SELECT id FROM nodes WHERE id = ?1 AND type = 'conversation'",
            params![conversation_id],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(GraphError::ConversationNotFound(conversation_id.to_string()));
    }

    let id = uuid::Uuid::now_v7().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    tx.execute(
        "INSERT INTO nodes (id, type, conversation_id, role, text, created_at, updated_at) \
         VALUES (?1, 'message', ?2, ?3, ?4, ?5, ?5)",
        params![id, conversation_id, role, text, now],
    )?;
    tx.execute(
        "INSERT INTO edges (source_id, target_id, rel_type, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![conversation_id, id, HAS_MESSAGE, now],
    )?;
    tx.execute(
        "UPDATE nodes SET updated_at = ?2 WHERE id = ?1",
        params![conversation_id, now],
    )?;

    tx.commit()?;

    tracing::debug!(id = %id, conversation_id = %conversation_id, "message added");
    Ok(id)
}

/// Messages linked from a conversation, oldest first.
///
/// Returns `Ok(None)` when the conversation does not exist, and `Ok(Some(vec![]))`
/// when it exists but has no messages.
pub fn conversation_messages(
    conn: &Connection,
    conversation_id: &str,
) -> GraphResult<Option<Vec<Message>>> {
    if get_conversation(conn, conversation_id)?.is_none() {
        return Ok(None);
    }

    let mut stmt = conn.prepare(
        "SELECT m.id, m.conversation_id, m.role, m.text, m.created_at \
         FROM edges e JOIN nodes m ON m.id = e.target_id \
         WHERE e.source_id = ?1 AND e.rel_type = ?2 AND m.type = 'message' \
         ORDER BY m.created_at ASC, m.rowid ASC",
    )?;
    let messages = stmt
        .query_map(params![conversation_id, HAS_MESSAGE], message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(messages))
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        node_type: NodeType::Conversation,
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        conversation_id: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        role: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        text: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        timestamp: row.get(4)?,
        node_type: NodeType::Message,
    })
}
