//! Substring search and embedding-based neighbours over message nodes.

use rusqlite::{params, Connection};

use crate::error::GraphResult;
use crate::graph::conversations::message_from_row;
use crate::graph::types::{node_label, GraphData, GraphNode, Message};

/// Messages whose text contains `query`, ignoring case. Insertion order.
pub fn search_messages(conn: &Connection, query: &str, limit: usize) -> GraphResult<Vec<Message>> {
    let mut stmt = conn.prepare(
        "SELECT id, conversation_id, role, text, created_at FROM nodes \
         WHERE type = 'message' AND instr(lower(text), lower(?1)) > 0 \
         ORDER BY rowid LIMIT ?2",
    )?;
    let messages = stmt
        .query_map(params![query, limit as i64], message_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

/// [`search_messages`] shaped as a link-less [`GraphData`]. Labels carry the
/// full message text.
pub fn search_graph(conn: &Connection, query: &str, limit: usize) -> GraphResult<GraphData> {
    let nodes = search_messages(conn, query, limit)?
        .into_iter()
        .map(|m| GraphNode {
            id: m.id,
            label: m.text,
            node_type: m.node_type,
        })
        .collect();
    Ok(GraphData {
        nodes,
        links: Vec::new(),
    })
}

fn embedding_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Attach an embedding to a node. Returns `false` if the node no longer exists.
pub fn store_embedding(
    conn: &Connection,
    node_id: &str,
    embedding: &[f32],
    model: &str,
) -> GraphResult<bool> {
    let updated = conn.execute(
        "UPDATE nodes SET embedding = ?2, embedding_model = ?3 WHERE id = ?1",
        params![node_id, embedding_bytes(embedding), model],
    )?;
    Ok(updated > 0)
}

/// Read back a node's embedding, if one has been computed.
pub fn load_embedding(conn: &Connection, node_id: &str) -> GraphResult<Option<Vec<f32>>> {
    let mut stmt = conn.prepare("SELECT embedding FROM nodes WHERE id = ?1")?;
    let mut rows = stmt.query(params![node_id])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let blob: Option<Vec<u8>> = row.get(0)?;
    Ok(blob.map(|bytes| {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }))
}

/// Up to `k` nodes whose embeddings are closest (cosine distance) to the
/// embedding of `node_id`. Empty when that node has no embedding.
pub fn similar_nodes(conn: &Connection, node_id: &str, k: usize) -> GraphResult<GraphData> {
    let mut stmt = conn.prepare(
        "SELECT n.id, n.type, n.title, n.text \
         FROM nodes t JOIN nodes n \
           ON n.id != t.id AND n.embedding IS NOT NULL \
          AND length(n.embedding) = length(t.embedding) \
         WHERE t.id = ?1 AND t.embedding IS NOT NULL \
         ORDER BY vec_distance_cosine(n.embedding, t.embedding) ASC \
         LIMIT ?2",
    )?;
    let nodes = stmt
        .query_map(params![node_id, k as i64], |row| {
            let title: Option<String> = row.get(2)?;
            let text: Option<String> = row.get(3)?;
            Ok(GraphNode {
                id: row.get(0)?,
                node_type: row.get(1)?,
                label: node_label(title.as_deref(), text.as_deref()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(GraphData {
        nodes,
        links: Vec::new(),
    })
}
