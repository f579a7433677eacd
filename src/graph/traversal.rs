//! Bounded-depth neighbourhood traversal.
//!
//! Walks edges in both directions from a start node, up to `depth` hops, and
//! returns the induced subgraph: every reached node, plus every edge whose two
//! endpoints were both reached.

use std::collections::HashSet;

use rusqlite::{params, Connection};

use crate::error::{GraphError, GraphResult};
use crate::graph::types::{node_label, GraphData, GraphLink, GraphNode};

pub const MIN_DEPTH: u32 = 1;
pub const MAX_DEPTH: u32 = 3;

/// Recursive walk over undirected adjacency. `?1` = start id, `?2` = depth.
const REACH_CTE: &str = "\
WITH RECURSIVE reach(id, hops) AS (
    SELECT id, 0 FROM nodes WHERE id = ?1
    UNION
    SELECT CASE WHEN e.source_id = r.id THEN e.target_id ELSE e.source_id END, r.hops + 1
    FROM reach r
    JOIN edges e ON e.source_id = r.id OR e.target_id = r.id
    WHERE r.hops < ?2
)";

/// Subgraph within `depth` hops of `node_id`.
///
/// An unknown `node_id` yields an empty graph rather than an error.
pub fn children(conn: &Connection, node_id: &str, depth: u32) -> GraphResult<GraphData> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(GraphError::InvalidDepth {
            got: depth,
            min: MIN_DEPTH,
            max: MAX_DEPTH,
        });
    }

    let node_sql = format!(
        "{REACH_CTE} SELECT n.id, n.type, n.title, n.text FROM nodes n \
         WHERE n.id IN (SELECT id FROM reach) ORDER BY n.created_at, n.rowid"
    );
    let mut stmt = conn.prepare(&node_sql)?;
    let nodes = stmt
        .query_map(params![node_id, depth], |row| {
            let title: Option<String> = row.get(2)?;
            let text: Option<String> = row.get(3)?;
            Ok(GraphNode {
                id: row.get(0)?,
                node_type: row.get(1)?,
                label: node_label(title.as_deref(), text.as_deref()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if nodes.is_empty() {
        return Ok(GraphData::default());
    }

    let reached: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let mut stmt = conn.prepare(&format!(
        "{REACH_CTE} SELECT e.source_id, e.target_id FROM edges e \
         WHERE e.source_id IN (SELECT id FROM reach) ORDER BY e.id"
    ))?;
    let links = stmt
        .query_map(params![node_id, depth], |row| {
            Ok(GraphLink {
                source: row.get(0)?,
                target: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|link| reached.contains(link.target.as_str()))
        .collect();

    Ok(GraphData { nodes, links })
}
