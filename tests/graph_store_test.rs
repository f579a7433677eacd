use graph_memory::db::{self, migrations};
use graph_memory::graph::conversations::{add_message, conversation_messages, list_conversations};
use graph_memory::graph::seed::seed_sample_data;
use graph_memory::graph::traversal;

#[test]
fn on_disk_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("graph.db");

    let seeded = {
        let mut conn = db::open_database(&path).unwrap();
        let seeded = seed_sample_data(&mut conn).unwrap();
        add_message(&mut conn, &seeded.conversation_id, "user", "one more").unwrap();
        seeded
    };
    assert!(path.exists());

    let conn = db::open_database(&path).unwrap();
    assert_eq!(
        migrations::get_schema_version(&conn).unwrap(),
        migrations::CURRENT_SCHEMA_VERSION
    );

    let convs = list_conversations(&conn).unwrap();
    assert_eq!(convs.len(), 1);
    assert_eq!(convs[0].title, "Sample Conversation");
    assert!(convs[0].updated_at >= convs[0].created_at);

    let messages = conversation_messages(&conn, &seeded.conversation_id)
        .unwrap()
        .unwrap();
    assert_eq!(messages.len(), 5);
    assert_eq!(messages.last().unwrap().text, "one more");
}

#[test]
fn v1_database_is_upgraded_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.db");

    {
        let conn = db::open_database(&path).unwrap();
        // Roll back to a v1 layout: no embedding_model column.
        conn.execute_batch(
            "ALTER TABLE nodes DROP COLUMN embedding_model;
             UPDATE schema_meta SET value = '1' WHERE key = 'schema_version';",
        )
        .unwrap();
    }

    let conn = db::open_database(&path).unwrap();
    assert_eq!(migrations::get_schema_version(&conn).unwrap(), 2);
    let has_model_column: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('nodes') WHERE name = 'embedding_model'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(has_model_column);
}

#[test]
fn deleting_a_conversation_cascades_to_edges() {
    let mut conn = db::open_memory_database().unwrap();
    let seeded = seed_sample_data(&mut conn).unwrap();

    conn.execute("DELETE FROM nodes WHERE id = ?1", [&seeded.conversation_id])
        .unwrap();

    let edges: i64 = conn
        .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
        .unwrap();
    assert_eq!(edges, 0);

    // Orphaned messages are now isolated: each one's neighbourhood is itself.
    let graph = traversal::children(&conn, &seeded.message_ids[0], 3).unwrap();
    assert_eq!(graph.nodes.len(), 1);
    assert!(graph.links.is_empty());
}
