mod helpers;

use axum::http::{Method, StatusCode};
use graph_memory::api;
use graph_memory::graph::search::store_embedding;
use helpers::{api_state, send};
use serde_json::{json, Value};

fn node_ids(graph: &Value) -> Vec<String> {
    graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_names_the_service() {
    let (state, _) = api_state();
    let (status, body) = send(api::router(state), Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "service": "Graph Memory API"}));
}

#[tokio::test]
async fn conversations_list_newest_first() {
    let (state, _) = api_state();
    let app = api::router(state);

    let (status, first) = send(app.clone(), Method::POST, "/conversations", Some(json!({"title": "First"}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send(app.clone(), Method::POST, "/conversations", Some(json!({"title": "Second"}))).await;

    let (status, list) = send(app, Method::GET, "/conversations", None).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["id"], second);
    assert_eq!(list[0]["title"], "Second");
    assert_eq!(list[0]["type"], "conversation");
    assert_eq!(list[1]["id"], first);
}

#[tokio::test]
async fn messages_come_back_in_order() {
    let (state, _) = api_state();
    let app = api::router(state);

    let (_, conv) = send(app.clone(), Method::POST, "/conversations", Some(json!({"title": "Chat"}))).await;
    for (role, text) in [("user", "one"), ("assistant", "two"), ("user", "three")] {
        let (status, id) = send(
            app.clone(),
            Method::POST,
            "/messages",
            Some(json!({"conversation_id": conv, "role": role, "text": text})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(id.is_string());
    }

    let uri = format!("/conversations/{}/messages", conv.as_str().unwrap());
    let (status, messages) = send(app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let messages = messages.as_array().unwrap();
    let texts: Vec<&str> = messages.iter().map(|m| m["text"].as_str().unwrap()).collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[0]["type"], "message");
    assert_eq!(messages[0]["conversation_id"], conv);
}

#[tokio::test]
async fn unknown_conversation_is_404() {
    let (state, _) = api_state();
    let app = api::router(state);

    let (status, body) = send(app.clone(), Method::GET, "/conversations/missing/messages", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("missing"));

    let (status, _) = send(
        app,
        Method::POST,
        "/messages",
        Some(json!({"conversation_id": "missing", "role": "user", "text": "hi"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn children_walks_the_neighbourhood() {
    let (state, _) = api_state();
    let app = api::router(state);

    let (_, seeded) = send(app.clone(), Method::POST, "/seed", None).await;
    let conv = seeded["conversation_id"].as_str().unwrap();
    let message_ids: Vec<&str> = seeded["message_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();

    let (status, graph) = send(app.clone(), Method::GET, &format!("/nodes/{conv}/children"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 5);
    assert_eq!(graph["links"].as_array().unwrap().len(), 4);
    assert!(graph["links"]
        .as_array()
        .unwrap()
        .iter()
        .all(|l| l["source"] == conv));

    // One hop from a message reaches only its conversation; two hops reach the siblings.
    let first = message_ids[0];
    let (_, one_hop) = send(app.clone(), Method::GET, &format!("/nodes/{first}/children?depth=1"), None).await;
    let mut ids = node_ids(&one_hop);
    ids.sort();
    let mut expected = vec![first.to_string(), conv.to_string()];
    expected.sort();
    assert_eq!(ids, expected);

    let (_, two_hops) = send(app, Method::GET, &format!("/nodes/{first}/children?depth=2"), None).await;
    assert_eq!(node_ids(&two_hops).len(), 5);
}

#[tokio::test]
async fn children_rejects_depth_out_of_range() {
    let (state, _) = api_state();
    let app = api::router(state);

    for depth in [0, 4, 5] {
        let (status, body) = send(
            app.clone(),
            Method::GET,
            &format!("/nodes/anything/children?depth={depth}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "depth {depth}");
        assert!(body["detail"].is_string());
    }
}

#[tokio::test]
async fn children_of_unknown_node_is_empty() {
    let (state, _) = api_state();
    let (status, graph) = send(api::router(state), Method::GET, "/nodes/ghost/children", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(graph, json!({"nodes": [], "links": []}));
}

#[tokio::test]
async fn search_matches_text_ignoring_case() {
    let (state, _) = api_state();
    let app = api::router(state);
    send(app.clone(), Method::POST, "/seed", None).await;

    let (status, graph) = send(app.clone(), Method::GET, "/search?q=GRAPH", None).await;
    assert_eq!(status, StatusCode::OK);
    let nodes = graph["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert!(nodes.iter().all(|n| n["type"] == "message"));
    assert!(nodes
        .iter()
        .all(|n| n["label"].as_str().unwrap().to_lowercase().contains("graph")));
    assert_eq!(graph["links"], json!([]));

    let (_, limited) = send(app.clone(), Method::GET, "/search?q=graph&k=1", None).await;
    assert_eq!(limited["nodes"].as_array().unwrap().len(), 1);

    let (_, none) = send(app, Method::GET, "/search?q=zebra", None).await;
    assert_eq!(none["nodes"], json!([]));
}

#[tokio::test]
async fn similar_orders_by_embedding_distance() {
    let (state, db) = api_state();
    let app = api::router(state);
    let (_, seeded) = send(app.clone(), Method::POST, "/seed", None).await;
    let ids: Vec<String> = seeded["message_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    {
        let conn = db.lock().unwrap();
        store_embedding(&conn, &ids[0], &[1.0, 0.0, 0.0], "test").unwrap();
        store_embedding(&conn, &ids[1], &[0.0, 1.0, 0.0], "test").unwrap();
        store_embedding(&conn, &ids[2], &[0.9, 0.1, 0.0], "test").unwrap();
    }

    let (status, graph) = send(app.clone(), Method::GET, &format!("/nodes/{}/similar?k=2", ids[0]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(node_ids(&graph), vec![ids[2].clone(), ids[1].clone()]);

    // The fourth message never got an embedding.
    let (_, empty) = send(app, Method::GET, &format!("/nodes/{}/similar", ids[3]), None).await;
    assert_eq!(empty["nodes"], json!([]));
}

#[tokio::test]
async fn seed_reports_created_ids() {
    let (state, _) = api_state();
    let (status, body) = send(api::router(state), Method::POST, "/seed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["conversation_id"].is_string());
    assert_eq!(body["message_ids"].as_array().unwrap().len(), 4);
    assert_eq!(body["status"], "Sample data created successfully");
}
