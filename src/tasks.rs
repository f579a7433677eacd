//! Background embedding of message text.
//!
//! Handlers enqueue `(message_id, text)` jobs without waiting; a single worker
//! embeds each one and writes the vector back onto the node. Jobs are
//! fire-and-forget: a full queue drops the job, a failed embedding is logged
//! and not retried.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::embedding::EmbeddingProvider;
use crate::graph::search::store_embedding;

#[derive(Debug)]
pub struct EmbeddingJob {
    pub message_id: String,
    pub text: String,
}

/// Producer side of the embedding queue. Cheap to clone.
#[derive(Clone)]
pub struct EmbeddingQueue {
    sender: mpsc::Sender<EmbeddingJob>,
}

impl EmbeddingQueue {
    /// Queue a message for embedding. Returns `false` if the job was dropped.
    pub fn enqueue(&self, message_id: String, text: String) -> bool {
        match self.sender.try_send(EmbeddingJob { message_id, text }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(message_id = %job.message_id, "embedding queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(message_id = %job.message_id, "embedding worker stopped, dropping job");
                false
            }
        }
    }
}

/// Start the worker and return the queue that feeds it.
///
/// The worker exits once every [`EmbeddingQueue`] clone has been dropped.
pub fn spawn_embedding_worker(
    db: Arc<Mutex<Connection>>,
    provider: Arc<dyn EmbeddingProvider>,
    capacity: usize,
) -> (EmbeddingQueue, JoinHandle<()>) {
    let (sender, mut receiver) = mpsc::channel::<EmbeddingJob>(capacity.max(1));

    let handle = tokio::spawn(async move {
        tracing::info!(model = %provider.model_name(), "embedding worker started");
        while let Some(job) = receiver.recv().await {
            process_job(&db, provider.as_ref(), job).await;
        }
        tracing::info!("embedding worker stopped");
    });

    (EmbeddingQueue { sender }, handle)
}

async fn process_job(db: &Arc<Mutex<Connection>>, provider: &dyn EmbeddingProvider, job: EmbeddingJob) {
    let vector = match provider.embed(&job.text).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(message_id = %job.message_id, error = %e, "embedding failed");
            return;
        }
    };

    let db = Arc::clone(db);
    let model = provider.model_name().to_string();
    let message_id = job.message_id;
    let result = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|_| crate::error::GraphError::LockPoisoned)?;
        let stored = store_embedding(&conn, &message_id, &vector, &model)?;
        Ok::<_, crate::error::GraphError>((message_id, stored))
    })
    .await;

    match result {
        Ok(Ok((id, true))) => tracing::debug!(message_id = %id, "embedding stored"),
        Ok(Ok((id, false))) => tracing::debug!(message_id = %id, "message gone before embedding landed"),
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to store embedding"),
        Err(e) => tracing::warn!(error = %e, "embedding write task panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::embedding::hashed::HashedEmbedder;
    use crate::graph::conversations::{add_message, create_conversation};
    use crate::graph::search::load_embedding;

    #[tokio::test]
    async fn worker_writes_embedding_back() {
        let mut conn = db::open_memory_database().unwrap();
        let conv = create_conversation(&conn, "Chat").unwrap();
        let msg = add_message(&mut conn, &conv, "user", "embed me").unwrap();
        let db = Arc::new(Mutex::new(conn));

        let (queue, handle) =
            spawn_embedding_worker(Arc::clone(&db), Arc::new(HashedEmbedder::new(16)), 8);
        assert!(queue.enqueue(msg.clone(), "embed me".into()));
        drop(queue);
        handle.await.unwrap();

        let stored = load_embedding(&db.lock().unwrap(), &msg).unwrap().unwrap();
        assert_eq!(stored, HashedEmbedder::new(16).embed_sync("embed me"));
    }

    #[tokio::test]
    async fn missing_message_is_ignored() {
        let conn = db::open_memory_database().unwrap();
        let db = Arc::new(Mutex::new(conn));

        let (queue, handle) =
            spawn_embedding_worker(Arc::clone(&db), Arc::new(HashedEmbedder::new(4)), 1);
        assert!(queue.enqueue("ghost".into(), "text".into()));
        drop(queue);
        handle.await.unwrap();
    }
}
