//! One-shot vector store provisioning run at startup
//!
//! Builds a vector store from already uploaded documents and points the
//! assistant's `file_search` tool at it. Failure leaves the assistant with
//! whatever tool resources it had before.

use crate::assistant::{ConversationClient, ToolResources};
use crate::config::VectorStoreConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Create the vector store and attach it to the assistant; returns the store id
pub async fn provision(
    client: &dyn ConversationClient,
    assistant_id: &str,
    config: &VectorStoreConfig,
) -> Result<String> {
    info!(
        "Creating vector store '{}' from {} file(s)",
        config.name,
        config.file_ids.len()
    );

    let store_id = client
        .create_vector_store(&config.name, &config.file_ids)
        .await
        .context("Failed to create vector store")?;

    client
        .update_assistant(
            assistant_id,
            ToolResources {
                vector_store_ids: vec![store_id.clone()],
            },
        )
        .await
        .with_context(|| format!("Failed to attach vector store {} to assistant", store_id))?;

    info!("Assistant {} now searches vector store {}", assistant_id, store_id);
    Ok(store_id)
}

/// Run [`provision`] in the background, logging instead of failing
///
/// Returns `None` when there are no documents to index.
pub fn spawn_provisioning(
    client: Arc<dyn ConversationClient>,
    assistant_id: String,
    config: VectorStoreConfig,
) -> Option<JoinHandle<Option<String>>> {
    if config.file_ids.is_empty() {
        info!("No vector store documents configured, skipping provisioning");
        return None;
    }

    Some(tokio::spawn(async move {
        match provision(client.as_ref(), &assistant_id, &config).await {
            Ok(store_id) => Some(store_id),
            Err(e) => {
                error!("Error setting up vector store: {:#}", e);
                None
            }
        }
    }))
}
