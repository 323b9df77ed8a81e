//! Per-conversation state persistence
//!
//! In-memory only; state is lost on restart.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ConversationState;
use crate::Result;

/// Trait for conversation state persistence
#[async_trait::async_trait]
pub trait ConversationStore: Send + Sync {
    /// Current state; unknown conversations start at `AwaitingDocument`
    async fn load(&self, conversation_id: Uuid) -> Result<ConversationState>;
    async fn save(&self, conversation_id: Uuid, state: ConversationState) -> Result<()>;
    async fn reset(&self, conversation_id: Uuid) -> Result<()>;
}

pub struct InMemoryConversationStore {
    states: Arc<RwLock<HashMap<Uuid, ConversationState>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            states: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, conversation_id: Uuid) -> Result<ConversationState> {
        let states = self.states.read().await;
        Ok(states
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, conversation_id: Uuid, state: ConversationState) -> Result<()> {
        let mut states = self.states.write().await;
        states.insert(conversation_id, state);
        Ok(())
    }

    async fn reset(&self, conversation_id: Uuid) -> Result<()> {
        let mut states = self.states.write().await;
        states.remove(&conversation_id);
        Ok(())
    }
}
