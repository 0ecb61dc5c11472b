use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{Context, error::Result};

/// Session information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub graph_id: String,
    pub current_task_id: String,
    /// Tasks the session came through, most recent last
    #[serde(default)]
    pub history: Vec<String>,
    pub status_message: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub context: Context,
}

impl Session {
    pub fn new_from_task(sid: String, task_name: &str) -> Self {
        Self {
            id: sid,
            graph_id: "default".to_string(),
            current_task_id: task_name.to_string(),
            history: Vec::new(),
            status_message: None,
            completed: false,
            context: Context::new(),
        }
    }

    pub(crate) fn advance_to(&mut self, task_id: String) {
        let previous = std::mem::replace(&mut self.current_task_id, task_id);
        self.history.push(previous);
    }

    /// Jump to `task_id`. Jumping back to a task already in the history
    /// rewinds the history to the point the session first left it.
    pub(crate) fn jump_to(&mut self, task_id: &str) {
        if self.current_task_id == task_id {
            return;
        }
        match self.history.iter().position(|id| id == task_id) {
            Some(position) => {
                self.history.truncate(position);
                self.current_task_id = task_id.to_string();
            }
            None => self.advance_to(task_id.to_string()),
        }
    }

    pub(crate) fn go_back(&mut self) {
        if let Some(previous) = self.history.pop() {
            self.current_task_id = previous;
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage. Sessions live as long as the
/// process does.
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
