//! FlowRunner – loads a session, executes one graph step, and persists the updated session back
//! to storage.
//!
//! Every call for a given session id is serialised through a per-session async lock, so two
//! requests for the same session can never interleave their load → execute → save cycles. A
//! caller that needs to edit the session before stepping (for instance to put user input into
//! the context) takes a [`SessionLease`], edits it, steps it and releases it while holding the
//! lock the whole time:
//!
//! ```rust,ignore
//! let mut lease = runner.acquire(&session_id).await?;
//! lease.session().context.set("input", payload).await?;
//! let result = runner.step(&mut lease).await?;
//! runner.release(lease).await?;
//! ```
//!
//! [`FlowRunner::run`] is the one-liner for the common case.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{GraphError, Result},
    graph::{ExecutionResult, Graph},
    storage::{Session, SessionStorage},
};

/// High-level helper that orchestrates the _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
    storage: Arc<dyn SessionStorage>,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// A session loaded under its lock. Dropping a lease without releasing it
/// discards changes to the session's task position.
#[derive(Debug)]
pub struct SessionLease {
    session: Session,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLease {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

impl FlowRunner {
    pub fn new(graph: Arc<Graph>, storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            graph,
            storage,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    pub fn storage(&self) -> &Arc<dyn SessionStorage> {
        &self.storage
    }

    /// Create a session positioned on the graph's start task and store it.
    pub async fn open(&self, session_id: impl Into<String>) -> Result<Session> {
        let start = self
            .graph
            .start_task_id()
            .ok_or_else(|| GraphError::TaskNotFound("<start>".to_string()))?;
        let mut session = Session::new_from_task(session_id.into(), &start);
        session.graph_id = self.graph.id.clone();
        self.storage.save(session.clone()).await?;
        Ok(session)
    }

    /// Load a session and hold its lock until the lease is released or dropped.
    pub async fn acquire(&self, session_id: &str) -> Result<SessionLease> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.clone().lock_owned().await;

        match self.storage.get(session_id).await? {
            Some(session) => Ok(SessionLease {
                session,
                _guard: guard,
            }),
            None => {
                drop(guard);
                // only the table and `lock` still point at it: nobody is waiting
                self.locks.remove_if(session_id, |_, entry| {
                    Arc::ptr_eq(entry, &lock) && Arc::strong_count(entry) == 2
                });
                Err(GraphError::SessionNotFound(session_id.to_string()))
            }
        }
    }

    /// Execute the leased session's current task.
    pub async fn step(&self, lease: &mut SessionLease) -> Result<ExecutionResult> {
        self.graph.execute_session(&mut lease.session).await
    }

    /// Persist the leased session and drop its lock.
    pub async fn release(&self, lease: SessionLease) -> Result<()> {
        self.storage.save(lease.session).await
    }

    /// Execute **exactly one** step for the given `session_id` and persist the updated session.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut lease = self.acquire(session_id).await?;
        let result = self.step(&mut lease).await?;
        self.release(lease).await?;
        Ok(result)
    }

    /// Remove a session and its lock.
    pub async fn forget(&self, session_id: &str) -> Result<()> {
        self.storage.delete(session_id).await?;
        self.locks.remove(session_id);
        Ok(())
    }
}
