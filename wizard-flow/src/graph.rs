use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{
    context::Context,
    error::{GraphError, Result},
    storage::Session,
    task::{NextAction, Task, TaskResult},
};

/// Type alias for edge condition functions
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Edge between tasks in the graph
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

/// An immutable graph of tasks, built with [`GraphBuilder`]
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl Graph {
    /// Execute the current task of the session and move the session according
    /// to the returned [`NextAction`].
    ///
    /// Exactly one task runs unless it answers `ContinueAndExecute`, in which
    /// case the next task runs in the same call with the same context.
    pub async fn execute_session(&self, session: &mut Session) -> Result<ExecutionResult> {
        if session.completed {
            return Err(GraphError::SessionCompleted(session.id.clone()));
        }

        let result = self
            .execute_single_task(&session.current_task_id, session.context.clone())
            .await?;

        session.status_message = result.status_message.clone();

        match &result.next_action {
            NextAction::Continue => {
                if let Some(next_task_id) = self.find_next_task(&result.task_id, &session.context)
                {
                    session.advance_to(next_task_id);
                }
                Ok(ExecutionResult::waiting(result.response))
            }
            NextAction::ContinueAndExecute => {
                match self.find_next_task(&result.task_id, &session.context) {
                    Some(next_task_id) => {
                        session.advance_to(next_task_id);
                        Box::pin(self.execute_session(session)).await
                    }
                    None => Ok(ExecutionResult::waiting(result.response)),
                }
            }
            NextAction::WaitForInput => Ok(ExecutionResult::waiting(result.response)),
            NextAction::End => {
                session.completed = true;
                Ok(ExecutionResult {
                    response: result.response,
                    status: ExecutionStatus::Completed,
                })
            }
            NextAction::GoTo(target_id) => {
                if !self.contains_task(target_id) {
                    return Err(GraphError::TaskNotFound(target_id.clone()));
                }
                session.jump_to(target_id);
                Ok(ExecutionResult::waiting(result.response))
            }
            NextAction::GoBack => {
                session.go_back();
                Ok(ExecutionResult::waiting(result.response))
            }
        }
    }

    /// Execute a single task without following any action
    async fn execute_single_task(&self, task_id: &str, context: Context) -> Result<TaskResult> {
        let task = self
            .get_task(task_id)
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        debug!(graph_id = %self.id, task_id = %task_id, "running task");
        let mut result = task.run(context).await?;
        result.task_id = task_id.to_string();

        Ok(result)
    }

    /// Find the next task based on edges and conditions.
    ///
    /// Edges are checked in insertion order; the first unconditional edge or
    /// conditional edge whose condition holds wins.
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .filter(|edge| edge.from == current_task_id)
            .find(|edge| match &edge.condition {
                Some(condition) => condition(context),
                None => true,
            })
            .map(|edge| edge.to.clone())
    }

    pub fn start_task_id(&self) -> Option<String> {
        self.start_task_id.clone()
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).cloned()
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start_task_id: Option<String>,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start_task_id: None,
        }
    }

    /// Add a task. The first task added becomes the start task.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.start_task_id.is_none() {
            self.start_task_id = Some(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    /// Route to `yes` when `condition` holds, otherwise to `no`
    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        condition: F,
        yes: impl Into<String>,
        no: impl Into<String>,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        let from = from.into();
        self.edges.push(Edge {
            from: from.clone(),
            to: yes.into(),
            condition: Some(Arc::new(condition)),
        });
        self.edges.push(Edge {
            from,
            to: no.into(),
            condition: None,
        });
        self
    }

    pub fn build(self) -> Graph {
        Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            start_task_id: self.start_task_id,
        }
    }
}

/// Status of graph execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

impl ExecutionResult {
    fn waiting(response: Option<String>) -> Self {
        Self {
            response,
            status: ExecutionStatus::WaitingForInput,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Waiting for more input before the session can move on
    WaitingForInput,
    /// The session reached an end task
    Completed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Replays whatever action the context asks for
    struct ScriptedTask {
        id: &'static str,
    }

    #[async_trait]
    impl Task for ScriptedTask {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let action: NextAction = context
                .get("action")
                .await
                .unwrap_or(NextAction::WaitForInput);
            let mut visited: Vec<String> = context.get("visited").await.unwrap_or_default();
            visited.push(self.id.to_string());
            context.set("visited", visited).await?;
            // ContinueAndExecute only applies to the first task in the chain
            context.set("action", NextAction::WaitForInput).await?;
            Ok(TaskResult::new(Some(self.id.to_string()), action))
        }
    }

    fn linear_graph() -> Graph {
        GraphBuilder::new("linear")
            .add_task(Arc::new(ScriptedTask { id: "one" }))
            .add_task(Arc::new(ScriptedTask { id: "two" }))
            .add_task(Arc::new(ScriptedTask { id: "three" }))
            .add_edge("one", "two")
            .add_edge("two", "three")
            .build()
    }

    async fn step(graph: &Graph, session: &mut Session, action: NextAction) -> ExecutionResult {
        session.context.set("action", action).await.unwrap();
        graph.execute_session(session).await.unwrap()
    }

    #[tokio::test]
    async fn first_task_is_start_task() {
        let graph = linear_graph();
        assert_eq!(graph.start_task_id().as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn continue_moves_without_running_next_task() {
        let graph = linear_graph();
        let mut session = Session::new_from_task("s".into(), "one");

        let result = step(&graph, &mut session, NextAction::Continue).await;

        assert_eq!(result.status, ExecutionStatus::WaitingForInput);
        assert_eq!(session.current_task_id, "two");
        assert_eq!(session.history, vec!["one".to_string()]);
        let visited: Vec<String> = session.context.get_sync("visited").unwrap();
        assert_eq!(visited, vec!["one".to_string()]);
    }

    #[tokio::test]
    async fn continue_and_execute_runs_next_task() {
        let graph = linear_graph();
        let mut session = Session::new_from_task("s".into(), "one");

        let result = step(&graph, &mut session, NextAction::ContinueAndExecute).await;

        assert_eq!(result.response.as_deref(), Some("two"));
        assert_eq!(session.current_task_id, "two");
    }

    #[tokio::test]
    async fn go_back_returns_along_history() {
        let graph = linear_graph();
        let mut session = Session::new_from_task("s".into(), "one");
        step(&graph, &mut session, NextAction::Continue).await;
        step(&graph, &mut session, NextAction::Continue).await;
        assert_eq!(session.current_task_id, "three");

        step(&graph, &mut session, NextAction::GoBack).await;
        assert_eq!(session.current_task_id, "two");

        step(&graph, &mut session, NextAction::GoBack).await;
        step(&graph, &mut session, NextAction::GoBack).await;
        assert_eq!(session.current_task_id, "one");
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn go_to_earlier_task_rewinds_history() {
        let graph = linear_graph();
        let mut session = Session::new_from_task("s".into(), "one");
        step(&graph, &mut session, NextAction::Continue).await;
        step(&graph, &mut session, NextAction::Continue).await;

        step(&graph, &mut session, NextAction::GoTo("two".into())).await;
        assert_eq!(session.current_task_id, "two");
        assert_eq!(session.history, vec!["one".to_string()]);

        step(&graph, &mut session, NextAction::GoBack).await;
        assert_eq!(session.current_task_id, "one");
    }

    #[tokio::test]
    async fn go_to_unknown_task_fails() {
        let graph = linear_graph();
        let mut session = Session::new_from_task("s".into(), "one");
        session
            .context
            .set("action", NextAction::GoTo("nowhere".into()))
            .await
            .unwrap();

        let err = graph.execute_session(&mut session).await.unwrap_err();

        assert!(matches!(err, GraphError::TaskNotFound(id) if id == "nowhere"));
    }

    #[tokio::test]
    async fn ended_session_rejects_further_steps() {
        let graph = linear_graph();
        let mut session = Session::new_from_task("s".into(), "one");

        let result = step(&graph, &mut session, NextAction::End).await;
        assert_eq!(result.status, ExecutionStatus::Completed);

        let err = graph.execute_session(&mut session).await.unwrap_err();
        assert!(matches!(err, GraphError::SessionCompleted(_)));
    }

    #[tokio::test]
    async fn conditional_edge_picks_branch() {
        let graph = GraphBuilder::new("branching")
            .add_task(Arc::new(ScriptedTask { id: "start" }))
            .add_task(Arc::new(ScriptedTask { id: "left" }))
            .add_task(Arc::new(ScriptedTask { id: "right" }))
            .add_conditional_edge(
                "start",
                |context| context.get_sync::<bool>("go_left").unwrap_or(false),
                "left",
                "right",
            )
            .build();

        let mut session = Session::new_from_task("s".into(), "start");
        session.context.set("go_left", true).await.unwrap();
        step(&graph, &mut session, NextAction::Continue).await;
        assert_eq!(session.current_task_id, "left");

        let mut session = Session::new_from_task("s2".into(), "start");
        step(&graph, &mut session, NextAction::Continue).await;
        assert_eq!(session.current_task_id, "right");
    }
}
