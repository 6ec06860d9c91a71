//! The perceive, plan, act loop.
//!
//! ```text
//! INIT ──► ITERATING ──► COMPLETE
//!              │
//!              └───────► FAILED
//! ```
//!
//! Each iteration re-extracts the page, asks the planner for a plan and runs
//! its actions in order. Per-action failures are recorded in the history and
//! never stop the loop; the fatal conditions are the [`TaskFailure`] variants.

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::config::AgentConfig;
use crate::dom_utils::Document;
use crate::executor::ActionExecutor;
use crate::extractor::extract;
use crate::llm::{PlanningClient, PlanningError, PlanningTransport};
use crate::page_kind;
use crate::plan::HistoryEntry;
use crate::profile::{ProfileStore, UserProfile};
use crate::prompt::{build_prompt, PageContext};
use crate::timer::sleep;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskFailure {
    #[error("no interactive elements found on page (is it a canvas or strict iframe?)")]
    NoInteractiveElements,
    #[error("planning failed: {0}")]
    PlanningFailure(PlanningError),
    #[error("no actionable plan: the planner returned no actions (check that the needed data is saved in the profile)")]
    StallNoActions,
    #[error("max attempts reached without completion ({iterations} iterations)")]
    BudgetExhausted { iterations: usize },
}

/// Everything one task carries between iterations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskContext {
    pub goal: String,
    /// Stored profile overlaid with the task's own data.
    pub user_data: UserProfile,
    pub history: Vec<HistoryEntry>,
    /// 1-based; 0 until the first iteration starts.
    pub iteration: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Completed { history: Vec<HistoryEntry> },
    Failed { failure: TaskFailure, history: Vec<HistoryEntry> },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Completed { .. })
    }

    pub fn history(&self) -> &[HistoryEntry] {
        match self {
            TaskOutcome::Completed { history } | TaskOutcome::Failed { history, .. } => history,
        }
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        match self {
            TaskOutcome::Completed { .. } => None,
            TaskOutcome::Failed { failure, .. } => Some(failure),
        }
    }

    /// `{success: true, history}` or `{success: false, error}`.
    pub fn report(&self) -> TaskReport {
        match self {
            TaskOutcome::Completed { history } => TaskReport {
                success: true,
                history: Some(history.clone()),
                error: None,
            },
            TaskOutcome::Failed { failure, .. } => TaskReport {
                success: false,
                history: None,
                error: Some(failure.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

enum Step {
    Continue,
    Complete,
}

pub struct DomAgent<D, T, S> {
    document: D,
    planner: PlanningClient<T>,
    store: S,
    config: AgentConfig,
}

impl<D, T, S> DomAgent<D, T, S>
where
    D: Document,
    T: PlanningTransport,
    S: ProfileStore,
{
    pub fn new(document: D, transport: T, store: S, config: AgentConfig) -> Self {
        let planner = PlanningClient::new(transport, config.planning_timeout());
        DomAgent { document, planner, store, config }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Runs one task to completion. Taking `&mut self` keeps a second task
    /// from starting on the same page while this one runs.
    pub async fn perform_task(&mut self, goal: &str, task_data: &UserProfile) -> TaskOutcome {
        info!("Starting task: {}", goal);
        let mut context = self.start(goal, task_data).await;
        match self.run(&mut context).await {
            Ok(()) => {
                info!(
                    "Task complete after {} iteration(s), {} action(s)",
                    context.iteration,
                    context.history.len()
                );
                TaskOutcome::Completed { history: context.history }
            }
            Err(failure) => {
                error!("Task failed: {}", failure);
                TaskOutcome::Failed { failure, history: context.history }
            }
        }
    }

    async fn start(&self, goal: &str, task_data: &UserProfile) -> TaskContext {
        let stored = match self.store.load(&self.config.profile_record).await {
            Ok(profile) => profile,
            Err(err) => {
                warn!("Using an empty profile: {}", err);
                UserProfile::default()
            }
        };
        let user_data = stored.merged_with(task_data);
        debug!("Merged user data has {} key(s)", user_data.len());
        TaskContext {
            goal: goal.to_string(),
            user_data,
            history: Vec::new(),
            iteration: 0,
        }
    }

    async fn run(&self, context: &mut TaskContext) -> Result<(), TaskFailure> {
        for iteration in 1..=self.config.max_iterations {
            context.iteration = iteration;
            if let Step::Complete = self.step(context).await? {
                return Ok(());
            }
        }
        Err(TaskFailure::BudgetExhausted { iterations: self.config.max_iterations })
    }

    async fn step(&self, context: &mut TaskContext) -> Result<Step, TaskFailure> {
        let pass = extract(&self.document, self.config.value_snippet_len);
        info!("Iteration {}: {} interactive elements", context.iteration, pass.len());
        if pass.is_empty() {
            return Err(TaskFailure::NoInteractiveElements);
        }

        let page = PageContext {
            title: self.document.title(),
            url: self.document.url(),
            kind: page_kind::detect(&self.document),
        };
        let prompt = build_prompt(&context.goal, &context.user_data, pass.elements(), &context.history, &page);
        debug!("Prompt:\n{}", prompt);

        let plan = self
            .planner
            .plan(&prompt)
            .await
            .map_err(TaskFailure::PlanningFailure)?;
        if !plan.reasoning.is_empty() {
            info!("Planner reasoning: {}", plan.reasoning);
        }

        // A completed plan ends the task even when it still lists actions.
        if plan.complete {
            if !plan.actions.is_empty() {
                debug!("Not executing {} action(s) of a completed plan", plan.actions.len());
            }
            return Ok(Step::Complete);
        }

        if plan.actions.is_empty() {
            if context.history.is_empty() {
                return Err(TaskFailure::StallNoActions);
            }
            warn!("Planner returned no actions; assuming earlier actions reached the goal");
            return Ok(Step::Complete);
        }

        let executor = ActionExecutor::new(&self.document, &pass, &self.config);
        for action in plan.actions {
            let result = executor.execute(&action).await;
            context.history.push(HistoryEntry { action, result });
            sleep(self.config.action_delay()).await;
        }
        sleep(self.config.settle_delay()).await;
        Ok(Step::Continue)
    }
}
