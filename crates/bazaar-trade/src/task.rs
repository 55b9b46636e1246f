use crate::context::TradeContext;
use async_trait::async_trait;
use bazaar_types::BazaarError;
use tracing::{debug, error};

/// Outcome a task reports, exactly once, when it returns.
#[derive(Debug)]
pub enum TaskResult {
    Complete,
    Failed(BazaarError),
}

impl TaskResult {
    pub fn failed(cause: impl Into<String>) -> Self {
        TaskResult::Failed(BazaarError::Trade(cause.into()))
    }
}

/// One atomic protocol step operating on the shared trade context.
///
/// Tasks are stateless: everything they read and write lives in the
/// context. A task either completes or fails with a cause; the runner never
/// retries on its own.
#[async_trait]
pub trait TradeTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &mut TradeContext) -> TaskResult;
}

/// Result of a whole runner invocation.
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed {
        task: &'static str,
        cause: BazaarError,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Executes an ordered list of tasks sequentially against one trade
/// context. The next task starts only after the previous one completed;
/// after a failure no further task in the run is started.
pub struct TaskRunner {
    tasks: Vec<Box<dyn TradeTask>>,
    intercept: Option<Box<dyn Fn(&str) -> bool + Send + Sync>>,
}

impl TaskRunner {
    pub fn new(tasks: Vec<Box<dyn TradeTask>>) -> Self {
        Self {
            tasks,
            intercept: None,
        }
    }

    /// Install the intercept hook consulted before each task's main logic.
    /// Returning `true` fails that task without running it, so tests can
    /// inject faults at any step without touching production code.
    pub fn intercept_before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.intercept = Some(Box::new(hook));
        self
    }

    pub async fn run(self, ctx: &mut TradeContext) -> RunOutcome {
        for task in &self.tasks {
            let name = task.name();

            if let Some(hook) = &self.intercept {
                if hook(name) {
                    error!(trade_id = %ctx.trade.id, task = name, "Task intercepted");
                    return RunOutcome::Failed {
                        task: name,
                        cause: BazaarError::Trade(format!("task {} intercepted", name)),
                    };
                }
            }

            debug!(trade_id = %ctx.trade.id, task = name, "Running task");
            match task.run(ctx).await {
                TaskResult::Complete => {
                    debug!(trade_id = %ctx.trade.id, task = name, "Task completed");
                }
                TaskResult::Failed(cause) => {
                    error!(
                        trade_id = %ctx.trade.id,
                        task = name,
                        cause = %cause,
                        "Task failed, aborting remaining tasks"
                    );
                    return RunOutcome::Failed { task: name, cause };
                }
            }
        }
        RunOutcome::Completed
    }
}
