mod common;

use async_trait::async_trait;
use bazaar_trade::{Role, RunOutcome, TaskResult, TaskRunner, TradeContext, TradeTask};
use std::sync::{Arc, Mutex};

struct RecordingTask {
    name: &'static str,
    fail: bool,
    log: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl TradeTask for RecordingTask {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn run(&self, _ctx: &mut TradeContext) -> TaskResult {
        self.log.lock().unwrap().push(self.name);
        if self.fail {
            TaskResult::failed(format!("{} exploded", self.name))
        } else {
            TaskResult::Complete
        }
    }
}

fn tasks(
    log: &Arc<Mutex<Vec<&'static str>>>,
    failing: Option<&'static str>,
) -> Vec<Box<dyn TradeTask>> {
    ["A", "B", "C"]
        .into_iter()
        .map(|name| {
            Box::new(RecordingTask {
                name,
                fail: failing == Some(name),
                log: Arc::clone(log),
            }) as Box<dyn TradeTask>
        })
        .collect()
}

#[tokio::test]
async fn all_tasks_run_in_order() {
    let mut party = common::party(Role::Seller, Some(500_000), 100);
    let log = Arc::new(Mutex::new(Vec::new()));

    let outcome = TaskRunner::new(tasks(&log, None)).run(&mut party.ctx).await;

    assert!(outcome.is_completed());
    assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn no_task_runs_after_a_failure() {
    let mut party = common::party(Role::Seller, Some(500_000), 100);
    let log = Arc::new(Mutex::new(Vec::new()));

    let outcome = TaskRunner::new(tasks(&log, Some("B")))
        .run(&mut party.ctx)
        .await;

    // A completed, B failed, C never ran; the handler got B's cause
    match outcome {
        RunOutcome::Failed { task, cause } => {
            assert_eq!(task, "B");
            assert!(cause.to_string().contains("B exploded"));
        }
        RunOutcome::Completed => panic!("runner must report the failure"),
    }
    assert_eq!(*log.lock().unwrap(), vec!["A", "B"]);
}

#[tokio::test]
async fn intercept_hook_fails_a_task_before_it_runs() {
    let mut party = common::party(Role::Seller, Some(500_000), 100);
    let log = Arc::new(Mutex::new(Vec::new()));

    let outcome = TaskRunner::new(tasks(&log, None))
        .intercept_before(|name| name == "B")
        .run(&mut party.ctx)
        .await;

    match outcome {
        RunOutcome::Failed { task, .. } => assert_eq!(task, "B"),
        RunOutcome::Completed => panic!("intercepted task must fail the run"),
    }
    // B's own logic never executed
    assert_eq!(*log.lock().unwrap(), vec!["A"]);
}
