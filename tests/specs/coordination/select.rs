//! select_ok specs
//!
//! The winner is decided by recorded sequence, and losers that already
//! resolved keep their outcome (cancel racing completion is a no-op).

use crate::prelude::*;

fn race(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let slow = ctx.schedule("slow", json!({}))?;
    let fast = ctx.schedule("fast", json!({}))?;
    let (_winner, output) = ctx.select_ok(&[slow, fast])?;
    Ok(output)
}

#[tokio::test]
async fn cancels_the_loser_and_keeps_the_winner() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("race", race));
    let id = trigger(&r, "race", json!({})).await;
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);

    complete_pending_kind(&r, &id, "fast", json!("fast won")).await;
    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!("fast won")));

    // The losing task got a best-effort cancel, committed in the same
    // batch as the terminal event
    let tasks = d.tasks_for(&id).await.unwrap();
    let slow = tasks.iter().find(|t| t.kind == "slow").unwrap();
    assert_eq!(slow.status, TaskStatus::Cancelled);
}

#[tokio::test]
async fn cancel_racing_a_completion_keeps_the_completion() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("race", race));
    let id = trigger(&r, "race", json!({})).await;
    r.run_once(&id).await.unwrap();

    // Both resolve before the next cycle; the lower sequence wins and
    // the loser keeps its natural completion
    complete_pending_kind(&r, &id, "slow", json!("slow done")).await;
    complete_pending_kind(&r, &id, "fast", json!("fast done")).await;

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!("slow done")));
    let tasks = d.tasks_for(&id).await.unwrap();
    let fast = tasks.iter().find(|t| t.kind == "fast").unwrap();
    assert_eq!(fast.status, TaskStatus::Completed);
    assert_eq!(fast.output, Some(json!("fast done")));
}

#[tokio::test]
async fn every_task_failing_fails_the_select() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("race", race));
    let id = trigger(&r, "race", json!({})).await;
    r.run_once(&id).await.unwrap();

    for task in d.tasks_for(&id).await.unwrap() {
        d.fail_task(&task.id, tidal_core::TaskFailure::new("down", "backend down"))
            .unwrap();
    }

    match r.run_once(&id).await.unwrap() {
        RunOutcome::Failed(failure) => assert_eq!(failure.code, "all_failed"),
        other => panic!("unexpected: {other:?}"),
    }
}
