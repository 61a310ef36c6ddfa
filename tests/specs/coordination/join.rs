//! join_all specs
//!
//! Result order follows input order regardless of when each task
//! completed.

use crate::prelude::*;

fn fan_out(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let tasks = vec![
        ctx.schedule("fetch", json!({"part": 1}))?,
        ctx.schedule("fetch", json!({"part": 2}))?,
        ctx.schedule("fetch", json!({"part": 3}))?,
    ];
    let outputs = ctx.join_all(&tasks)?;
    Ok(Value::Array(outputs))
}

#[tokio::test]
async fn preserves_input_order_under_reordered_completions() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("fan-out", fan_out));
    let id = trigger(&r, "fan-out", json!({})).await;
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);

    // Complete in an order unrelated to scheduling order
    let mut tasks = d.tasks_for(&id).await.unwrap();
    tasks.reverse();
    for task in &tasks {
        let part = task.input["part"].clone();
        d.complete_task(&task.id, json!({"part": part})).unwrap();
    }

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Completed(json!([{"part": 1}, {"part": 2}, {"part": 3}]))
    );
}

#[tokio::test]
async fn suspends_until_the_last_task_resolves() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("fan-out", fan_out));
    let id = trigger(&r, "fan-out", json!({})).await;
    r.run_once(&id).await.unwrap();

    let tasks = d.tasks_for(&id).await.unwrap();
    d.complete_task(&tasks[0].id, json!({"part": 1})).unwrap();
    d.complete_task(&tasks[1].id, json!({"part": 2})).unwrap();
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);

    d.complete_task(&tasks[2].id, json!({"part": 3})).unwrap();
    assert!(matches!(
        r.run_once(&id).await.unwrap(),
        RunOutcome::Completed(_)
    ));
}

#[tokio::test]
async fn one_failure_fails_the_whole_join() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("fan-out", fan_out));
    let id = trigger(&r, "fan-out", json!({})).await;
    r.run_once(&id).await.unwrap();

    let tasks = d.tasks_for(&id).await.unwrap();
    d.complete_task(&tasks[0].id, json!({"part": 1})).unwrap();
    d.fail_task(&tasks[1].id, tidal_core::TaskFailure::new("declined", "no"))
        .unwrap();
    d.complete_task(&tasks[2].id, json!({"part": 3})).unwrap();

    match r.run_once(&id).await.unwrap() {
        RunOutcome::Failed(failure) => assert_eq!(failure.code, "declined"),
        other => panic!("unexpected: {other:?}"),
    }
}
