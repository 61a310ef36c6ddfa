//! Atomic commit specs
//!
//! A batch either lands whole or not at all, and a transport failure
//! is retried by simply re-running the cycle: replay regenerates the
//! identical batch.

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
async fn transport_failure_is_retried_without_duplicates() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("fan-out", fan_out));
    let id = trigger(&r, "fan-out", json!({})).await;

    d.fail_next_appends(1);
    assert!(r.run_once(&id).await.is_err());
    // Nothing of the batch became visible
    assert!(d.tasks_for(&id).await.unwrap().is_empty());
    assert_eq!(d.load_history(&id).await.unwrap().len(), 1);

    // The retry replays the handler and commits the identical batch
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);
    assert_eq!(d.tasks_for(&id).await.unwrap().len(), 3);

    let sequences: Vec<u64> = d
        .load_history(&id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn keyed_triggers_round_trip_to_the_same_execution() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("fan-out", fan_out));
    let tenant = Tenant::from("acme");
    let kind = ExecutionKind::from("fan-out");

    let (first, created) = r
        .trigger(&tenant, &kind, json!({}), Some("order-42"), None)
        .await
        .unwrap();
    assert!(created);
    let (second, created) = r
        .trigger(&tenant, &kind, json!({}), Some("order-42"), None)
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(first, second);
}
