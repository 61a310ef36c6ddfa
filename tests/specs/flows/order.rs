//! Order flow specs
//!
//! The canonical multi-cycle flow: charge, checkpoint, wait for
//! approval, ship. Exercises tasks, checkpoints, and signals together.

use crate::prelude::*;

fn approval() -> SignalName {
    SignalName::new("approval").unwrap()
}

fn order_flow(ctx: &mut ExecutionContext, input: &Value) -> Result<Value, ExecuteError> {
    let charge = ctx.schedule("charge", json!({"order": input["order"]}))?;
    let receipt = ctx.wait_task(&charge)?;
    ctx.checkpoint(json!({"stage": "charged", "receipt": receipt.clone()}))?;

    let approved_by = ctx.wait_for_signal(&approval())?;
    let ship = ctx.schedule("ship", json!({"approval": approved_by}))?;
    let tracking = ctx.wait_task(&ship)?;
    Ok(json!({"receipt": receipt, "tracking": tracking}))
}

#[tokio::test]
async fn runs_to_completion_across_cycles() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("order-flow", order_flow));
    let id = trigger(&r, "order-flow", json!({"order": 42})).await;

    // charge scheduled, parked
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);
    complete_pending_kind(&r, &id, "charge", json!("receipt-1")).await;

    // checkpoint commits, then parked waiting for approval
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);

    d.deliver_signal(&id, &approval(), json!({"by": "ops"}), None)
        .await
        .unwrap();
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);
    complete_pending_kind(&r, &id, "ship", json!("track-9")).await;

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Completed(json!({"receipt": "receipt-1", "tracking": "track-9"}))
    );

    // Despite five full replays: one charge, one ship, one checkpoint
    assert_eq!(d.tasks_for(&id).await.unwrap().len(), 2);
    let checkpoints = d
        .load_history(&id)
        .await
        .unwrap()
        .iter()
        .filter(|e| e.kind.name() == "execution:checkpoint")
        .count();
    assert_eq!(checkpoints, 1);
}

#[tokio::test]
async fn checkpoint_survives_in_history_for_recovery() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("order-flow", order_flow));
    let id = trigger(&r, "order-flow", json!({"order": 7})).await;
    r.run_once(&id).await.unwrap();
    complete_pending_kind(&r, &id, "charge", json!("receipt-7")).await;
    r.run_once(&id).await.unwrap();

    let history = d.load_history(&id).await.unwrap();
    let checkpoint = history
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::Checkpoint { state } => Some(state.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(checkpoint, json!({"stage": "charged", "receipt": "receipt-7"}));
}
