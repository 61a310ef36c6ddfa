//! Child execution specs
//!
//! Parents observe child outcomes as events in their own log, never as
//! calls into the child.

use crate::prelude::*;

fn parent_flow(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let child = ctx.spawn_child(&ExecutionKind::from("child-flow"), json!({"n": 3}))?;
    let output = ctx.wait_child(&child)?;
    Ok(json!({"child_said": output}))
}

fn child_flow(_ctx: &mut ExecutionContext, input: &Value) -> Result<Value, ExecuteError> {
    Ok(json!(input["n"].as_i64().unwrap_or(0) * 2))
}

fn failing_child(_ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    Err(ExecuteError::fail("child_broke", "nothing to do"))
}

fn tolerant_parent(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let child = ctx.spawn_child(&ExecutionKind::from("child-flow"), json!({}))?;
    match ctx.wait_child(&child) {
        Ok(output) => Ok(output),
        Err(WaitError::TaskFailed(failure)) => Ok(json!({"fallback": failure.code})),
        Err(other) => Err(other.into()),
    }
}

#[tokio::test]
async fn child_outcome_completes_the_parents_wait() {
    let d = dispatcher();
    let registry = RegistryBuilder::new()
        .register("parent-flow", parent_flow)
        .register("child-flow", child_flow);
    let r = runner(&d, registry);
    let parent = trigger(&r, "parent-flow", json!({})).await;
    assert_eq!(r.run_once(&parent).await.unwrap(), RunOutcome::Suspended);

    // The child was created by the parent's commit; run it
    let child = d.children_of(&parent).await.unwrap().remove(0);
    assert_eq!(
        r.run_once(&child).await.unwrap(),
        RunOutcome::Completed(json!(6))
    );

    // Its terminal event fanned out to the parent's log
    let outcome = r.run_once(&parent).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!({"child_said": 6})));
}

#[tokio::test]
async fn child_failure_is_a_value_the_parent_can_handle() {
    let d = dispatcher();
    let registry = RegistryBuilder::new()
        .register("parent-flow", tolerant_parent)
        .register("child-flow", failing_child);
    let r = runner(&d, registry);
    let parent = trigger(&r, "parent-flow", json!({})).await;
    r.run_once(&parent).await.unwrap();

    let child = d.children_of(&parent).await.unwrap().remove(0);
    assert!(matches!(
        r.run_once(&child).await.unwrap(),
        RunOutcome::Failed(_)
    ));

    let outcome = r.run_once(&parent).await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Completed(json!({"fallback": "child_broke"}))
    );
}
