//! wait_with_timeout specs
//!
//! The race is decided by recorded sequence order, never wall clock.

use crate::prelude::*;
use chrono::Duration;

fn guarded(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let task = ctx.schedule("slow", json!({}))?;
    match ctx.wait_with_timeout(&task, Duration::minutes(5)) {
        Ok(output) => Ok(output),
        Err(WaitError::TimedOut) => Ok(json!("timed-out")),
        Err(other) => Err(other.into()),
    }
}

fn timer_of(history: &[tidal_core::EventRecord]) -> tidal_core::TimerId {
    history
        .iter()
        .find_map(|e| match &e.kind {
            EventKind::TimerStarted { timer_id, .. } => Some(timer_id.clone()),
            _ => None,
        })
        .unwrap()
}

#[tokio::test]
async fn timer_firing_first_times_the_wait_out() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("guarded", guarded));
    let id = trigger(&r, "guarded", json!({})).await;
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);

    let history = d.load_history(&id).await.unwrap();
    d.fire_timer(&id, &timer_of(&history)).unwrap();

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!("timed-out")));
}

#[tokio::test]
async fn task_resolving_first_wins_even_if_the_timer_fires_later() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("guarded", guarded));
    let id = trigger(&r, "guarded", json!({})).await;
    r.run_once(&id).await.unwrap();

    complete_pending_kind(&r, &id, "slow", json!("made it")).await;
    let history = d.load_history(&id).await.unwrap();
    d.fire_timer(&id, &timer_of(&history)).unwrap();

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!("made it")));
}
