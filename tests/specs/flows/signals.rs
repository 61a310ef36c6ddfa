//! Signal delivery specs
//!
//! Signals are per-name FIFO channels: values buffer until the
//! execution waits, and a drain sees exactly what was buffered when it
//! ran, on every replay.

use crate::prelude::*;

fn message() -> SignalName {
    SignalName::new("message").unwrap()
}

fn two_messages(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let first = ctx.wait_for_signal(&message())?;
    let second = ctx.wait_for_signal(&message())?;
    Ok(json!([first, second]))
}

fn drains_inbox(ctx: &mut ExecutionContext, _input: &Value) -> Result<Value, ExecuteError> {
    let trigger = ctx.wait_for_signal(&message())?;
    let rest = ctx.drain_signals(&message());
    let mut all = vec![trigger];
    all.extend(rest);
    Ok(Value::Array(all))
}

#[tokio::test]
async fn values_buffered_before_any_wait_resolve_in_order() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("chat", two_messages));
    let id = trigger(&r, "chat", json!({})).await;

    d.deliver_signal(&id, &message(), json!("first"), None)
        .await
        .unwrap();
    d.deliver_signal(&id, &message(), json!("second"), None)
        .await
        .unwrap();

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!(["first", "second"])));
}

#[tokio::test]
async fn drain_sees_exactly_the_buffered_values() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("inbox", drains_inbox));
    let id = trigger(&r, "inbox", json!({})).await;
    assert_eq!(r.run_once(&id).await.unwrap(), RunOutcome::Suspended);

    d.deliver_signal(&id, &message(), json!("a"), None).await.unwrap();
    d.deliver_signal(&id, &message(), json!("b"), None).await.unwrap();
    d.deliver_signal(&id, &message(), json!("c"), None).await.unwrap();

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!(["a", "b", "c"])));
}

#[tokio::test]
async fn signal_or_start_creates_on_first_contact_then_signals() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("inbox", drains_inbox));

    let (id, _) = d
        .signal_or_start(
            &Tenant::from("acme"),
            "user-7",
            &ExecutionKind::from("inbox"),
            json!({}),
            &message(),
            json!("hello"),
        )
        .await
        .unwrap();
    let (same, _) = d
        .signal_or_start(
            &Tenant::from("acme"),
            "user-7",
            &ExecutionKind::from("inbox"),
            json!({}),
            &message(),
            json!("again"),
        )
        .await
        .unwrap();
    assert_eq!(id, same);

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!(["hello", "again"])));
}

#[tokio::test]
async fn redelivered_signal_with_the_same_key_is_deduplicated() {
    let d = dispatcher();
    let r = runner(&d, RegistryBuilder::new().register("chat", two_messages));
    let id = trigger(&r, "chat", json!({})).await;

    d.deliver_signal(&id, &message(), json!("once"), Some("delivery-1"))
        .await
        .unwrap();
    d.deliver_signal(&id, &message(), json!("once"), Some("delivery-1"))
        .await
        .unwrap();
    d.deliver_signal(&id, &message(), json!("twice"), None)
        .await
        .unwrap();

    let outcome = r.run_once(&id).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed(json!(["once", "twice"])));
}
