//! Shared helpers for the spec suite

pub use serde_json::{json, Value};
pub use std::sync::Arc;
pub use tidal_core::{
    EventKind, ExecutionId, ExecutionKind, FakeClock, SequentialIdGen, SignalName, TaskStatus,
    Tenant,
};
pub use tidal_dispatch::{Dispatcher, MemoryDispatcher};
pub use tidal_engine::{
    ExecuteError, ExecutionContext, RegistryBuilder, ReplayEngine, RunOutcome, Runner, WaitError,
};

pub type TestDispatcher = MemoryDispatcher<FakeClock, SequentialIdGen>;

pub fn dispatcher() -> Arc<TestDispatcher> {
    Arc::new(MemoryDispatcher::with_parts(
        FakeClock::new(),
        SequentialIdGen::new("n"),
    ))
}

pub fn runner(d: &Arc<TestDispatcher>, registry: RegistryBuilder) -> Runner<TestDispatcher> {
    Runner::new(d.clone(), Arc::new(registry.freeze()))
}

pub async fn trigger(r: &Runner<TestDispatcher>, kind: &str, input: Value) -> ExecutionId {
    let (id, _) = r
        .trigger(
            &Tenant::from("acme"),
            &ExecutionKind::from(kind),
            input,
            None,
            None,
        )
        .await
        .unwrap();
    id
}

/// Complete the pending task of the given kind (worker stand-in)
pub async fn complete_pending_kind(
    r: &Runner<TestDispatcher>,
    id: &ExecutionId,
    kind: &str,
    output: Value,
) {
    let task = r
        .dispatcher()
        .tasks_for(id)
        .await
        .unwrap()
        .into_iter()
        .find(|t| t.kind == kind && t.status == TaskStatus::Pending)
        .unwrap();
    r.dispatcher().complete_task(&task.id, output).unwrap();
}
