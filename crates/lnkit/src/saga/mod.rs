//! Saga infrastructure
//!
//! A send is a sequence of store writes and network hand-offs. Each step that
//! leaves state behind registers a [`CompensatingAction`]; if a later step
//! fails the queued actions run newest first so the store is left consistent
//! with what actually reached the network.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::Error;

/// Undo step registered by a saga as it makes progress.
///
/// Actions may run more than once and must tolerate it.
#[async_trait]
pub trait CompensatingAction: Send + Sync {
    /// Run the action
    async fn execute(&self) -> Result<(), Error>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}

/// Pending compensations, newest first
pub type Compensations = Arc<Mutex<VecDeque<Box<dyn CompensatingAction>>>>;

/// Empty compensation queue
pub fn new_compensations() -> Compensations {
    Arc::new(Mutex::new(VecDeque::new()))
}

/// Queue `action` to run before everything registered earlier
pub async fn add_compensation(compensations: &Compensations, action: Box<dyn CompensatingAction>) {
    compensations.lock().await.push_front(action);
}

/// Drain and run every queued compensation, newest first.
///
/// A failing action is logged and the rest still run.
pub async fn execute_compensations(compensations: &Compensations) {
    let mut queue = compensations.lock().await;

    if queue.is_empty() {
        return;
    }

    tracing::warn!("Running {} compensating actions", queue.len());

    while let Some(action) = queue.pop_front() {
        tracing::debug!("Running compensation: {}", action.name());
        if let Err(err) = action.execute().await {
            tracing::error!("Compensation {} failed: {}", action.name(), err);
        }
    }
}

/// Drop every queued compensation once the steps they guard are final
pub async fn clear_compensations(compensations: &Compensations) {
    compensations.lock().await.clear();
}
