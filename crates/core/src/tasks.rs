//! Scheduled-task contract and registry.
//!
//! Tasks declare an interval and whether they are tenant-aware; a runner
//! (infra concern) polls the registry and dispatches due tasks. Tenant-aware
//! tasks run once per tenant context, never globally.

use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;

use crate::id::TenantId;

/// A recurring background task.
pub trait ScheduledTask: Send + Sync {
    /// Stable unique identifier, e.g. `shopcart.clear-expired-cart-items`.
    fn identifier(&self) -> &'static str;

    /// Human-readable description for operators.
    fn description(&self) -> &'static str;

    /// How often the task should run.
    fn interval(&self) -> Duration;

    /// Tenant-aware tasks are invoked once per tenant; the rest run once per
    /// tick with a caller-chosen tenant context.
    fn tenant_aware(&self) -> bool {
        true
    }

    /// Execute one run for the given tenant.
    ///
    /// Tasks are responsible for their own error handling; a run must not
    /// panic the runner.
    fn run(&self, tenant_id: TenantId);
}

/// Registry of scheduled tasks, shared between wiring code and the runner.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<Vec<Arc<dyn ScheduledTask>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: Arc<dyn ScheduledTask>) {
        if let Ok(mut tasks) = self.tasks.write() {
            tasks.push(task);
        }
    }

    pub fn list(&self) -> Vec<Arc<dyn ScheduledTask>> {
        self.tasks
            .read()
            .map(|tasks| tasks.clone())
            .unwrap_or_default()
    }
}

impl core::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let ids: Vec<&'static str> = self.list().iter().map(|t| t.identifier()).collect();
        f.debug_struct("TaskRegistry").field("tasks", &ids).finish()
    }
}
