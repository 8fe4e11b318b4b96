//! Inspector configuration.

use serde::{Deserialize, Serialize};

/// What to do when a breakpoint condition throws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionErrorPolicy {
    /// Treat the condition as false and keep running.
    #[default]
    Skip,
    /// Pause as if the condition held.
    Pause,
}

/// Limits and policies shared by every context group of an [`Inspector`](crate::Inspector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// Source bytes a group retains before older scripts are evicted.
    pub max_collected_scripts_size: usize,
    /// Async tasks retained per group before the oldest prunable ones go.
    pub max_async_task_stacks: usize,
    /// Upper bound for `Debugger.setAsyncCallStackDepth`.
    pub max_async_call_stack_depth: u32,
    /// What a breakpoint condition that throws does.
    pub condition_error_policy: ConditionErrorPolicy,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            max_collected_scripts_size: 10_000_000,
            max_async_task_stacks: 128 * 1024,
            max_async_call_stack_depth: 32,
            condition_error_policy: ConditionErrorPolicy::Skip,
        }
    }
}
