//! Runtime configuration.

use serde::{Deserialize, Serialize};

use crate::eval::FINISHED_PROGRESS;
use crate::graph::DEFAULT_TRANSITION_MS;

/// Tunables for [`crate::runtime::AsmRuntime`]. Missing JSON fields take defaults.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    /// Crossfade length when no edge connects the previous and next state.
    pub default_blend_ms: f32,
    /// Progress at which a stopped clip counts as finished for exit-time gating.
    pub finished_progress: f32,
    /// Maximum events retained per tick; later events are dropped.
    pub max_events_per_tick: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_blend_ms: DEFAULT_TRANSITION_MS,
            finished_progress: FINISHED_PROGRESS,
            max_events_per_tick: 256,
        }
    }
}
