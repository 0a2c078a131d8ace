//! Per-tick results returned by the runtime.
//!
//! Hosts poll these instead of subscribing to callbacks: `TickReport.changed`
//! says whether the active state moved, and `events` lists what happened in
//! order.

use serde::{Deserialize, Serialize};

use crate::blend::{ActiveTransition, BlendPhase};
use crate::ids::{ParamId, StateId, TransitionId};
use crate::params::Parameter;

/// Discrete signals emitted during a tick.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RuntimeEvent {
    TransitionFired {
        transition: TransitionId,
        from: StateId,
        to: StateId,
        via_any: bool,
        redirected: bool,
    },
    StateActivated {
        state: StateId,
        previous: Option<StateId>,
    },
    BlendStarted {
        from_clip: Option<String>,
        to_clip: String,
        duration_ms: f32,
    },
    BlendSuperseded {
        stopped_clip: String,
    },
    BlendCompleted {
        to_clip: String,
        stopped_clip: Option<String>,
    },
    TriggersReset {
        params: Vec<ParamId>,
    },
    EditRejected {
        message: String,
    },
}

/// Outcome of one `advance()` call.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TickReport {
    /// Active state changed this tick.
    pub changed: bool,
    pub active_state: Option<StateId>,
    pub previous_state: Option<StateId>,
    pub progress: f32,
    #[serde(default)]
    pub events: Vec<RuntimeEvent>,
    #[serde(skip)]
    max_events: usize,
}

impl TickReport {
    pub(crate) fn with_capacity(max_events: usize) -> Self {
        Self {
            max_events,
            ..Self::default()
        }
    }

    #[inline]
    pub(crate) fn push_event(&mut self, event: RuntimeEvent) {
        if self.events.len() < self.max_events {
            self.events.push(event);
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.changed && self.events.is_empty()
    }
}

/// Read-only view for UIs: playback state plus current parameter values.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub active_state: Option<StateId>,
    pub previous_state: Option<StateId>,
    pub active_clip_progress: f32,
    pub phase: BlendPhase,
    pub transition: Option<ActiveTransition>,
    pub parameters: Vec<Parameter>,
}
