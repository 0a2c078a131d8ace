//! Edits submitted by the authoring UI and the cross-thread queue that carries them.
//!
//! Edits never touch the live graph directly. [`crate::runtime::AsmRuntime`]
//! validates each one on submission and publishes the accumulated result at the
//! next tick boundary, so a tick always sees one consistent graph.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::document::AsmDocument;
use crate::error::{AsmError, AsmResult};
use crate::graph::{State, StateGraph, StatePatch, Transition, TransitionPatch};
use crate::ids::{ParamId, StateId, TransitionId};
use crate::params::{Parameter, ParameterTable};
use crate::value::Value;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    InsertState {
        state: State,
    },
    RemoveState {
        state: StateId,
    },
    UpdateState {
        state: StateId,
        patch: StatePatch,
    },
    /// Replaces every transition already leaving `source`.
    Connect {
        source: StateId,
        target: StateId,
    },
    InsertTransition {
        transition: Transition,
    },
    DeleteTransition {
        transition: TransitionId,
    },
    UpdateTransition {
        transition: TransitionId,
        patch: TransitionPatch,
    },
    AddCondition {
        transition: TransitionId,
        condition: Condition,
    },
    RemoveCondition {
        transition: TransitionId,
        index: usize,
    },
    InsertParameter {
        parameter: Parameter,
    },
    RemoveParameter {
        param: ParamId,
    },
    RenameParameter {
        param: ParamId,
        name: String,
    },
    SetParameter {
        param: ParamId,
        value: Value,
    },
    /// Jump straight to a state, bypassing transition conditions.
    ActivateState {
        state: StateId,
    },
    /// Replace graph and parameters; playback restarts from Entry's target.
    LoadDocument {
        document: Box<AsmDocument>,
    },
}

impl EditCommand {
    /// Apply to `graph`/`params`. On error nothing is modified.
    ///
    /// `ActivateState` only checks that the state exists; switching playback is
    /// left to the runtime.
    pub fn apply(self, graph: &mut StateGraph, params: &mut ParameterTable) -> AsmResult<()> {
        match self {
            EditCommand::InsertState { state } => graph.insert_state(state),
            EditCommand::RemoveState { state } => graph.remove_state(&state).map(drop),
            EditCommand::UpdateState { state, patch } => graph.update_state(&state, patch),
            EditCommand::Connect { source, target } => graph.connect(&source, &target).map(drop),
            EditCommand::InsertTransition { transition } => {
                for c in &transition.conditions {
                    if params.parameter(&c.parameter_id).is_some() {
                        c.validate(params)?;
                    }
                }
                graph.insert_transition(transition)
            }
            EditCommand::DeleteTransition { transition } => {
                graph.delete_transition(&transition).map(drop)
            }
            EditCommand::UpdateTransition { transition, patch } => {
                graph.update_transition(&transition, patch)
            }
            EditCommand::AddCondition {
                transition,
                condition,
            } => graph.add_condition(&transition, condition, params),
            EditCommand::RemoveCondition { transition, index } => {
                graph.remove_condition(&transition, index).map(drop)
            }
            EditCommand::InsertParameter { parameter } => params.insert(parameter),
            EditCommand::RemoveParameter { param } => params
                .remove(&param)
                .map(drop)
                .ok_or(AsmError::UnknownParameter(param)),
            EditCommand::RenameParameter { param, name } => params.rename(&param, name),
            EditCommand::SetParameter { param, value } => params.set(&param, value),
            EditCommand::ActivateState { state } => match graph.state(&state) {
                Some(_) => Ok(()),
                None => Err(AsmError::UnknownState(state)),
            },
            EditCommand::LoadDocument { document } => {
                let (g, p) = document.into_parts()?;
                *graph = g;
                *params = p;
                Ok(())
            }
        }
    }

    /// Short name for log lines and rejection events.
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::InsertState { .. } => "insert_state",
            EditCommand::RemoveState { .. } => "remove_state",
            EditCommand::UpdateState { .. } => "update_state",
            EditCommand::Connect { .. } => "connect",
            EditCommand::InsertTransition { .. } => "insert_transition",
            EditCommand::DeleteTransition { .. } => "delete_transition",
            EditCommand::UpdateTransition { .. } => "update_transition",
            EditCommand::AddCondition { .. } => "add_condition",
            EditCommand::RemoveCondition { .. } => "remove_condition",
            EditCommand::InsertParameter { .. } => "insert_parameter",
            EditCommand::RemoveParameter { .. } => "remove_parameter",
            EditCommand::RenameParameter { .. } => "rename_parameter",
            EditCommand::SetParameter { .. } => "set_parameter",
            EditCommand::ActivateState { .. } => "activate_state",
            EditCommand::LoadDocument { .. } => "load_document",
        }
    }
}

/// Thread-safe mailbox for edits produced off the tick thread.
///
/// Clones share the same queue. The runtime drains it once per tick.
#[derive(Clone, Default, Debug)]
pub struct CommandQueue {
    inner: Arc<Mutex<Vec<EditCommand>>>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, cmd: EditCommand) {
        self.lock().push(cmd);
    }

    /// Queue a parameter write; the most common cross-thread edit.
    pub fn set_parameter(&self, param: impl Into<ParamId>, value: impl Into<Value>) {
        self.push(EditCommand::SetParameter {
            param: param.into(),
            value: value.into(),
        });
    }

    /// Take every queued command in submission order.
    pub fn drain(&self) -> Vec<EditCommand> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a Vec half-pushed.
    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EditCommand>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
