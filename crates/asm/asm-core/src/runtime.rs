//! Runtime: owns the graph, parameters and playback, and advances them one tick at a time.
//!
//! Order of work inside [`AsmRuntime::advance`]:
//! 1. drain the shared [`CommandQueue`] into the staged edit buffer
//! 2. publish staged edits (graph + parameters swap in atomically) or,
//!    when only values were written, apply the pending parameter writes
//! 3. apply pending playback control (document reset, manual activation)
//! 4. sample the in-flight blend
//! 5. read the active clip's progress and evaluate transitions
//! 6. on a match, start the crossfade and consume triggers

use log::{debug, warn};

use crate::backend::ClipBackend;
use crate::blend::{Activation, BlendController, BlendSample, PlaybackState};
use crate::clock::{Clock, SystemClock};
use crate::config::RuntimeConfig;
use crate::document::AsmDocument;
use crate::error::AsmResult;
use crate::eval::select_transition;
use crate::graph::{State, StateGraph};
use crate::ids::{ParamId, StateId};
use crate::inputs::{CommandQueue, EditCommand};
use crate::outputs::{RuntimeEvent, RuntimeSnapshot, TickReport};
use crate::params::{ParamKind, Parameter, ParameterTable};
use crate::value::Value;

/// Edited copy of graph and parameters waiting for the next tick boundary.
#[derive(Debug, Clone)]
struct Staged {
    graph: StateGraph,
    params: ParameterTable,
}

/// Playback requests deferred to the next tick boundary.
#[derive(Debug, Default)]
struct Control {
    reset: bool,
    activate: Option<StateId>,
}

#[derive(Debug)]
pub struct AsmRuntime<C: Clock = SystemClock> {
    graph: StateGraph,
    params: ParameterTable,
    staged: Option<Staged>,
    /// Validated value writes, kept apart so they never clone the graph.
    param_writes: Vec<(ParamId, Value)>,
    control: Control,
    blend: BlendController,
    config: RuntimeConfig,
    clock: C,
    queue: CommandQueue,
}

impl AsmRuntime {
    /// Empty runtime timed by the system clock.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_clock(config, SystemClock::new())
    }
}

impl<C: Clock> AsmRuntime<C> {
    pub fn with_clock(config: RuntimeConfig, clock: C) -> Self {
        Self {
            graph: StateGraph::new(),
            params: ParameterTable::new(),
            staged: None,
            param_writes: Vec::new(),
            control: Control::default(),
            blend: BlendController::new(config.default_blend_ms),
            config,
            clock,
            queue: CommandQueue::new(),
        }
    }

    /// Runtime over a validated document. Entry's target becomes active on the first tick.
    pub fn from_document(
        document: AsmDocument,
        config: RuntimeConfig,
        clock: C,
    ) -> AsmResult<Self> {
        let (graph, params) = document.into_parts()?;
        let mut rt = Self::with_clock(config, clock);
        rt.graph = graph;
        rt.params = params;
        rt.control.reset = true;
        Ok(rt)
    }

    /// Build a graph from the host's clips and start the first clip right away.
    ///
    /// Parameters are kept; pending edits and playback are discarded.
    pub fn load_clips(&mut self, backend: &mut dyn ClipBackend) -> Option<StateId> {
        let names = backend.clip_names();
        self.blend.reset(backend);
        self.graph = StateGraph::from_clip_names(names.as_slice());
        self.staged = None;
        self.param_writes.clear();
        self.control = Control::default();

        let first = self.graph.entry_target().cloned()?;
        let now = self.clock.now_ms();
        let mut discard = TickReport::default();
        self.activate(&first, now, backend, &mut discard);
        debug!("loaded {} clips; '{first}' active", names.len());
        Some(first)
    }

    // ----- edits -----

    /// Validate an edit against the staged graph and keep it for the next tick.
    ///
    /// A rejected edit leaves the staged state unchanged. Value writes made
    /// while no structural edit is pending are checked against the live table.
    pub fn submit(&mut self, cmd: EditCommand) -> AsmResult<()> {
        if let EditCommand::SetParameter { param, value } = &cmd {
            if self.staged.is_none() {
                self.params.check(param, value)?;
                self.param_writes.push((param.clone(), *value));
                return Ok(());
            }
        }

        let activate = match &cmd {
            EditCommand::ActivateState { state } => Some(state.clone()),
            _ => None,
        };
        let reset = matches!(cmd, EditCommand::LoadDocument { .. });

        let staged = self.staged_mut();
        cmd.apply(&mut staged.graph, &mut staged.params)?;

        if reset {
            self.control = Control {
                reset: true,
                activate: None,
            };
        }
        if activate.is_some() {
            self.control.activate = activate;
        }
        Ok(())
    }

    /// Add a looping, speed-1 state for `clip_name`; the id is usable in later edits immediately.
    pub fn add_state(&mut self, clip_name: &str) -> AsmResult<StateId> {
        let id = self.staged_mut().graph.allocate_state_id();
        self.submit(EditCommand::InsertState {
            state: State::clip(id.clone(), clip_name),
        })?;
        Ok(id)
    }

    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        kind: ParamKind,
        value: Option<Value>,
    ) -> AsmResult<ParamId> {
        let id = self.staged_mut().params.allocate_id();
        self.submit(EditCommand::InsertParameter {
            parameter: Parameter {
                id: id.clone(),
                name: name.into(),
                kind,
                value: value.unwrap_or_else(|| kind.default_value()),
            },
        })?;
        Ok(id)
    }

    pub fn set_parameter(&mut self, param: &ParamId, value: impl Into<Value>) -> AsmResult<()> {
        self.submit(EditCommand::SetParameter {
            param: param.clone(),
            value: value.into(),
        })
    }

    /// Jump to `state` at the next tick, bypassing conditions.
    pub fn activate_state(&mut self, state: &StateId) -> AsmResult<()> {
        self.submit(EditCommand::ActivateState {
            state: state.clone(),
        })
    }

    pub fn load_document(&mut self, document: AsmDocument) -> AsmResult<()> {
        self.submit(EditCommand::LoadDocument {
            document: Box::new(document),
        })
    }

    /// Handle for producers on other threads.
    pub fn command_queue(&self) -> CommandQueue {
        self.queue.clone()
    }

    pub fn has_pending_edits(&self) -> bool {
        self.staged.is_some() || !self.param_writes.is_empty() || !self.queue.is_empty()
    }

    /// Staged copy for structural edits. Earlier value writes move into it first.
    fn staged_mut(&mut self) -> &mut Staged {
        let writes = std::mem::take(&mut self.param_writes);
        let (graph, params) = (&self.graph, &self.params);
        let staged = self.staged.get_or_insert_with(|| Staged {
            graph: graph.clone(),
            params: params.clone(),
        });
        apply_param_writes(&mut staged.params, writes);
        staged
    }

    // ----- tick -----

    /// Run one tick against `backend`, timed by the runtime clock.
    pub fn advance(&mut self, backend: &mut dyn ClipBackend) -> TickReport {
        let now = self.clock.now_ms();
        let mut report = TickReport::with_capacity(self.config.max_events_per_tick);
        let started_in = self.blend.active_state().cloned();

        for cmd in self.queue.drain() {
            let name = cmd.name();
            if let Err(e) = self.submit(cmd) {
                warn!("rejected queued {name}: {e}");
                report.push_event(RuntimeEvent::EditRejected {
                    message: format!("{name}: {e}"),
                });
            }
        }
        self.publish_edits(backend);
        self.apply_control(now, backend, &mut report);

        if let BlendSample::Completed { to_clip, stopped } = self.blend.sample(now, backend) {
            report.push_event(RuntimeEvent::BlendCompleted {
                to_clip,
                stopped_clip: stopped,
            });
        }

        let (progress, playing) = self.blend.read_progress(&self.graph, backend);
        let firing = select_transition(
            &self.graph,
            &self.params,
            self.blend.active_state(),
            progress,
            playing,
            self.config.finished_progress,
        );
        if let Some(firing) = firing {
            let from = self
                .blend
                .active_state()
                .cloned()
                .unwrap_or_else(|| firing.source.clone());
            debug!(
                "transition '{}' fired: '{from}' -> '{}'{}",
                firing.transition,
                firing.target,
                if firing.redirected { " (via entry)" } else { "" }
            );
            report.push_event(RuntimeEvent::TransitionFired {
                transition: firing.transition,
                from,
                to: firing.target.clone(),
                via_any: firing.via_any,
                redirected: firing.redirected,
            });
            self.activate(&firing.target, now, backend, &mut report);

            let consumed = self.params.reset_consumed_triggers();
            if !consumed.is_empty() {
                report.push_event(RuntimeEvent::TriggersReset { params: consumed });
            }
        }

        let playback = self.blend.playback();
        report.active_state = playback.active_state.clone();
        report.previous_state = playback.previous_state.clone();
        report.progress = playback.active_clip_progress;
        report.changed = report.active_state != started_in;
        report
    }

    fn publish_edits(&mut self, backend: &mut dyn ClipBackend) {
        let Some(staged) = self.staged.take() else {
            let writes = std::mem::take(&mut self.param_writes);
            apply_param_writes(&mut self.params, writes);
            return;
        };
        let settings = |g: &StateGraph, id: Option<&StateId>| {
            id.and_then(|id| g.state(id)).map(|s| (s.looping, s.speed))
        };
        let active = self.blend.active_state().cloned();
        let before = settings(&self.graph, active.as_ref());

        self.graph = staged.graph;
        self.params = staged.params;

        let after = settings(&self.graph, active.as_ref());
        if after.is_some() && after != before {
            debug!("active state settings changed: {before:?} -> {after:?}");
            self.blend.apply_state_settings(&self.graph, backend);
        }
    }

    fn apply_control(&mut self, now: f64, backend: &mut dyn ClipBackend, report: &mut TickReport) {
        let control = std::mem::take(&mut self.control);
        if control.reset {
            self.blend.reset(backend);
        }
        let target = control.activate.or_else(|| {
            control
                .reset
                .then(|| self.graph.entry_target().cloned())
                .flatten()
        });
        let Some(target) = target else {
            return;
        };
        // A later edit in the same tick may have removed the requested state.
        if self.graph.state(&target).is_none() {
            warn!("activation of '{target}' dropped: state no longer exists");
            report.push_event(RuntimeEvent::EditRejected {
                message: format!("activate: unknown state '{target}'"),
            });
            return;
        }
        self.activate(&target, now, backend, report);
    }

    fn activate(
        &mut self,
        next: &StateId,
        now: f64,
        backend: &mut dyn ClipBackend,
        report: &mut TickReport,
    ) {
        let previous = self.blend.active_state().cloned();
        match self.blend.set_active_state(next, &self.graph, now, backend) {
            Activation::Unchanged => {}
            Activation::Blending {
                from_clip,
                to_clip,
                duration_ms,
                superseded,
            } => {
                if let Some(stopped_clip) = superseded {
                    report.push_event(RuntimeEvent::BlendSuperseded { stopped_clip });
                }
                report.push_event(RuntimeEvent::StateActivated {
                    state: next.clone(),
                    previous,
                });
                report.push_event(RuntimeEvent::BlendStarted {
                    from_clip,
                    to_clip,
                    duration_ms,
                });
            }
            Activation::NoClip => {
                report.push_event(RuntimeEvent::StateActivated {
                    state: next.clone(),
                    previous,
                });
            }
        }
    }

    // ----- read access -----

    /// Graph the evaluator currently runs on.
    pub fn graph(&self) -> &StateGraph {
        &self.graph
    }

    pub fn parameters(&self) -> &ParameterTable {
        &self.params
    }

    /// Graph including edits not yet published.
    pub fn editing_graph(&self) -> &StateGraph {
        self.staged.as_ref().map_or(&self.graph, |s| &s.graph)
    }

    /// Parameter definitions including unpublished structural edits.
    pub fn editing_parameters(&self) -> &ParameterTable {
        self.staged.as_ref().map_or(&self.params, |s| &s.params)
    }

    /// Value `param` will hold once pending edits are published.
    pub fn editing_value(&self, param: &ParamId) -> Option<Value> {
        self.param_writes
            .iter()
            .rev()
            .find(|(id, _)| id == param)
            .map(|(_, v)| *v)
            .or_else(|| self.editing_parameters().get(param))
    }

    pub fn active_state(&self) -> Option<&StateId> {
        self.blend.active_state()
    }

    pub fn previous_state(&self) -> Option<&StateId> {
        self.blend.previous_state()
    }

    pub fn playback(&self) -> &PlaybackState {
        self.blend.playback()
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        let playback = self.blend.playback();
        RuntimeSnapshot {
            active_state: playback.active_state.clone(),
            previous_state: playback.previous_state.clone(),
            active_clip_progress: playback.active_clip_progress,
            phase: self.blend.phase(),
            transition: playback.transition.clone(),
            parameters: self.params.to_vec(),
        }
    }

    /// Published graph and parameter values as a document.
    pub fn document(&self) -> AsmDocument {
        AsmDocument::capture(&self.graph, &self.params)
    }
}

fn apply_param_writes(params: &mut ParameterTable, writes: Vec<(ParamId, Value)>) {
    for (id, value) in writes {
        if let Err(e) = params.set(&id, value) {
            warn!("dropped write to '{id}': {e}");
        }
    }
}
