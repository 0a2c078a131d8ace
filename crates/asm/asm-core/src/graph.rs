//! State graph model: states (nodes) and transitions (edges).
//!
//! The graph is plain data. The evaluator only reads it; every mutation goes
//! through the validated editing methods below (or [`StateGraph::validate`]
//! after deserialization), so invalid speeds, durations and exit times never
//! reach the runtime.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::error::{AsmError, AsmResult};
use crate::ids::{IdAllocator, StateId, TransitionId, ANY_ID, ENTRY_ID, EXIT_ID};
use crate::params::ParameterTable;

/// Default crossfade length for new transitions and for activations without an edge.
pub const DEFAULT_TRANSITION_MS: f32 = 250.0;

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    State,
    Entry,
    Exit,
    Any,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: StateId,
    pub kind: StateKind,
    /// Display name; authoring only.
    #[serde(default)]
    pub label: String,
    /// Clip driven while this state is active. Empty for Entry/Exit/Any.
    #[serde(rename = "animationName", default)]
    pub clip_name: String,
    #[serde(rename = "loop", default)]
    pub looping: bool,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Advisory marker of the authoring default state; not evaluated at runtime.
    #[serde(default)]
    pub is_default: bool,
}

fn default_speed() -> f32 {
    1.0
}

impl State {
    /// A regular clip-driving state (looping, speed 1).
    pub fn clip(id: impl Into<StateId>, clip_name: impl Into<String>) -> Self {
        let clip_name = clip_name.into();
        Self {
            id: id.into(),
            kind: StateKind::State,
            label: clip_name.clone(),
            clip_name,
            looping: true,
            speed: 1.0,
            is_default: false,
        }
    }

    fn builtin(id: &str, kind: StateKind, label: &str) -> Self {
        Self {
            id: StateId::new(id),
            kind,
            label: label.to_string(),
            clip_name: String::new(),
            looping: false,
            speed: 1.0,
            is_default: false,
        }
    }

    /// Whether this state drives a clip when active.
    #[inline]
    pub fn has_clip(&self) -> bool {
        self.kind == StateKind::State && !self.clip_name.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub id: TransitionId,
    pub source: StateId,
    pub target: StateId,
    #[serde(default)]
    pub has_exit_time: bool,
    /// Normalized progress of the source clip after which the transition may fire.
    #[serde(default = "default_exit_time")]
    pub exit_time: f32,
    #[serde(rename = "transitionDuration", default = "default_duration")]
    pub duration_ms: f32,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_exit_time() -> f32 {
    1.0
}

fn default_duration() -> f32 {
    DEFAULT_TRANSITION_MS
}

impl Transition {
    /// Edge with the authoring defaults: no exit time, exit at 1.0, 250 ms, no conditions.
    pub fn new(
        id: impl Into<TransitionId>,
        source: impl Into<StateId>,
        target: impl Into<StateId>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            has_exit_time: false,
            exit_time: default_exit_time(),
            duration_ms: DEFAULT_TRANSITION_MS,
            conditions: Vec::new(),
        }
    }

    fn validate_values(&self) -> AsmResult<()> {
        check_duration(self.duration_ms)?;
        check_exit_time(self.exit_time)
    }
}

/// Partial update of a state's authoring fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(rename = "animationName", default)]
    pub clip_name: Option<String>,
    #[serde(rename = "loop", default)]
    pub looping: Option<bool>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub is_default: Option<bool>,
}

/// Partial update of a transition's timing fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPatch {
    #[serde(default)]
    pub has_exit_time: Option<bool>,
    #[serde(default)]
    pub exit_time: Option<f32>,
    #[serde(rename = "transitionDuration", default)]
    pub duration_ms: Option<f32>,
}

pub(crate) fn check_speed(speed: f32) -> AsmResult<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(AsmError::InvalidSpeed(speed))
    }
}

pub(crate) fn check_duration(duration_ms: f32) -> AsmResult<()> {
    if duration_ms.is_finite() && duration_ms >= 0.0 {
        Ok(())
    } else {
        Err(AsmError::InvalidDuration(duration_ms))
    }
}

pub(crate) fn check_exit_time(exit_time: f32) -> AsmResult<()> {
    if (0.0..=1.0).contains(&exit_time) {
        Ok(())
    } else {
        Err(AsmError::InvalidExitTime(exit_time))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateGraph {
    pub(crate) states: Vec<State>,
    pub(crate) transitions: Vec<Transition>,
    #[serde(skip)]
    ids: IdAllocator,
}

/// Graphs compare by content; allocator state is not part of the document.
impl PartialEq for StateGraph {
    fn eq(&self, other: &Self) -> bool {
        self.states == other.states && self.transitions == other.transitions
    }
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StateGraph {
    /// Graph holding only the built-in Entry, Any and Exit nodes.
    pub fn new() -> Self {
        Self {
            states: vec![
                State::builtin(ENTRY_ID, StateKind::Entry, "Entry"),
                State::builtin(ANY_ID, StateKind::Any, "Any State"),
                State::builtin(EXIT_ID, StateKind::Exit, "Exit"),
            ],
            transitions: Vec::new(),
            ids: IdAllocator::new(),
        }
    }

    /// Built-in nodes plus one looping state per clip. The first clip is marked
    /// default and wired from Entry.
    pub fn from_clip_names<S: AsRef<str>>(names: &[S]) -> Self {
        let mut graph = Self::new();
        let mut first: Option<StateId> = None;
        for name in names {
            let id = graph.add_state(name.as_ref());
            if first.is_none() {
                if let Some(s) = graph.state_mut(&id) {
                    s.is_default = true;
                }
                first = Some(id);
            }
        }
        if let Some(first) = first {
            let edge = Transition::new(format!("{ENTRY_ID}->{first}"), ENTRY_ID, first);
            graph.transitions.push(edge);
        }
        graph
    }

    /// Check structural invariants after deserialization.
    ///
    /// Dangling transition endpoints are allowed; the evaluator skips them.
    pub fn validate(&self) -> AsmResult<()> {
        let mut seen: Vec<&StateId> = Vec::with_capacity(self.states.len());
        let (mut entries, mut exits, mut anys) = (0usize, 0usize, 0usize);
        for s in &self.states {
            if seen.contains(&&s.id) {
                return Err(AsmError::InvalidGraph(format!("duplicate state id '{}'", s.id)));
            }
            seen.push(&s.id);
            check_speed(s.speed)?;
            match s.kind {
                StateKind::Entry => entries += 1,
                StateKind::Exit => exits += 1,
                StateKind::Any => anys += 1,
                StateKind::State => {}
            }
        }
        if entries != 1 {
            return Err(AsmError::InvalidGraph(format!(
                "expected exactly one entry node, found {entries}"
            )));
        }
        if exits != 1 {
            return Err(AsmError::InvalidGraph(format!(
                "expected exactly one exit node, found {exits}"
            )));
        }
        if anys > 1 {
            return Err(AsmError::InvalidGraph(format!(
                "expected at most one any-state node, found {anys}"
            )));
        }

        let mut seen_edges: Vec<&TransitionId> = Vec::with_capacity(self.transitions.len());
        for t in &self.transitions {
            if seen_edges.contains(&&t.id) {
                return Err(AsmError::InvalidGraph(format!(
                    "duplicate transition id '{}'",
                    t.id
                )));
            }
            seen_edges.push(&t.id);
            t.validate_values()?;
        }
        Ok(())
    }

    // ----- lookups -----

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.states.iter().find(|s| &s.id == id)
    }

    fn state_mut(&mut self, id: &StateId) -> Option<&mut State> {
        self.states.iter_mut().find(|s| &s.id == id)
    }

    fn first_of_kind(&self, kind: StateKind) -> Option<&State> {
        self.states.iter().find(|s| s.kind == kind)
    }

    pub fn entry(&self) -> Option<&State> {
        self.first_of_kind(StateKind::Entry)
    }

    pub fn exit(&self) -> Option<&State> {
        self.first_of_kind(StateKind::Exit)
    }

    pub fn any_state(&self) -> Option<&State> {
        self.first_of_kind(StateKind::Any)
    }

    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|t| &t.id == id)
    }

    fn transition_mut(&mut self, id: &TransitionId) -> AsmResult<&mut Transition> {
        self.transitions
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| AsmError::UnknownTransition(id.clone()))
    }

    /// Outgoing transitions of `id` in insertion order.
    pub fn outgoing<'a, 'b>(&'a self, id: &'b StateId) -> impl Iterator<Item = &'a Transition> + 'b
    where
        'a: 'b,
    {
        self.transitions.iter().filter(move |t| &t.source == id)
    }

    /// Outgoing transitions of the Any state (empty when the graph has none).
    pub fn any_outgoing(&self) -> impl Iterator<Item = &Transition> + '_ {
        let any = self.any_state().map(|s| &s.id);
        self.transitions
            .iter()
            .filter(move |t| Some(&t.source) == any)
    }

    /// First transition `from -> to`, if any.
    pub fn transition_between(&self, from: &StateId, to: &StateId) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| &t.source == from && &t.target == to)
    }

    /// Target of Entry's outgoing transition.
    pub fn entry_target(&self) -> Option<&StateId> {
        let entry = self.entry()?;
        self.outgoing(&entry.id).next().map(|t| &t.target)
    }

    // ----- editing -----

    /// Reserve a state id unused by this graph. Ids are never handed out twice.
    pub fn allocate_state_id(&mut self) -> StateId {
        let states = &self.states;
        self.ids
            .alloc_state(|s| states.iter().any(|st| st.id.as_str() == s))
    }

    /// Add a looping, speed-1 state driving `clip_name`, returning its fresh id.
    pub fn add_state(&mut self, clip_name: &str) -> StateId {
        let id = self.allocate_state_id();
        self.states.push(State::clip(id.clone(), clip_name));
        id
    }

    /// Insert a fully specified state. Built-in kinds keep their cardinality limits.
    pub fn insert_state(&mut self, state: State) -> AsmResult<()> {
        check_speed(state.speed)?;
        if self.state(&state.id).is_some() {
            return Err(AsmError::InvalidGraph(format!(
                "duplicate state id '{}'",
                state.id
            )));
        }
        if state.kind != StateKind::State && self.first_of_kind(state.kind).is_some() {
            return Err(AsmError::InvalidGraph(format!(
                "graph already has a {:?} node",
                state.kind
            )));
        }
        self.states.push(state);
        Ok(())
    }

    /// Remove a state and every transition touching it. Entry and Exit are protected.
    pub fn remove_state(&mut self, id: &StateId) -> AsmResult<State> {
        let idx = self
            .states
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| AsmError::UnknownState(id.clone()))?;
        if matches!(self.states[idx].kind, StateKind::Entry | StateKind::Exit) {
            return Err(AsmError::ProtectedState(id.clone()));
        }
        self.transitions
            .retain(|t| &t.source != id && &t.target != id);
        Ok(self.states.remove(idx))
    }

    pub fn update_state(&mut self, id: &StateId, patch: StatePatch) -> AsmResult<()> {
        if let Some(speed) = patch.speed {
            check_speed(speed)?;
        }
        let state = self
            .state_mut(id)
            .ok_or_else(|| AsmError::UnknownState(id.clone()))?;
        if let Some(label) = patch.label {
            state.label = label;
        }
        if let Some(clip) = patch.clip_name {
            state.clip_name = clip;
        }
        if let Some(looping) = patch.looping {
            state.looping = looping;
        }
        if let Some(speed) = patch.speed {
            state.speed = speed;
        }
        if let Some(is_default) = patch.is_default {
            state.is_default = is_default;
        }
        Ok(())
    }

    /// Connect `source -> target` with default edge data, replacing every prior
    /// transition leaving `source`.
    pub fn connect(&mut self, source: &StateId, target: &StateId) -> AsmResult<TransitionId> {
        let invalid = |reason: &str| AsmError::InvalidConnection {
            from: source.clone(),
            to: target.clone(),
            reason: reason.to_string(),
        };
        let src = self
            .state(source)
            .ok_or_else(|| AsmError::UnknownState(source.clone()))?;
        let dst = self
            .state(target)
            .ok_or_else(|| AsmError::UnknownState(target.clone()))?;
        if src.kind == StateKind::Exit {
            return Err(invalid("exit node has no outgoing transitions"));
        }
        if matches!(dst.kind, StateKind::Entry | StateKind::Any) {
            return Err(invalid("entry and any-state nodes cannot be targets"));
        }

        self.transitions.retain(|t| &t.source != source);

        let readable = TransitionId(format!("{source}->{target}"));
        let id = if self.transition(&readable).is_none() {
            readable
        } else {
            let transitions = &self.transitions;
            self.ids
                .alloc_transition(|s| transitions.iter().any(|t| t.id.as_str() == s))
        };
        self.transitions
            .push(Transition::new(id.clone(), source.clone(), target.clone()));
        Ok(id)
    }

    /// Insert a fully specified transition without replacing edges from its source.
    pub fn insert_transition(&mut self, transition: Transition) -> AsmResult<()> {
        transition.validate_values()?;
        if self.transition(&transition.id).is_some() {
            return Err(AsmError::InvalidGraph(format!(
                "duplicate transition id '{}'",
                transition.id
            )));
        }
        self.transitions.push(transition);
        Ok(())
    }

    pub fn delete_transition(&mut self, id: &TransitionId) -> AsmResult<Transition> {
        let idx = self
            .transitions
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| AsmError::UnknownTransition(id.clone()))?;
        Ok(self.transitions.remove(idx))
    }

    pub fn update_transition(
        &mut self,
        id: &TransitionId,
        patch: TransitionPatch,
    ) -> AsmResult<()> {
        if let Some(d) = patch.duration_ms {
            check_duration(d)?;
        }
        if let Some(e) = patch.exit_time {
            check_exit_time(e)?;
        }
        let t = self.transition_mut(id)?;
        if let Some(h) = patch.has_exit_time {
            t.has_exit_time = h;
        }
        if let Some(e) = patch.exit_time {
            t.exit_time = e;
        }
        if let Some(d) = patch.duration_ms {
            t.duration_ms = d;
        }
        Ok(())
    }

    /// Append a condition after checking it against the parameter table.
    pub fn add_condition(
        &mut self,
        id: &TransitionId,
        condition: Condition,
        params: &ParameterTable,
    ) -> AsmResult<()> {
        condition.validate(params)?;
        self.transition_mut(id)?.conditions.push(condition);
        Ok(())
    }

    pub fn remove_condition(&mut self, id: &TransitionId, index: usize) -> AsmResult<Condition> {
        let t = self.transition_mut(id)?;
        if index >= t.conditions.len() {
            return Err(AsmError::ConditionIndexOutOfRange {
                transition: id.clone(),
                index,
            });
        }
        Ok(t.conditions.remove(index))
    }
}
