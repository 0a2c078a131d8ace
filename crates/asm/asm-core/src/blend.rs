//! Crossfade controller: owns the runtime playback state.
//!
//! `Idle -> Blending -> Idle`. At most one blend is in flight; a new
//! activation supersedes it immediately and the superseded blend's source
//! clip is stopped, so exactly one blend ever writes clip weights.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::backend::ClipBackend;
use crate::graph::StateGraph;
use crate::ids::StateId;

/// Ease-in-out quadratic on `[0, 1]`.
#[inline]
pub fn ease_in_out(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTransition {
    /// Clip fading out; `None` when nothing was driving before.
    pub from_clip: Option<String>,
    pub to_clip: String,
    pub started_at_ms: f64,
    pub duration_ms: f32,
}

impl ActiveTransition {
    /// Linear blend parameter at `now_ms`, clamped to `[0, 1]`.
    pub fn linear_t(&self, now_ms: f64) -> f32 {
        if self.duration_ms <= 0.0 {
            return 1.0;
        }
        let elapsed = (now_ms - self.started_at_ms).max(0.0);
        ((elapsed / self.duration_ms as f64) as f32).clamp(0.0, 1.0)
    }
}

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlendPhase {
    Idle,
    Blending,
}

/// Runtime playback state; written only by [`BlendController`].
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub active_state: Option<StateId>,
    pub previous_state: Option<StateId>,
    pub active_clip_progress: f32,
    pub transition: Option<ActiveTransition>,
}

/// Result of an activation request.
#[derive(Clone, Debug, PartialEq)]
pub enum Activation {
    /// Requested state is already active.
    Unchanged,
    /// Active id committed and a crossfade started.
    Blending {
        from_clip: Option<String>,
        to_clip: String,
        duration_ms: f32,
        /// Source clip of a superseded in-flight blend, stopped immediately.
        superseded: Option<String>,
    },
    /// Active id committed, but the state has no playable clip; the current
    /// driving clip keeps playing.
    NoClip,
}

/// Result of sampling the in-flight blend.
#[derive(Clone, Debug, PartialEq)]
pub enum BlendSample {
    Idle,
    InProgress { weight: f32 },
    Completed {
        to_clip: String,
        stopped: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct BlendController {
    state: PlaybackState,
    /// Clip currently rising to (or holding) full weight.
    driving_clip: Option<String>,
    default_duration_ms: f32,
}

impl BlendController {
    pub fn new(default_duration_ms: f32) -> Self {
        Self {
            state: PlaybackState::default(),
            driving_clip: None,
            default_duration_ms,
        }
    }

    #[inline]
    pub fn playback(&self) -> &PlaybackState {
        &self.state
    }

    #[inline]
    pub fn active_state(&self) -> Option<&StateId> {
        self.state.active_state.as_ref()
    }

    #[inline]
    pub fn previous_state(&self) -> Option<&StateId> {
        self.state.previous_state.as_ref()
    }

    #[inline]
    pub fn transition(&self) -> Option<&ActiveTransition> {
        self.state.transition.as_ref()
    }

    #[inline]
    pub fn driving_clip(&self) -> Option<&str> {
        self.driving_clip.as_deref()
    }

    pub fn phase(&self) -> BlendPhase {
        if self.state.transition.is_some() {
            BlendPhase::Blending
        } else {
            BlendPhase::Idle
        }
    }

    /// Make `next` the active state and start a crossfade into its clip.
    ///
    /// The duration comes from the `previous -> next` edge when one exists,
    /// otherwise the controller default.
    pub fn set_active_state(
        &mut self,
        next: &StateId,
        graph: &StateGraph,
        now_ms: f64,
        backend: &mut dyn ClipBackend,
    ) -> Activation {
        if self.state.active_state.as_ref() == Some(next) {
            return Activation::Unchanged;
        }

        let previous = self.state.active_state.replace(next.clone());
        let duration_ms = previous
            .as_ref()
            .and_then(|p| graph.transition_between(p, next))
            .map_or(self.default_duration_ms, |t| t.duration_ms);
        self.state.previous_state = previous;
        self.state.active_clip_progress = 0.0;

        let Some(target) = graph.state(next).filter(|s| s.has_clip()) else {
            debug!("state '{next}' has no clip; keeping current clip");
            return Activation::NoClip;
        };
        if !backend.has_clip(&target.clip_name) {
            warn!(
                "clip '{}' for state '{next}' is not available in the backend",
                target.clip_name
            );
            return Activation::NoClip;
        }
        let to_clip = target.clip_name.clone();

        let mut superseded = None;
        if let Some(inflight) = self.state.transition.take() {
            if let Some(orphan) = inflight.from_clip.filter(|c| *c != to_clip) {
                backend.stop(&orphan);
                backend.set_weight(&orphan, 0.0);
                debug!("superseded blend; stopped '{orphan}'");
                superseded = Some(orphan);
            }
        }

        let from_clip = self.driving_clip.take().filter(|c| *c != to_clip);
        backend.play(&to_clip, target.looping, target.speed);
        backend.set_weight(&to_clip, 0.0);
        self.driving_clip = Some(to_clip.clone());

        debug!(
            "blend {:?} -> '{}' over {} ms",
            from_clip, to_clip, duration_ms
        );
        self.state.transition = Some(ActiveTransition {
            from_clip: from_clip.clone(),
            to_clip: to_clip.clone(),
            started_at_ms: now_ms,
            duration_ms,
        });
        Activation::Blending {
            from_clip,
            to_clip,
            duration_ms,
            superseded,
        }
    }

    /// Apply the eased weights for `now_ms`; completes the blend at weight 1.
    pub fn sample(&mut self, now_ms: f64, backend: &mut dyn ClipBackend) -> BlendSample {
        let Some(tr) = self.state.transition.as_ref() else {
            return BlendSample::Idle;
        };
        let t = tr.linear_t(now_ms);
        let ease = if t >= 1.0 { 1.0 } else { ease_in_out(t) };

        backend.set_weight(&tr.to_clip, ease);
        if let Some(from) = &tr.from_clip {
            backend.set_weight(from, 1.0 - ease);
        }
        trace!("blend '{}' weight {ease:.3}", tr.to_clip);

        if ease < 1.0 {
            return BlendSample::InProgress { weight: ease };
        }

        let done = self.state.transition.take();
        let (to_clip, stopped) = match done {
            Some(ActiveTransition {
                to_clip, from_clip, ..
            }) => (to_clip, from_clip),
            None => return BlendSample::Idle,
        };
        if let Some(from) = &stopped {
            backend.stop(from);
            backend.set_weight(from, 0.0);
        }
        debug!("blend into '{to_clip}' complete");
        BlendSample::Completed { to_clip, stopped }
    }

    /// Read the active state's clip cursor for exit-time gating.
    ///
    /// States without a playable clip report `(0.0, false)`.
    pub fn read_progress(&mut self, graph: &StateGraph, backend: &dyn ClipBackend) -> (f32, bool) {
        let clip = self
            .state
            .active_state
            .as_ref()
            .and_then(|id| graph.state(id))
            .filter(|s| s.has_clip() && backend.has_clip(&s.clip_name))
            .map(|s| s.clip_name.as_str());
        let (progress, playing) = match clip {
            Some(c) => (backend.progress(c), backend.is_playing(c)),
            None => (0.0, false),
        };
        self.state.active_clip_progress = progress;
        (progress, playing)
    }

    /// Push the active state's loop/speed to its clip, restarting a looping
    /// clip that had already stopped.
    pub fn apply_state_settings(&self, graph: &StateGraph, backend: &mut dyn ClipBackend) {
        let Some(state) = self.state.active_state.as_ref().and_then(|id| graph.state(id)) else {
            return;
        };
        if !state.has_clip() || self.driving_clip.as_deref() != Some(state.clip_name.as_str()) {
            return;
        }
        backend.set_speed(&state.clip_name, state.speed);
        backend.set_loop(&state.clip_name, state.looping);
        if state.looping && !backend.is_playing(&state.clip_name) {
            backend.play(&state.clip_name, true, state.speed);
        }
    }

    /// Stop every clip this controller started and return to a blank state.
    pub fn reset(&mut self, backend: &mut dyn ClipBackend) {
        if let Some(tr) = self.state.transition.take() {
            if let Some(from) = tr.from_clip {
                backend.stop(&from);
                backend.set_weight(&from, 0.0);
            }
        }
        if let Some(clip) = self.driving_clip.take() {
            backend.stop(&clip);
            backend.set_weight(&clip, 0.0);
        }
        self.state = PlaybackState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedClips;
    use crate::graph::TransitionPatch;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() <= 1e-5, "left={a} right={b}");
    }

    fn setup() -> (StateGraph, SimulatedClips, StateId, StateId) {
        let graph = StateGraph::from_clip_names(&["Idle", "Walk"]);
        let idle = graph.entry_target().cloned().unwrap();
        let walk = graph
            .states()
            .iter()
            .find(|s| s.clip_name == "Walk")
            .map(|s| s.id.clone())
            .unwrap();
        let clips = SimulatedClips::new()
            .with_clip("Idle", 1000.0)
            .with_clip("Walk", 800.0);
        (graph, clips, idle, walk)
    }

    #[test]
    fn ease_curve_endpoints_and_midpoint() {
        approx(ease_in_out(0.0), 0.0);
        approx(ease_in_out(0.25), 0.125);
        approx(ease_in_out(0.5), 0.5);
        approx(ease_in_out(0.75), 0.875);
        assert_eq!(ease_in_out(1.0), 1.0);
        assert_eq!(ease_in_out(2.0), 1.0);
    }

    #[test]
    fn same_state_is_a_no_op() {
        let (graph, mut clips, idle, _) = setup();
        let mut bc = BlendController::new(250.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        assert_eq!(bc.set_active_state(&idle, &graph, 5.0, &mut clips), Activation::Unchanged);
    }

    #[test]
    fn blend_completes_to_exact_weights_and_stops_previous() {
        let (mut graph, mut clips, idle, walk) = setup();
        let t = graph.connect(&idle, &walk).unwrap();
        graph
            .update_transition(
                &t,
                TransitionPatch {
                    duration_ms: Some(250.0),
                    ..Default::default()
                },
            )
            .unwrap();
        let mut bc = BlendController::new(100.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        assert!(matches!(bc.sample(1000.0, &mut clips), BlendSample::Completed { .. }));

        let act = bc.set_active_state(&walk, &graph, 1000.0, &mut clips);
        assert_eq!(
            act,
            Activation::Blending {
                from_clip: Some("Idle".into()),
                to_clip: "Walk".into(),
                duration_ms: 250.0,
                superseded: None,
            }
        );
        assert_eq!(bc.phase(), BlendPhase::Blending);

        match bc.sample(1125.0, &mut clips) {
            BlendSample::InProgress { weight } => approx(weight, 0.5),
            other => panic!("unexpected {other:?}"),
        }
        approx(clips.weight("Walk").unwrap(), 0.5);
        approx(clips.weight("Idle").unwrap(), 0.5);

        let done = bc.sample(1250.0, &mut clips);
        assert_eq!(
            done,
            BlendSample::Completed {
                to_clip: "Walk".into(),
                stopped: Some("Idle".into()),
            }
        );
        assert_eq!(clips.weight("Walk"), Some(1.0));
        assert_eq!(clips.weight("Idle"), Some(0.0));
        assert!(!clips.is_playing("Idle"));
        assert!(clips.is_playing("Walk"));
        assert_eq!(bc.phase(), BlendPhase::Idle);
        assert_eq!(bc.previous_state(), Some(&idle));
    }

    #[test]
    fn missing_edge_uses_default_duration() {
        let (graph, mut clips, idle, walk) = setup();
        let mut bc = BlendController::new(250.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        bc.sample(300.0, &mut clips);
        match bc.set_active_state(&walk, &graph, 300.0, &mut clips) {
            Activation::Blending { duration_ms, .. } => assert_eq!(duration_ms, 250.0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn zero_duration_is_an_immediate_cut() {
        let (mut graph, mut clips, idle, walk) = setup();
        let t = graph.connect(&idle, &walk).unwrap();
        graph
            .update_transition(
                &t,
                TransitionPatch {
                    duration_ms: Some(0.0),
                    ..Default::default()
                },
            )
            .unwrap();
        let mut bc = BlendController::new(250.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        bc.sample(250.0, &mut clips);
        bc.set_active_state(&walk, &graph, 250.0, &mut clips);
        assert!(matches!(bc.sample(250.0, &mut clips), BlendSample::Completed { .. }));
        assert_eq!(clips.weight("Walk"), Some(1.0));
    }

    #[test]
    fn superseding_stops_the_orphaned_source() {
        let mut graph = StateGraph::from_clip_names(&["A", "B", "C"]);
        let id = |g: &StateGraph, clip: &str| {
            g.states()
                .iter()
                .find(|s| s.clip_name == clip)
                .map(|s| s.id.clone())
                .unwrap()
        };
        let (a, b, c) = (id(&graph, "A"), id(&graph, "B"), id(&graph, "C"));
        graph.connect(&a, &b).unwrap();
        let mut clips = SimulatedClips::new()
            .with_clip("A", 1000.0)
            .with_clip("B", 1000.0)
            .with_clip("C", 1000.0);
        let mut bc = BlendController::new(250.0);

        bc.set_active_state(&a, &graph, 0.0, &mut clips);
        bc.sample(500.0, &mut clips);
        bc.set_active_state(&b, &graph, 500.0, &mut clips);
        bc.sample(600.0, &mut clips);

        let act = bc.set_active_state(&c, &graph, 600.0, &mut clips);
        assert_eq!(
            act,
            Activation::Blending {
                from_clip: Some("B".into()),
                to_clip: "C".into(),
                duration_ms: 250.0,
                superseded: Some("A".into()),
            }
        );
        assert!(!clips.is_playing("A"));
        assert_eq!(clips.weight("A"), Some(0.0));

        bc.sample(900.0, &mut clips);
        assert_eq!(clips.weight("C"), Some(1.0));
        assert_eq!(clips.weight("B"), Some(0.0));
        assert_eq!(clips.playing(), vec!["C"]);
    }

    #[test]
    fn clipless_state_keeps_current_clip_driving() {
        let (graph, mut clips, idle, _) = setup();
        let mut bc = BlendController::new(250.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        bc.sample(250.0, &mut clips);
        let exit = StateId::new(crate::ids::EXIT_ID);
        assert_eq!(bc.set_active_state(&exit, &graph, 300.0, &mut clips), Activation::NoClip);
        assert_eq!(bc.driving_clip(), Some("Idle"));
        assert_eq!(bc.read_progress(&graph, &clips), (0.0, false));
    }

    #[test]
    fn progress_tracks_the_target_clip_not_the_weight() {
        let (graph, mut clips, idle, walk) = setup();
        let mut bc = BlendController::new(250.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        bc.set_active_state(&walk, &graph, 0.0, &mut clips);
        clips.advance(400.0);
        bc.sample(100.0, &mut clips);
        let (progress, playing) = bc.read_progress(&graph, &clips);
        approx(progress, 0.5);
        assert!(playing);
        assert_eq!(bc.playback().active_clip_progress, progress);
    }

    #[test]
    fn reset_stops_everything() {
        let (graph, mut clips, idle, walk) = setup();
        let mut bc = BlendController::new(250.0);
        bc.set_active_state(&idle, &graph, 0.0, &mut clips);
        bc.sample(250.0, &mut clips);
        bc.set_active_state(&walk, &graph, 250.0, &mut clips);
        bc.reset(&mut clips);
        assert!(clips.playing().is_empty());
        assert_eq!(bc.playback(), &PlaybackState::default());
        assert_eq!(bc.driving_clip(), None);
    }
}
