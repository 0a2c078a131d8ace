//! Transition evaluator.
//!
//! Candidates are the active state's outgoing transitions followed by the Any
//! state's, each group in insertion order; the first eligible candidate wins.
//! Nothing in here returns an error: missing states, parameters or targets
//! simply make a candidate ineligible.

use serde::{Deserialize, Serialize};

use crate::condition::check_all;
use crate::graph::{StateGraph, StateKind, Transition};
use crate::ids::{StateId, TransitionId};
use crate::params::ParameterTable;

/// Progress at which a clip that stopped playing counts as finished.
pub const FINISHED_PROGRESS: f32 = 0.99;

/// The transition chosen for this tick.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Firing {
    pub transition: TransitionId,
    /// Source of the edge (the active state, or the Any node).
    pub source: StateId,
    /// Effective target after Exit redirection.
    pub target: StateId,
    /// The edge came from the Any state.
    pub via_any: bool,
    /// The edge pointed at Exit and was redirected through Entry.
    pub redirected: bool,
}

/// Exit-time gate: progress reached `exit_time`, or the clip stopped at its end.
#[inline]
pub fn exit_time_passed(
    t: &Transition,
    progress: f32,
    playing: bool,
    finished_progress: f32,
) -> bool {
    progress >= t.exit_time || (!playing && progress >= finished_progress)
}

/// Structural and predicate eligibility of one candidate.
///
/// Edges without conditions and without exit time are never auto-taken; they
/// are only reachable through manual activation.
pub fn is_eligible(
    t: &Transition,
    params: &ParameterTable,
    progress: f32,
    playing: bool,
    finished_progress: f32,
) -> bool {
    if t.conditions.is_empty() && !t.has_exit_time {
        return false;
    }
    if t.has_exit_time && !exit_time_passed(t, progress, playing, finished_progress) {
        return false;
    }
    check_all(&t.conditions, params)
}

/// Resolve the state a transition actually lands on. Exit hands control back
/// to whatever Entry points at; without an Entry edge the literal Exit id is kept.
fn resolve_target(graph: &StateGraph, target: &StateId) -> (StateId, bool) {
    let is_exit = graph
        .state(target)
        .map_or(false, |s| s.kind == StateKind::Exit);
    if !is_exit {
        return (target.clone(), false);
    }
    match graph.entry_target() {
        Some(next) if graph.state(next).is_some() => (next.clone(), true),
        _ => (target.clone(), false),
    }
}

/// Pure decision: pick the first eligible transition for `active`, if any.
pub fn select_transition(
    graph: &StateGraph,
    params: &ParameterTable,
    active: Option<&StateId>,
    progress: f32,
    playing: bool,
    finished_progress: f32,
) -> Option<Firing> {
    let active = active?;
    graph.state(active)?;

    let own = graph.outgoing(active).map(|t| (t, false));
    let any = graph.any_outgoing().map(|t| (t, true));

    for (t, via_any) in own.chain(any) {
        if graph.state(&t.target).is_none() {
            continue;
        }
        // Landing on the active state (directly or through Exit -> Entry) is not a firing.
        let (target, redirected) = resolve_target(graph, &t.target);
        if &target == active {
            continue;
        }
        if !is_eligible(t, params, progress, playing, finished_progress) {
            continue;
        }
        return Some(Firing {
            transition: t.id.clone(),
            source: t.source.clone(),
            target,
            via_any,
            redirected,
        });
    }
    None
}

/// Decide the next state and consume triggers when a transition fires.
///
/// Conditions are checked against the pre-reset parameter values; the reset
/// happens once, after the decision.
pub fn evaluate(
    graph: &StateGraph,
    params: &mut ParameterTable,
    active: Option<&StateId>,
    progress: f32,
    playing: bool,
) -> Option<StateId> {
    let firing = select_transition(graph, params, active, progress, playing, FINISHED_PROGRESS)?;
    params.reset_consumed_triggers();
    Some(firing.target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{CompareOp, Condition};
    use crate::graph::TransitionPatch;
    use crate::ids::{ANY_ID, ENTRY_ID, EXIT_ID};
    use crate::params::ParamKind;
    use crate::value::Value;

    struct Fixture {
        graph: StateGraph,
        params: ParameterTable,
        idle: StateId,
        walk: StateId,
        run: StateId,
    }

    fn fixture() -> Fixture {
        let graph = StateGraph::from_clip_names(&["Idle", "Walk", "Run"]);
        let find = |clip: &str| {
            graph
                .states()
                .iter()
                .find(|s| s.clip_name == clip)
                .map(|s| s.id.clone())
                .unwrap()
        };
        let (idle, walk, run) = (find("Idle"), find("Walk"), find("Run"));
        Fixture {
            graph,
            params: ParameterTable::new(),
            idle,
            walk,
            run,
        }
    }

    fn exit_timed(g: &mut StateGraph, t: &TransitionId, exit_time: f32) {
        g.update_transition(
            t,
            TransitionPatch {
                has_exit_time: Some(true),
                exit_time: Some(exit_time),
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[test]
    fn no_active_state_yields_none() {
        let mut f = fixture();
        assert_eq!(evaluate(&f.graph, &mut f.params, None, 1.0, false), None);
        let ghost = StateId::new("ghost");
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&ghost), 1.0, false), None);
    }

    #[test]
    fn zero_condition_edges_without_exit_time_never_fire() {
        let mut f = fixture();
        f.graph.connect(&f.idle, &f.walk).unwrap();
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 1.0, false), None);
    }

    #[test]
    fn exit_time_boundary_is_inclusive() {
        let mut f = fixture();
        let t = f.graph.connect(&f.idle, &f.walk).unwrap();
        exit_timed(&mut f.graph, &t, 0.8);
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.79, true), None);
        assert_eq!(
            evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.80, true),
            Some(f.walk.clone())
        );
    }

    #[test]
    fn finished_clip_passes_exit_time_gate() {
        let mut f = fixture();
        let t = f.graph.connect(&f.idle, &f.walk).unwrap();
        exit_timed(&mut f.graph, &t, 1.0);
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.995, true), None);
        assert_eq!(
            evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.995, false),
            Some(f.walk.clone())
        );
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.5, false), None);
    }

    #[test]
    fn first_eligible_transition_in_insertion_order_wins() {
        let mut f = fixture();
        let go = f.params.add("go", ParamKind::Bool, Some(Value::Bool(true))).unwrap();
        // insert directly to bypass single-edge-per-source editing
        for (id, target) in [("a", f.walk.clone()), ("b", f.run.clone())] {
            let mut t = Transition::new(id, f.idle.clone(), target);
            t.conditions.push(Condition::new(go.clone(), CompareOp::Eq, true));
            f.graph.insert_transition(t).unwrap();
        }
        let firing = select_transition(
            &f.graph,
            &f.params,
            Some(&f.idle),
            0.0,
            true,
            FINISHED_PROGRESS,
        )
        .unwrap();
        assert_eq!(firing.transition, TransitionId::new("a"));
        assert_eq!(firing.target, f.walk);
        assert!(!firing.via_any);
    }

    #[test]
    fn bool_condition_with_ordering_operator_never_fires() {
        let mut f = fixture();
        let go = f.params.add("go", ParamKind::Bool, Some(Value::Bool(true))).unwrap();
        let mut t = Transition::new("t", f.idle.clone(), f.walk.clone());
        t.conditions.push(Condition::new(go, CompareOp::GtEq, false));
        f.graph.insert_transition(t).unwrap();
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.0, true), None);
    }

    #[test]
    fn trigger_is_consumed_and_not_refired() {
        let mut f = fixture();
        let jump = f.params.add("jump", ParamKind::Trigger, None).unwrap();
        let t = f.graph.connect(&f.idle, &f.walk).unwrap();
        f.graph
            .add_condition(&t, Condition::new(jump.clone(), CompareOp::Eq, true), &f.params)
            .unwrap();

        f.params.set(&jump, Value::Bool(true)).unwrap();
        assert_eq!(
            evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.0, true),
            Some(f.walk.clone())
        );
        assert_eq!(f.params.get(&jump), Some(Value::Bool(false)));
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.0, true), None);
    }

    #[test]
    fn triggers_survive_when_nothing_fires() {
        let mut f = fixture();
        let jump = f.params.add("jump", ParamKind::Trigger, Some(Value::Bool(true))).unwrap();
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.0, true), None);
        assert_eq!(f.params.get(&jump), Some(Value::Bool(true)));
    }

    #[test]
    fn exit_target_redirects_through_entry() {
        let mut f = fixture();
        let exit = StateId::new(EXIT_ID);
        let t = f.graph.connect(&f.walk, &exit).unwrap();
        exit_timed(&mut f.graph, &t, 0.5);
        let firing = select_transition(
            &f.graph,
            &f.params,
            Some(&f.walk),
            0.6,
            true,
            FINISHED_PROGRESS,
        )
        .unwrap();
        assert_eq!(firing.target, f.idle);
        assert!(firing.redirected);
    }

    #[test]
    fn exit_without_entry_edge_keeps_literal_exit() {
        let mut f = fixture();
        let entry_edge = f
            .graph
            .outgoing(&StateId::new(ENTRY_ID))
            .next()
            .map(|t| t.id.clone())
            .unwrap();
        f.graph.delete_transition(&entry_edge).unwrap();
        let exit = StateId::new(EXIT_ID);
        let t = f.graph.connect(&f.walk, &exit).unwrap();
        exit_timed(&mut f.graph, &t, 0.0);
        assert_eq!(
            evaluate(&f.graph, &mut f.params, Some(&f.walk), 0.0, true),
            Some(exit)
        );
    }

    #[test]
    fn any_state_edges_follow_own_edges_and_skip_self_loops() {
        let mut f = fixture();
        let hit = f.params.add("hit", ParamKind::Bool, Some(Value::Bool(true))).unwrap();
        let any = StateId::new(ANY_ID);
        let t = f.graph.connect(&any, &f.run).unwrap();
        f.graph
            .add_condition(&t, Condition::new(hit.clone(), CompareOp::Eq, true), &f.params)
            .unwrap();

        let firing = select_transition(
            &f.graph,
            &f.params,
            Some(&f.idle),
            0.0,
            true,
            FINISHED_PROGRESS,
        )
        .unwrap();
        assert!(firing.via_any);
        assert_eq!(firing.target, f.run);

        // already in Run: Any -> Run must not be returned
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.run), 0.0, true), None);

        // the active state's own edge takes precedence over Any
        let own = f.graph.connect(&f.idle, &f.walk).unwrap();
        f.graph
            .add_condition(&own, Condition::new(hit, CompareOp::Eq, true), &f.params)
            .unwrap();
        let firing = select_transition(
            &f.graph,
            &f.params,
            Some(&f.idle),
            0.0,
            true,
            FINISHED_PROGRESS,
        )
        .unwrap();
        assert_eq!(firing.target, f.walk);
        assert!(!firing.via_any);
    }

    #[test]
    fn exit_redirect_back_to_active_state_does_not_fire() {
        let mut f = fixture();
        let flag = f.params.add("flag", ParamKind::Bool, Some(Value::Bool(true))).unwrap();
        let jump = f.params.add("jump", ParamKind::Trigger, Some(Value::Bool(true))).unwrap();
        let exit = StateId::new(EXIT_ID);
        let any = StateId::new(ANY_ID);

        // Any -> Exit lands on Idle through Entry while Idle is active.
        let mut t = Transition::new("any-exit", any.clone(), exit.clone());
        t.conditions.push(Condition::new(flag.clone(), CompareOp::Eq, true));
        f.graph.insert_transition(t).unwrap();
        // Idle -> Exit with exit time 0 lands on Idle too.
        let own = f.graph.connect(&f.idle, &exit).unwrap();
        exit_timed(&mut f.graph, &own, 0.0);

        for _ in 0..3 {
            assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 0.5, true), None);
            assert_eq!(f.params.get(&jump), Some(Value::Bool(true)));
        }

        // From another state the same Any edge is a real redirect.
        let firing = select_transition(
            &f.graph,
            &f.params,
            Some(&f.walk),
            0.0,
            true,
            FINISHED_PROGRESS,
        )
        .unwrap();
        assert_eq!(firing.transition, TransitionId::new("any-exit"));
        assert_eq!(firing.target, f.idle);
        assert!(firing.redirected);

        // Later candidates are still considered after a skipped self-redirect.
        let mut t = Transition::new("any-run", any, f.run.clone());
        t.conditions.push(Condition::new(flag, CompareOp::Eq, true));
        f.graph.insert_transition(t).unwrap();
        let firing = select_transition(
            &f.graph,
            &f.params,
            Some(&f.idle),
            0.0,
            true,
            FINISHED_PROGRESS,
        )
        .unwrap();
        assert_eq!(firing.transition, TransitionId::new("any-run"));
        assert_eq!(firing.target, f.run);
    }

    #[test]
    fn missing_parameter_and_dangling_target_fail_closed() {
        let mut f = fixture();
        let mut t = Transition::new("dangling", f.idle.clone(), "nowhere");
        t.has_exit_time = true;
        t.exit_time = 0.0;
        f.graph.insert_transition(t).unwrap();

        let mut t = Transition::new("ghost-param", f.idle.clone(), f.walk.clone());
        t.conditions.push(Condition::new("ghost", CompareOp::Eq, true));
        f.graph.insert_transition(t).unwrap();

        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.idle), 1.0, false), None);
    }

    #[test]
    fn float_conditions_combine_with_exit_time() {
        let mut f = fixture();
        let speed = f.params.add("speed", ParamKind::Float, None).unwrap();
        let t = f.graph.connect(&f.walk, &f.run).unwrap();
        exit_timed(&mut f.graph, &t, 0.5);
        f.graph
            .add_condition(&t, Condition::new(speed.clone(), CompareOp::Gt, 2.0_f32), &f.params)
            .unwrap();

        f.params.set(&speed, Value::Float(3.0)).unwrap();
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.walk), 0.4, true), None);
        assert_eq!(
            evaluate(&f.graph, &mut f.params, Some(&f.walk), 0.5, true),
            Some(f.run.clone())
        );
        f.params.set(&speed, Value::Float(1.0)).unwrap();
        assert_eq!(evaluate(&f.graph, &mut f.params, Some(&f.walk), 0.9, true), None);
    }
}
