//! Animation state machine core (engine-agnostic).
//!
//! A directed graph of clip-bearing states, a typed parameter table, a
//! per-tick transition evaluator and a crossfade controller. Hosts implement
//! [`ClipBackend`] for their renderer, own an [`AsmRuntime`], and call
//! [`AsmRuntime::advance`] once per displayed frame.

pub mod backend;
pub mod blend;
pub mod clock;
pub mod condition;
pub mod config;
pub mod document;
pub mod error;
pub mod eval;
pub mod graph;
pub mod ids;
pub mod inputs;
pub mod outputs;
pub mod params;
pub mod runtime;
pub mod value;

// Re-exports for hosts and adapters
pub use backend::{ClipBackend, SimClip, SimulatedClips};
pub use blend::{
    ease_in_out, Activation, ActiveTransition, BlendController, BlendPhase, BlendSample,
    PlaybackState,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use condition::{check_all, check_condition, compare, CompareOp, Condition};
pub use config::RuntimeConfig;
pub use document::AsmDocument;
pub use error::{AsmError, AsmResult};
pub use eval::{
    evaluate, exit_time_passed, is_eligible, select_transition, Firing, FINISHED_PROGRESS,
};
pub use graph::{
    State, StateGraph, StateKind, StatePatch, Transition, TransitionPatch, DEFAULT_TRANSITION_MS,
};
pub use ids::{IdAllocator, ParamId, StateId, TransitionId, ANY_ID, ENTRY_ID, EXIT_ID};
pub use inputs::{CommandQueue, EditCommand};
pub use outputs::{RuntimeEvent, RuntimeSnapshot, TickReport};
pub use params::{ParamKind, Parameter, ParameterTable};
pub use runtime::AsmRuntime;
pub use value::{Value, ValueKind};
