//! Errors raised at the mutation boundary.
//!
//! The evaluator and blend controller never return these: referential gaps
//! fail closed and degenerate graphs use fallbacks. Only edits and document
//! loading can be rejected.

use thiserror::Error;

use crate::condition::CompareOp;
use crate::ids::{ParamId, StateId, TransitionId};
use crate::value::ValueKind;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum AsmError {
    #[error("unknown state '{0}'")]
    UnknownState(StateId),

    #[error("unknown transition '{0}'")]
    UnknownTransition(TransitionId),

    #[error("unknown parameter '{0}'")]
    UnknownParameter(ParamId),

    #[error("state speed must be finite and > 0 (got {0})")]
    InvalidSpeed(f32),

    #[error("transition duration must be finite and >= 0 ms (got {0})")]
    InvalidDuration(f32),

    #[error("exit time must be within [0, 1] (got {0})")]
    InvalidExitTime(f32),

    #[error("condition threshold is {actual:?} but parameter '{param}' holds {expected:?}")]
    ThresholdKindMismatch {
        param: ParamId,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("operator {op:?} is not supported for {kind:?} parameters")]
    OperatorNotSupported { op: CompareOp, kind: ValueKind },

    #[error("parameter '{param}' value must be finite (got {value})")]
    NonFiniteValue { param: ParamId, value: f32 },

    #[error("value is {actual:?} but parameter '{param}' holds {expected:?}")]
    ValueKindMismatch {
        param: ParamId,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("cannot connect '{from}' -> '{to}': {reason}")]
    InvalidConnection {
        from: StateId,
        to: StateId,
        reason: String,
    },

    #[error("state '{0}' is a built-in node and cannot be removed")]
    ProtectedState(StateId),

    #[error("condition index {index} out of range for transition '{transition}'")]
    ConditionIndexOutOfRange {
        transition: TransitionId,
        index: usize,
    },

    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    #[error("document json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for AsmError {
    fn from(e: serde_json::Error) -> Self {
        AsmError::Json(e.to_string())
    }
}

pub type AsmResult<T> = Result<T, AsmError>;
