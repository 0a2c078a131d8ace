//! Condition predicates over the parameter table.

use serde::{Deserialize, Serialize};

use crate::error::{AsmError, AsmResult};
use crate::ids::ParamId;
use crate::params::ParameterTable;
use crate::value::{Value, ValueKind};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CompareOp {
    #[serde(rename = "eq")]
    Eq,
    #[serde(rename = "neq")]
    NotEq,
    #[serde(rename = "gt")]
    Gt,
    #[serde(rename = "lt")]
    Lt,
    #[serde(rename = "gte")]
    GtEq,
    #[serde(rename = "lte")]
    LtEq,
}

impl CompareOp {
    /// Operator table: booleans only support equality tests.
    #[inline]
    pub fn supports(self, kind: ValueKind) -> bool {
        match kind {
            ValueKind::Bool => matches!(self, CompareOp::Eq | CompareOp::NotEq),
            ValueKind::Float => true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub parameter_id: ParamId,
    pub op: CompareOp,
    pub threshold: Value,
}

impl Condition {
    pub fn new(
        parameter_id: impl Into<ParamId>,
        op: CompareOp,
        threshold: impl Into<Value>,
    ) -> Self {
        Self {
            parameter_id: parameter_id.into(),
            op,
            threshold: threshold.into(),
        }
    }

    /// Check the threshold type and operator against the referenced parameter.
    pub fn validate(&self, params: &ParameterTable) -> AsmResult<()> {
        let param = params
            .parameter(&self.parameter_id)
            .ok_or_else(|| AsmError::UnknownParameter(self.parameter_id.clone()))?;
        let expected = param.kind.value_kind();
        if self.threshold.kind() != expected {
            return Err(AsmError::ThresholdKindMismatch {
                param: self.parameter_id.clone(),
                expected,
                actual: self.threshold.kind(),
            });
        }
        if !self.op.supports(expected) {
            return Err(AsmError::OperatorNotSupported {
                op: self.op,
                kind: expected,
            });
        }
        Ok(())
    }
}

/// Compare a parameter value against a threshold. Mixed types and unsupported
/// operators evaluate to `false`.
pub fn compare(op: CompareOp, value: Value, threshold: Value) -> bool {
    match (value, threshold) {
        (Value::Bool(a), Value::Bool(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::NotEq => a != b,
            _ => false,
        },
        (Value::Float(a), Value::Float(b)) => match op {
            CompareOp::Eq => a == b,
            CompareOp::NotEq => a != b,
            CompareOp::Gt => a > b,
            CompareOp::Lt => a < b,
            CompareOp::GtEq => a >= b,
            CompareOp::LtEq => a <= b,
        },
        _ => false,
    }
}

/// Evaluate one condition. A missing parameter is "not satisfied".
#[inline]
pub fn check_condition(cond: &Condition, params: &ParameterTable) -> bool {
    match params.get(&cond.parameter_id) {
        Some(value) => compare(cond.op, value, cond.threshold),
        None => false,
    }
}

/// Logical AND over a condition list; empty lists are vacuously true.
#[inline]
pub fn check_all(conds: &[Condition], params: &ParameterTable) -> bool {
    conds.iter().all(|c| check_condition(c, params))
}
