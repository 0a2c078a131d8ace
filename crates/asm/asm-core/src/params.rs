//! Parameter table: named, typed values that condition predicates read.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AsmError, AsmResult};
use crate::ids::{IdAllocator, ParamId};
use crate::value::{Value, ValueKind};

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Boolean that is reset to `false` after a transition fires.
    Trigger,
    Bool,
    Float,
}

impl ParamKind {
    /// Value type stored by parameters of this kind.
    #[inline]
    pub fn value_kind(self) -> ValueKind {
        match self {
            ParamKind::Trigger | ParamKind::Bool => ValueKind::Bool,
            ParamKind::Float => ValueKind::Float,
        }
    }

    #[inline]
    pub fn default_value(self) -> Value {
        match self {
            ParamKind::Trigger | ParamKind::Bool => Value::Bool(false),
            ParamKind::Float => Value::Float(0.0),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Parameter {
    pub id: ParamId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub value: Value,
}

impl Parameter {
    fn check_value(&self, value: &Value) -> AsmResult<()> {
        let expected = self.kind.value_kind();
        if value.kind() != expected {
            return Err(AsmError::ValueKindMismatch {
                param: self.id.clone(),
                expected,
                actual: value.kind(),
            });
        }
        if let Value::Float(f) = value {
            if !f.is_finite() {
                return Err(AsmError::NonFiniteValue {
                    param: self.id.clone(),
                    value: *f,
                });
            }
        }
        Ok(())
    }
}

/// Insertion-ordered parameter storage.
#[derive(Clone, Debug, Default)]
pub struct ParameterTable {
    items: IndexMap<ParamId, Parameter>,
    ids: IdAllocator,
}

impl ParameterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from serialized parameters, validating value kinds and id uniqueness.
    pub fn from_parameters(params: Vec<Parameter>) -> AsmResult<Self> {
        let mut table = Self::new();
        for p in params {
            table.insert(p)?;
        }
        Ok(table)
    }

    /// Create a parameter with a fresh id. `value` defaults to the kind's zero value.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        kind: ParamKind,
        value: Option<Value>,
    ) -> AsmResult<ParamId> {
        let id = self.allocate_id();
        let param = Parameter {
            id: id.clone(),
            name: name.into(),
            kind,
            value: value.unwrap_or_else(|| kind.default_value()),
        };
        self.insert(param)?;
        Ok(id)
    }

    /// Reserve a parameter id unused by this table. Ids are never handed out twice.
    pub fn allocate_id(&mut self) -> ParamId {
        let items = &self.items;
        self.ids.alloc_param(|s| items.contains_key(s))
    }

    /// Insert a fully specified parameter.
    pub fn insert(&mut self, param: Parameter) -> AsmResult<()> {
        param.check_value(&param.value)?;
        if self.items.contains_key(&param.id) {
            return Err(AsmError::InvalidGraph(format!(
                "duplicate parameter id '{}'",
                param.id
            )));
        }
        self.items.insert(param.id.clone(), param);
        Ok(())
    }

    /// Remove a parameter. Conditions still referencing it evaluate as unsatisfied.
    pub fn remove(&mut self, id: &ParamId) -> Option<Parameter> {
        self.items.shift_remove(id)
    }

    pub fn rename(&mut self, id: &ParamId, name: impl Into<String>) -> AsmResult<()> {
        let p = self
            .items
            .get_mut(id)
            .ok_or_else(|| AsmError::UnknownParameter(id.clone()))?;
        p.name = name.into();
        Ok(())
    }

    #[inline]
    pub fn get(&self, id: &ParamId) -> Option<Value> {
        self.items.get(id).map(|p| p.value)
    }

    #[inline]
    pub fn parameter(&self, id: &ParamId) -> Option<&Parameter> {
        self.items.get(id)
    }

    /// Validate a write without applying it.
    pub fn check(&self, id: &ParamId, value: &Value) -> AsmResult<()> {
        self.items
            .get(id)
            .ok_or_else(|| AsmError::UnknownParameter(id.clone()))?
            .check_value(value)
    }

    /// Set a parameter's value. The value type must match the parameter kind.
    pub fn set(&mut self, id: &ParamId, value: Value) -> AsmResult<()> {
        let p = self
            .items
            .get_mut(id)
            .ok_or_else(|| AsmError::UnknownParameter(id.clone()))?;
        p.check_value(&value)?;
        p.value = value;
        Ok(())
    }

    /// Reset every Trigger currently `true` back to `false`, returning the ids that changed.
    pub fn reset_consumed_triggers(&mut self) -> Vec<ParamId> {
        let mut reset = Vec::new();
        for p in self.items.values_mut() {
            if p.kind == ParamKind::Trigger && p.value == Value::Bool(true) {
                p.value = Value::Bool(false);
                reset.push(p.id.clone());
            }
        }
        reset
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.values()
    }

    /// Owned copy of all parameters in insertion order.
    pub fn to_vec(&self) -> Vec<Parameter> {
        self.items.values().cloned().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
