//! Serialized state machine: graph plus parameter declarations.
//!
//! ```json
//! { "states": [...], "transitions": [...], "parameters": [...] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{AsmError, AsmResult};
use crate::graph::StateGraph;
use crate::params::{Parameter, ParameterTable};

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AsmDocument {
    #[serde(flatten)]
    pub graph: StateGraph,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl AsmDocument {
    pub fn new(graph: StateGraph, parameters: Vec<Parameter>) -> Self {
        Self { graph, parameters }
    }

    /// Capture the current graph and parameter values.
    pub fn capture(graph: &StateGraph, params: &ParameterTable) -> Self {
        Self {
            graph: graph.clone(),
            parameters: params.to_vec(),
        }
    }

    /// Parse and validate a document.
    pub fn from_json(json: &str) -> AsmResult<Self> {
        let doc: Self = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    pub fn to_json(&self) -> AsmResult<String> {
        serde_json::to_string_pretty(self).map_err(AsmError::from)
    }

    /// Structural checks plus condition typing against the declared parameters.
    ///
    /// Conditions naming an undeclared parameter are accepted; they never pass.
    pub fn validate(&self) -> AsmResult<()> {
        self.graph.validate()?;
        let params = ParameterTable::from_parameters(self.parameters.clone())?;
        self.check_conditions(&params)
    }

    /// Split into runtime-ready parts after validation.
    pub fn into_parts(self) -> AsmResult<(StateGraph, ParameterTable)> {
        self.graph.validate()?;
        let params = ParameterTable::from_parameters(self.parameters.clone())?;
        self.check_conditions(&params)?;
        Ok((self.graph, params))
    }

    fn check_conditions(&self, params: &ParameterTable) -> AsmResult<()> {
        for t in self.graph.transitions() {
            for c in &t.conditions {
                if params.parameter(&c.parameter_id).is_some() {
                    c.validate(params)?;
                }
            }
        }
        Ok(())
    }
}
