//! The merged YAML document container-style packagers pin versions in.

use crate::domain::ComponentVersionMap;
use crate::error::Result;
use crate::project::VARIABLES_KEY;
use serde_yaml::{Mapping, Value};

/// Parsed `ci_files/variables.yml`.
///
/// Only the entries below `variables:` are ever rewritten. Every other
/// top-level key and every unrelated variable survives a merge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariablesDocument {
    root: Mapping,
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl VariablesDocument {
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(VariablesDocument::default());
        }

        let root: Mapping = serde_yaml::from_str(content)?;
        Ok(VariablesDocument { root })
    }

    fn variables(&self) -> Option<&Mapping> {
        self.root.get(VARIABLES_KEY).and_then(Value::as_mapping)
    }

    pub fn has_variables(&self) -> bool {
        self.variables().is_some()
    }

    /// Scalar value of a variable rendered as a string
    pub fn get(&self, key: &str) -> Option<String> {
        self.variables()?.get(key).and_then(scalar_to_string)
    }

    /// Overwrite the given variables, keeping everything else
    pub fn merge(&mut self, versions: &ComponentVersionMap) {
        let key = Value::String(VARIABLES_KEY.to_string());
        if !matches!(self.root.get(&key), Some(Value::Mapping(_))) {
            self.root.insert(key.clone(), Value::Mapping(Mapping::new()));
        }

        if let Some(Value::Mapping(variables)) = self.root.get_mut(&key) {
            for (component, version) in versions.iter() {
                variables.insert(
                    Value::String(component.to_string()),
                    Value::String(version.to_string()),
                );
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }
}
