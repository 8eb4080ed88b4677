use std::fs;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{MomError, MomResult};
use crate::value::Value;

/// Read-only view of the case settings (grid, compset, task counts, ...)
/// supplied by the host build system.
pub trait CaseLookup {
    fn get_value(&self, name: &str) -> Option<Value>;
}

impl<F> CaseLookup for F
where
    F: Fn(&str) -> Option<Value>,
{
    fn get_value(&self, name: &str) -> Option<Value> {
        self(name)
    }
}

/// In-memory case variable store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseVars {
    vars: IndexMap<String, Value>,
}

impl CaseVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a JSON object mapping variable names to scalars.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> MomResult<Self> {
        let text = fs::read_to_string(path)?;
        let vars: IndexMap<String, Value> = serde_json::from_str(&text)?;
        Ok(CaseVars { vars })
    }

    /// Parses a `NAME=VALUE` assignment, typing the value.
    pub fn parse_assignment(assignment: &str) -> MomResult<(String, Value)> {
        match assignment.split_once('=') {
            Some((name, raw)) if !name.trim().is_empty() => {
                Ok((name.trim().to_owned(), Value::parse_typed(raw)))
            }
            _ => Err(MomError::MalformedReference(assignment.to_owned())),
        }
    }

    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) -> &mut Self {
        self.vars.insert(name.to_owned(), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl CaseLookup for CaseVars {
    fn get_value(&self, name: &str) -> Option<Value> {
        self.vars.get(name).cloned()
    }
}

impl<K: Into<String>, V: Into<Value>> std::iter::FromIterator<(K, V)> for CaseVars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        CaseVars {
            vars: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignments_are_typed() {
        let (name, value) = CaseVars::parse_assignment("NTASKS_OCN=128").unwrap();
        assert_eq!(name, "NTASKS_OCN");
        assert_eq!(value, Value::Int(128));

        let (_, value) = CaseVars::parse_assignment("OCN_GRID=tx0.66v1").unwrap();
        assert_eq!(value, Value::from("tx0.66v1"));

        assert!(CaseVars::parse_assignment("no_equals_sign").is_err());
    }

    #[test]
    fn closures_act_as_lookups() {
        let lookup = |name: &str| match name {
            "OCN_GRID" => Some(Value::from("gx1v6")),
            _ => None,
        };
        assert_eq!(lookup.get_value("OCN_GRID"), Some(Value::from("gx1v6")));
        assert_eq!(lookup.get_value("COMP_ATM"), None);
    }
}
