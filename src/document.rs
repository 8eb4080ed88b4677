use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde_derive::{Deserialize, Serialize};

use crate::error::{MomError, MomResult};
use crate::value::Value;

/// Ordered mapping from module, variable or guard names to sub-trees.
pub type Mapping = IndexMap<String, Node>;

/// A node of a parameter document. Guarded-value blocks are mappings whose
/// keys are all guards; they are recognised during value inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Value(Value),
    Sequence(Vec<Node>),
    Mapping(Mapping),
}

impl Node {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Node::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Value(Value::Null))
    }

    /// The parameter value of a variable entry: the `value` field of a
    /// mapping entry, or the entry itself when it is a bare scalar.
    pub fn param_value(&self) -> Option<&Value> {
        match self {
            Node::Value(value) => Some(value),
            Node::Mapping(fields) => fields.get("value").and_then(Node::as_value),
            Node::Sequence(_) => None,
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        Node::Value(value)
    }
}

impl From<bool> for Node {
    fn from(b: bool) -> Self {
        Node::Value(Value::Bool(b))
    }
}

impl From<i64> for Node {
    fn from(i: i64) -> Self {
        Node::Value(Value::Int(i))
    }
}

impl From<f64> for Node {
    fn from(x: f64) -> Self {
        Node::Value(Value::Float(x))
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Value(Value::from(s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
}

impl InputFormat {
    /// Infers the format from the file extension.
    pub fn infer(path: &Path) -> MomResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(InputFormat::Json),
            Some("yml") | Some("yaml") => Ok(InputFormat::Yaml),
            _ => Err(MomError::UnknownFormat(path.to_path_buf())),
        }
    }

    pub fn parse(self, text: &str) -> MomResult<Mapping> {
        let mapping = match self {
            InputFormat::Json => serde_json::from_str(text)?,
            InputFormat::Yaml => serde_yaml::from_str(text)?,
        };
        Ok(mapping)
    }
}

/// Reads a JSON or YAML document, preserving key order.
pub fn load_mapping(path: &Path, format: Option<InputFormat>) -> MomResult<Mapping> {
    let format = match format {
        Some(format) => format,
        None => InputFormat::infer(path)?,
    };
    let text = fs::read_to_string(path)?;
    format.parse(&text)
}

/// Deep-merges `other` into `base`: nested mappings present on both sides
/// are merged recursively, anything else in `other` overwrites.
pub fn merge_mappings(base: &mut Mapping, other: Mapping) {
    for (key, node) in other {
        match node {
            Node::Mapping(incoming) => match base.get_mut(&key) {
                Some(Node::Mapping(existing)) => merge_mappings(existing, incoming),
                _ => {
                    base.insert(key, Node::Mapping(incoming));
                }
            },
            node => {
                base.insert(key, node);
            }
        }
    }
}
