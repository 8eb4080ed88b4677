//! Runtime parameter system.
//!
//! A parameter document goes through two passes before it is handed to a
//! writer: case variables (`${NAME}` / `$NAME`) are expanded in values and
//! keys, then guarded-value blocks are reduced to the single value that
//! applies to the case and `=`-prefixed formulas are evaluated.
//!
//! Inside guards and formulas a bare `$NAME` becomes an expression literal,
//! so string values are quoted: `$OCN_GRID == "tx0.66v1"`. A braced
//! `${NAME}` is always replaced by the plain value text, leaving any quoting
//! to the template: `"${OCN_GRID}" == "tx0.66v1"`.

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, trace};

use crate::case::CaseLookup;
use crate::document::{load_mapping, merge_mappings, InputFormat, Mapping, Node};
use crate::error::{MomError, MomResult};
use crate::expr::{eval_formula, eval_guard, is_logical_expr};
use crate::value::Value;

/// Name of the module whose parameters are written outside any block.
pub const GLOBAL_MODULE: &str = "Global";

const ELSE_GUARD: &str = "else";

pub struct RuntimeParams {
    data: Mapping,
}

impl RuntimeParams {
    pub fn new(data: Mapping) -> Self {
        RuntimeParams { data }
    }

    pub fn from_path<P: AsRef<Path>>(path: P, format: Option<InputFormat>) -> MomResult<Self> {
        let path = path.as_ref();
        let data = load_mapping(path, format)?;
        debug!(path = %path.display(), modules = data.len(), "read parameter document");
        Ok(RuntimeParams { data })
    }

    pub fn data(&self) -> &Mapping {
        &self.data
    }

    pub fn into_data(self) -> Mapping {
        self.data
    }

    /// Value of a parameter in the `Global` module.
    pub fn global_value(&self, name: &str) -> Option<&Value> {
        self.data
            .get(GLOBAL_MODULE)
            .and_then(Node::as_mapping)
            .and_then(|module| module.get(name))
            .and_then(Node::param_value)
    }

    /// Replaces case variable references in every value and key with their
    /// values for this case. Values are expanded before keys.
    pub fn expand_case_vars<C: CaseLookup + ?Sized>(&mut self, case: &C) -> MomResult<()> {
        let mut expander = Expander {
            case,
            resolved: HashMap::new(),
        };
        self.data = expander.mapping(&self.data)?;
        debug!(
            variables = expander.resolved.len(),
            "expanded case variables"
        );
        Ok(())
    }

    /// Reduces every guarded-value block to the value selected for the case
    /// and evaluates remaining formulas.
    pub fn infer_values(&mut self) -> MomResult<()> {
        if self.data.is_empty() {
            return Err(MomError::EmptyDocument);
        }
        self.data = infer_mapping(&self.data)?;
        Ok(())
    }

    /// Both passes, in order.
    pub fn reduce<C: CaseLookup + ?Sized>(&mut self, case: &C) -> MomResult<()> {
        self.expand_case_vars(case)?;
        self.infer_values()
    }

    /// Deep-merges `other` into this document, `other` taking precedence.
    pub fn append(&mut self, other: RuntimeParams) {
        merge_mappings(&mut self.data, other.data);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Guard keys and formulas: strings are substituted as quoted literals.
    Logical,
    /// Plain values and names: strings are substituted verbatim.
    Plain,
}

fn key_context(key: &str) -> Context {
    const OPERATORS: [&str; 7] = ["==", "!=", "<", ">", " and ", " or ", "not "];
    if OPERATORS.iter().any(|op| key.contains(op)) {
        Context::Logical
    } else {
        Context::Plain
    }
}

fn value_context(value: &str) -> Context {
    if is_formula(value) {
        Context::Logical
    } else {
        Context::Plain
    }
}

fn is_formula(value: &str) -> bool {
    value.starts_with('=')
}

struct Expander<'a, C: CaseLookup + ?Sized> {
    case: &'a C,
    resolved: HashMap<String, Value>,
}

impl<'a, C: CaseLookup + ?Sized> Expander<'a, C> {
    fn lookup(&mut self, name: &str) -> MomResult<Value> {
        if let Some(value) = self.resolved.get(name) {
            return Ok(value.clone());
        }
        let value = self
            .case
            .get_value(name)
            .filter(|value| !value.is_null())
            .ok_or_else(|| MomError::UndefinedCaseVariable(name.to_owned()))?;
        trace!(name, value = %value, "resolved case variable");
        self.resolved.insert(name.to_owned(), value.clone());
        Ok(value)
    }

    fn mapping(&mut self, mapping: &Mapping) -> MomResult<Mapping> {
        let values = mapping
            .values()
            .map(|node| self.node(node))
            .collect::<MomResult<Vec<_>>>()?;

        let mut expanded = Mapping::with_capacity(mapping.len());
        for (key, node) in mapping.keys().zip(values) {
            let key = if key.contains('$') {
                self.entry(key, key_context(key))?
            } else {
                key.clone()
            };
            expanded.insert(key, node);
        }
        Ok(expanded)
    }

    fn node(&mut self, node: &Node) -> MomResult<Node> {
        match node {
            Node::Value(Value::Str(s)) if s.contains('$') => {
                let expanded = self.entry(s, value_context(s))?;
                Ok(Node::Value(Value::Str(expanded)))
            }
            Node::Value(value) => Ok(Node::Value(value.clone())),
            Node::Sequence(items) => items
                .iter()
                .map(|item| self.node(item))
                .collect::<MomResult<Vec<_>>>()
                .map(Node::Sequence),
            Node::Mapping(mapping) => self.mapping(mapping).map(Node::Mapping),
        }
    }

    /// Substitutes `${NAME}` and `$NAME` references in a single string.
    fn entry(&mut self, entry: &str, context: Context) -> MomResult<String> {
        let malformed = || MomError::MalformedReference(entry.to_owned());

        let mut expanded = String::with_capacity(entry.len());
        let mut rest = entry;
        while let Some(start) = rest.find('$') {
            expanded.push_str(&rest[..start]);
            let after = &rest[start + 1..];

            let (name, remainder, braced) = if let Some(braced) = after.strip_prefix('{') {
                let end = braced.find('}').ok_or_else(malformed)?;
                (&braced[..end], &braced[end + 1..], true)
            } else {
                let end = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or_else(|| after.len());
                (&after[..end], &after[end..], false)
            };
            if name.is_empty() {
                return Err(malformed());
            }

            let value = self.lookup(name)?;
            match context {
                Context::Logical if !braced => expanded.push_str(&value.to_expr_literal()),
                _ => expanded.push_str(&value.to_string()),
            }
            rest = remainder;
        }
        expanded.push_str(rest);
        Ok(expanded)
    }
}

/// A mapping whose keys are all guards (boolean expressions or `else`).
pub struct GuardedBlock<'a> {
    options: Vec<(&'a str, &'a Node)>,
}

impl<'a> GuardedBlock<'a> {
    /// Returns the block if every key is a guard, `None` if no key is one,
    /// and an error if the keys are mixed.
    pub fn classify(mapping: &'a Mapping) -> MomResult<Option<Self>> {
        if mapping.is_empty() {
            return Ok(None);
        }
        if let Some(key) = mapping.keys().find(|key| key.contains('$')) {
            return Err(MomError::UnexpandedVariable(key.clone()));
        }

        let guards = mapping.keys().filter(|key| is_logical_expr(key)).count();
        if guards == 0 {
            Ok(None)
        } else if guards == mapping.len() {
            Ok(Some(GuardedBlock {
                options: mapping
                    .iter()
                    .map(|(guard, node)| (guard.as_str(), node))
                    .collect(),
            }))
        } else {
            let keys: Vec<&str> = mapping.keys().map(String::as_str).collect();
            Err(MomError::MixedGuardBlock(format!("{{{}}}", keys.join(", "))))
        }
    }

    /// Picks the option of the last satisfied guard, else the `else`
    /// option, else null. Every guard is evaluated.
    pub fn select(&self) -> MomResult<&'a Node> {
        const NULL: &Node = &Node::Value(Value::Null);

        let mut selected = None;
        let mut fallback = None;
        for &(guard, node) in &self.options {
            if guard.trim() == ELSE_GUARD {
                fallback = Some(node);
                continue;
            }
            if eval_guard(guard)? {
                trace!(guard, "guard satisfied");
                selected = Some(node);
            }
        }

        if selected.is_none() && fallback.is_some() {
            trace!("no guard satisfied, using else");
        }
        Ok(selected.or(fallback).unwrap_or(NULL))
    }
}

fn infer_mapping(mapping: &Mapping) -> MomResult<Mapping> {
    mapping
        .iter()
        .map(|(key, node)| -> MomResult<(String, Node)> { Ok((key.clone(), infer_node(node)?)) })
        .collect()
}

fn infer_node(node: &Node) -> MomResult<Node> {
    match node {
        Node::Mapping(mapping) => match GuardedBlock::classify(mapping)? {
            Some(block) => infer_node(block.select()?),
            None => infer_mapping(mapping).map(Node::Mapping),
        },
        Node::Sequence(items) => items
            .iter()
            .map(infer_node)
            .collect::<MomResult<Vec<_>>>()
            .map(Node::Sequence),
        Node::Value(Value::Str(s)) if is_formula(s) => {
            let value = eval_formula(&s[1..])?;
            trace!(formula = %s, result = %value, "evaluated formula");
            Ok(Node::Value(value))
        }
        Node::Value(value) => Ok(Node::Value(value.clone())),
    }
}
