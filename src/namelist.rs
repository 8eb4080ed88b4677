//! Fortran namelist (`input.nml`) writer.

use std::io::Write;

use crate::document::{Mapping, Node};
use crate::error::MomResult;
use crate::value::{format_real, Value};

/// Renders a scalar as a Fortran namelist literal. Strings that already read
/// as a Fortran literal (quoted, logical or numeric) are kept verbatim.
pub fn fortran_literal(value: &Value) -> Option<String> {
    let literal = match value {
        Value::Null => return None,
        Value::Bool(true) => ".true.".to_owned(),
        Value::Bool(false) => ".false.".to_owned(),
        Value::Int(i) => i.to_string(),
        Value::Float(x) => format_real(*x),
        Value::Str(s) if is_fortran_literal(s) => s.trim().to_owned(),
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
    };
    Some(literal)
}

fn is_fortran_literal(s: &str) -> bool {
    let s = s.trim();
    let quoted = s.len() >= 2
        && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"')));
    let logical = matches!(
        s.to_ascii_lowercase().as_str(),
        ".true." | ".false." | ".t." | ".f."
    );
    let numeric = s.parse::<f64>().is_ok() && s.chars().any(|c| c.is_ascii_digit());
    quoted || logical || numeric
}

/// The value of a namelist variable entry: a `values` or `value` field, or
/// the entry itself.
fn entry_value(node: &Node) -> &Node {
    match node {
        Node::Mapping(fields) => fields
            .get("values")
            .or_else(|| fields.get("value"))
            .unwrap_or(node),
        _ => node,
    }
}

fn render(node: &Node) -> Option<String> {
    match node {
        Node::Value(value) => fortran_literal(value),
        Node::Sequence(items) => {
            let rendered: Vec<String> = items.iter().filter_map(render).collect();
            if rendered.is_empty() {
                None
            } else {
                Some(rendered.join(", "))
            }
        }
        Node::Mapping(_) => None,
    }
}

/// Writes every top-level mapping of `groups` as a `&group ... /` block.
pub fn write_namelist<W: Write>(groups: &Mapping, writer: &mut W) -> MomResult<()> {
    for (group, vars) in groups {
        let vars = match vars.as_mapping() {
            Some(vars) => vars,
            None => continue,
        };

        writeln!(writer, "&{}", group)?;
        for (name, entry) in vars {
            if let Some(value) = render(entry_value(entry)) {
                writeln!(writer, "    {} = {}", name, value)?;
            }
        }
        write!(writer, "/\n\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InputFormat;

    #[test]
    fn scalars_become_fortran_literals() {
        assert_eq!(fortran_literal(&Value::Bool(true)).unwrap(), ".true.");
        assert_eq!(fortran_literal(&Value::Float(1800.0)).unwrap(), "1800.0");
        assert_eq!(fortran_literal(&Value::Int(-2)).unwrap(), "-2");
        assert_eq!(fortran_literal(&Value::from("INPUT")).unwrap(), "'INPUT'");
        assert_eq!(fortran_literal(&Value::from("it's")).unwrap(), "'it''s'");
        assert_eq!(fortran_literal(&Value::from("'MOM_input'")).unwrap(), "'MOM_input'");
        assert_eq!(fortran_literal(&Value::from(".false.")).unwrap(), ".false.");
        assert_eq!(fortran_literal(&Value::Null), None);
    }

    #[test]
    fn groups_are_written_as_namelist_blocks() {
        let groups = InputFormat::Yaml
            .parse(
                "\
MOM_input_nml:
  output_directory:
    values: \"'./'\"
  input_filename: n
  parameter_filename: ['INPUT/MOM_input', 'INPUT/MOM_override']
fms_nml:
  clock_grain: null
  domains_stack_size:
    values: 14000000
  print_memory_usage: false
",
            )
            .unwrap();

        let mut out = Vec::new();
        write_namelist(&groups, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "&MOM_input_nml\n    output_directory = './'\n    input_filename = 'n'\n    \
             parameter_filename = 'INPUT/MOM_input', 'INPUT/MOM_override'\n/\n\n\
             &fms_nml\n    domains_stack_size = 14000000\n    print_memory_usage = .false.\n/\n\n"
        );
    }
}
