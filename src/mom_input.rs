//! MOM_input parameter files: the resolved parameter writer, the reader for
//! files in MOM_input syntax (MOM_input itself, user_nl_mom, MOM_override)
//! and the MOM_override writer.

use std::fs;
use std::io::Write;
use std::path::Path;

use indexmap::map::Entry;

use crate::document::{Mapping, Node};
use crate::error::{MomError, MomResult};
use crate::rps::GLOBAL_MODULE;
use crate::value::Value;

pub const MOM_INPUT_HEADER: &str = "\
/* WARNING: DO NOT EDIT this file. Any changes you make will be
   overwritten. To change MOM6 parameters within CESM, use the
   SourceMods or user_nl_mom mechanisms.

   This input file provides the adjustable run-time parameters
   for version 6 of the Modular Ocean Model (MOM6). By default,
   it contains the out-of-the-box CESM configuration. A full list
   of the parameters of this case is in the MOM_parameter_doc.all
   file generated by the model at runtime. */

";

pub const MOM_OVERRIDE_HEADER: &str = "\
/* WARNING: DO NOT EDIT this file! Any user changes made in files
   in RUNDIR will be overwritten. This file is automatically generated.
   MOM6 parameter changes may be made via SourceMods or user_nl_mom
   within CASEROOT. */
";

/// Column at which parameter descriptions start.
const DESCRIPTION_INDENT: usize = 32;

/// Renders a resolved parameter entry as it appears to the right of `=`.
/// Null values (and entries whose value was never resolved) give `None`.
pub fn render_param(node: &Node) -> Option<String> {
    match node {
        Node::Value(Value::Null) => None,
        Node::Value(value) => Some(value.to_string()),
        Node::Sequence(items) => {
            let rendered: Vec<String> = items.iter().filter_map(render_param).collect();
            Some(rendered.join(", "))
        }
        Node::Mapping(fields) => fields.get("value").and_then(render_param),
    }
}

fn description(node: &Node) -> Option<&str> {
    node.as_mapping()
        .and_then(|fields| fields.get("description"))
        .and_then(Node::as_value)
        .and_then(Value::as_str)
}

/// Writes resolved parameters in MOM_input syntax. Parameters of the
/// `Global` module are written outside of any module block.
pub fn write_mom_input<W: Write>(params: &Mapping, writer: &mut W) -> MomResult<()> {
    writer.write_all(MOM_INPUT_HEADER.as_bytes())?;

    let tab = " ".repeat(DESCRIPTION_INDENT);
    for (module, vars) in params {
        let vars = match vars.as_mapping() {
            Some(vars) => vars,
            None => continue,
        };
        let in_block = module != GLOBAL_MODULE;

        if in_block {
            writeln!(writer, "{}%", module)?;
        }

        for (name, entry) in vars {
            let value = match render_param(entry) {
                Some(value) => value,
                None => continue,
            };
            writeln!(writer, "{} = {}", name, value)?;

            let text = description(entry).unwrap_or("");
            let text = text.strip_suffix('\n').unwrap_or(text);
            if !text.is_empty() {
                for line in text.split('\n') {
                    writeln!(writer, "{}! {}", tab, line)?;
                }
            }
            writeln!(writer)?;
        }

        if in_block {
            writeln!(writer, "%{}", module)?;
        }
    }
    Ok(())
}

/// Parses text in MOM_input syntax into `module -> parameter -> value`,
/// values kept as the raw text right of `=`. `source_name` is used in
/// error messages.
pub fn read_mom_input(text: &str, source_name: &str) -> MomResult<Mapping> {
    let syntax_error = |line: usize, reason: String| MomError::ParamSyntax {
        source_name: source_name.to_owned(),
        line,
        reason,
    };

    let mut data = Mapping::new();
    let mut in_comment_block = false;
    let mut module = GLOBAL_MODULE.to_owned();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if !in_comment_block && line.starts_with("/*") {
            in_comment_block = true;
        }
        if in_comment_block {
            if line.ends_with("*/") {
                in_comment_block = false;
            }
            continue;
        }

        if line.starts_with('!') {
            continue;
        }

        if module == GLOBAL_MODULE && line.ends_with('%') {
            module = line.trim_end_matches('%').trim().to_owned();
            continue;
        }
        if module != GLOBAL_MODULE && line.starts_with('%') {
            let closing = line.trim_start_matches('%').trim();
            if closing != module {
                return Err(syntax_error(
                    line_no,
                    format!("block {}% closed by %{}", module, closing),
                ));
            }
            module = GLOBAL_MODULE.to_owned();
            continue;
        }

        let assignment = match line.strip_prefix("#override") {
            Some(rest) if !rest.trim().is_empty() => rest.trim(),
            _ => line,
        };
        let (name, value) = match assignment.split_once('=') {
            Some(parts) => parts,
            None => return Err(syntax_error(line_no, format!("cannot parse `{}`", line))),
        };
        let name = name.trim();
        let value = value.split('!').next().unwrap_or("").trim();
        if name.is_empty() {
            return Err(syntax_error(line_no, format!("missing parameter name in `{}`", line)));
        }

        let vars = data
            .entry(module.clone())
            .or_insert_with(|| Node::Mapping(Mapping::new()));
        if let Node::Mapping(vars) = vars {
            match vars.entry(name.to_owned()) {
                Entry::Occupied(_) => {
                    return Err(syntax_error(
                        line_no,
                        format!("{} listed more than once", name),
                    ))
                }
                Entry::Vacant(slot) => {
                    slot.insert(Node::from(value));
                }
            }
        }
    }

    if in_comment_block {
        return Err(syntax_error(text.lines().count(), "unterminated comment block".to_owned()));
    }
    if module != GLOBAL_MODULE {
        return Err(syntax_error(
            text.lines().count(),
            format!("module block {}% is never closed", module),
        ));
    }
    Ok(data)
}

pub fn read_mom_input_file<P: AsRef<Path>>(path: P) -> MomResult<Mapping> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    read_mom_input(&text, &path.display().to_string())
}

fn lookup<'a>(params: &'a Mapping, module: &str, name: &str) -> Option<&'a Node> {
    params
        .get(module)
        .and_then(Node::as_mapping)
        .and_then(|vars| vars.get(name))
}

/// Writes a MOM_override file from user parameters: parameters changed from
/// their default are overridden, unchanged ones are written commented out,
/// and parameters without a default are set plainly.
pub fn write_mom_override<W: Write>(
    user: &Mapping,
    defaults: &Mapping,
    writer: &mut W,
) -> MomResult<()> {
    writer.write_all(MOM_OVERRIDE_HEADER.as_bytes())?;

    for (module, vars) in user {
        let vars = match vars.as_mapping() {
            Some(vars) => vars,
            None => continue,
        };
        let in_block = module != GLOBAL_MODULE;

        if in_block {
            write!(writer, "\n{}%\n", module)?;
        }

        for (name, entry) in vars {
            let value = render_param(entry).unwrap_or_default();
            match lookup(defaults, module, name) {
                Some(default) if render_param(default).as_deref() == Some(value.as_str()) => {
                    writeln!(writer, "!!! {} = {} !(UNCHANGED)", name, value)?;
                }
                Some(_) => writeln!(writer, "#override {} = {}", name, value)?,
                None => writeln!(writer, "{} = {}", name, value)?,
            }
        }

        if in_block {
            write!(writer, "%{}\n\n", module)?;
        }
    }
    Ok(())
}
