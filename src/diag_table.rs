//! MOM6 `diag_table` writer: the diagnostic output files of a case and the
//! fields written to each of them.
//!
//! The reduced template holds a `Files` mapping of file blocks. A file block
//! carries its output settings plus any number of `fields*` blocks, each
//! naming a model `module`, a `packing` and `lists*` of field entries written
//! `name[:alias[:reduction]]`.

use std::collections::HashSet;
use std::io::Write;

use tracing::debug;

use crate::document::{Mapping, Node};
use crate::error::{MomError, MomResult};
use crate::value::Value;

/// Stand-in for the case name, replaced by [`resolve_case_name`].
pub const CASE_PLACEHOLDER: &str = "${CASE}";

const FILES_BLOCK: &str = "Files";
const MAX_FIELD_WIDTH: usize = 16;

struct Field<'a> {
    name: &'a str,
    alias: &'a str,
    reduction: Option<&'a str>,
}

impl<'a> Field<'a> {
    fn parse(entry: &'a str) -> MomResult<Self> {
        let parts: Vec<&str> = entry.split(':').collect();
        match *parts.as_slice() {
            [name] => Ok(Field {
                name,
                alias: name,
                reduction: None,
            }),
            [name, alias] => Ok(Field {
                name,
                alias,
                reduction: None,
            }),
            [name, alias, reduction] => Ok(Field {
                name,
                alias,
                reduction: Some(reduction),
            }),
            _ => Err(MomError::InvalidDiagTable(format!(
                "invalid field format: {}",
                entry
            ))),
        }
    }
}

struct FieldGroup<'a> {
    module: String,
    packing: String,
    width: usize,
    fields: Vec<Field<'a>>,
}

struct FileOutput<'a> {
    output_freq: String,
    output_freq_units: String,
    time_axis_units: String,
    new_file: Option<(String, Option<String>)>,
    reduction_method: String,
    regional_section: String,
    groups: Vec<FieldGroup<'a>>,
}

struct DiagFile<'a> {
    file_name: String,
    // None when the file lists no field
    output: Option<FileOutput<'a>>,
}

fn setting(block: &Mapping, key: &str, file: &str) -> MomResult<String> {
    match block.get(key).and_then(Node::as_value) {
        Some(Value::Null) | None => Err(MomError::InvalidDiagTable(format!(
            "file {} has no {}",
            file, key
        ))),
        Some(value) => Ok(value.to_string()),
    }
}

fn optional_setting(block: &Mapping, key: &str) -> Option<String> {
    match block.get(key).and_then(Node::as_value) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value.to_string()),
    }
}

fn blocks_named<'a>(block: &'a Mapping, prefix: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
    block
        .iter()
        .filter(move |(label, node)| label.starts_with(prefix) && !node.is_null())
        .map(|(_, node)| node)
}

/// Every field entry of a `fields*` block. A `lists*` entry is either a
/// list of lists or a flat list.
fn field_entries<'a>(fields: &'a Mapping, file: &str) -> MomResult<Vec<&'a str>> {
    let mut entries = Vec::new();
    for lists in blocks_named(fields, "lists") {
        let items = match lists {
            Node::Sequence(items) => items,
            _ => {
                return Err(MomError::InvalidDiagTable(format!(
                    "fields of file {} must be listed in sequences",
                    file
                )))
            }
        };
        for item in items {
            match item {
                Node::Sequence(inner) => {
                    for entry in inner {
                        entries.push(field_entry(entry, file)?);
                    }
                }
                other => entries.push(field_entry(other, file)?),
            }
        }
    }
    Ok(entries)
}

fn field_entry<'a>(node: &'a Node, file: &str) -> MomResult<&'a str> {
    match node {
        Node::Value(Value::Str(entry)) => Ok(entry.as_str()),
        other => Err(MomError::InvalidDiagTable(format!(
            "field entry {:?} of file {} is not a string",
            other, file
        ))),
    }
}

impl<'a> DiagFile<'a> {
    fn from_block(label: &str, node: &'a Node) -> MomResult<Self> {
        let block = node.as_mapping().ok_or_else(|| {
            MomError::InvalidDiagTable(format!("file block {} is not a mapping", label))
        })?;
        let suffix = setting(block, "suffix", label)?;
        let file_name = format!("\"{}.mom6.{}\"", CASE_PLACEHOLDER, suffix);

        let mut groups = Vec::new();
        let mut aliases = HashSet::new();
        for fields in blocks_named(block, "fields") {
            let fields = fields.as_mapping().ok_or_else(|| {
                MomError::InvalidDiagTable(format!("fields of file {} are not a mapping", suffix))
            })?;
            let entries = field_entries(fields, &suffix)?;
            if entries.is_empty() {
                continue;
            }

            let parsed = entries
                .iter()
                .copied()
                .map(Field::parse)
                .collect::<MomResult<Vec<_>>>()?;
            for field in &parsed {
                if !aliases.insert(field.alias) {
                    return Err(MomError::DuplicateDiagField {
                        field: field.alias.to_owned(),
                        file: suffix.clone(),
                    });
                }
            }

            let longest = entries.iter().map(|entry| entry.len()).max().unwrap_or(0);
            groups.push(FieldGroup {
                module: setting(fields, "module", &suffix)?,
                packing: setting(fields, "packing", &suffix)?,
                width: (longest + 3).min(MAX_FIELD_WIDTH),
                fields: parsed,
            });
        }

        if groups.is_empty() {
            debug!(file = %suffix, "no fields listed, skipping file");
            return Ok(DiagFile {
                file_name,
                output: None,
            });
        }

        let new_file = optional_setting(block, "new_file_freq")
            .map(|freq| (freq, optional_setting(block, "new_file_freq_units")));
        let output = FileOutput {
            output_freq: setting(block, "output_freq", &suffix)?,
            output_freq_units: setting(block, "output_freq_units", &suffix)?,
            time_axis_units: setting(block, "time_axis_units", &suffix)?,
            new_file,
            reduction_method: setting(block, "reduction_method", &suffix)?,
            regional_section: setting(block, "regional_section", &suffix)?,
            groups,
        };
        Ok(DiagFile {
            file_name,
            output: Some(output),
        })
    }
}

fn quoted(s: &str) -> String {
    format!("\"{}\",", s)
}

fn write_file_entry<W: Write>(
    writer: &mut W,
    file_name: &str,
    output: &FileOutput<'_>,
    width: usize,
) -> MomResult<()> {
    write!(
        writer,
        "{:<width$} {:<3} {:<9} 1, {:<9} \"time\"",
        format!("{},", file_name),
        format!("{},", output.output_freq),
        quoted(&output.output_freq_units),
        quoted(&output.time_axis_units),
        width = width
    )?;
    if let Some((freq, units)) = &output.new_file {
        write!(writer, ", {}, ", freq)?;
        if let Some(units) = units {
            write!(writer, "\"{}\"", units)?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

fn write_field_entries<W: Write>(
    writer: &mut W,
    file_name: &str,
    output: &FileOutput<'_>,
) -> MomResult<()> {
    writeln!(writer, "# {}", file_name)?;
    for group in &output.groups {
        for field in &group.fields {
            let reduction = field.reduction.unwrap_or(output.reduction_method.as_str());
            writeln!(
                writer,
                "{} {:<width$}{:<width$}{}, \"all\", {} {} {}",
                quoted(&group.module),
                quoted(field.name),
                quoted(field.alias),
                file_name,
                quoted(reduction),
                quoted(&output.regional_section),
                group.packing,
                width = group.width
            )?;
        }
    }
    writeln!(writer)?;
    Ok(())
}

/// Writes the diag_table of the reduced template `data`. File names keep the
/// `${CASE}` placeholder. Files without any field are left out, though their
/// names still count towards the column width.
pub fn write_diag_table<W: Write>(data: &Mapping, writer: &mut W) -> MomResult<()> {
    let files = data
        .get(FILES_BLOCK)
        .and_then(Node::as_mapping)
        .ok_or_else(|| MomError::InvalidDiagTable("no Files block found".to_owned()))?;
    let files = files
        .iter()
        .filter(|(_, node)| !node.is_null())
        .map(|(label, node)| DiagFile::from_block(label, node))
        .collect::<MomResult<Vec<_>>>()?;

    // quotation marks and tabbing
    let width = files.iter().map(|file| file.file_name.len()).max().unwrap_or(0) + 4;
    let listed: Vec<(&str, &FileOutput)> = files
        .iter()
        .filter_map(|file| file.output.as_ref().map(|output| (file.file_name.as_str(), output)))
        .collect();

    writeln!(
        writer,
        "\"MOM6 diagnostic fields table for CESM case: {}\"",
        CASE_PLACEHOLDER
    )?;
    writeln!(writer, "1 1 1 0 0 0")?;

    writeln!(writer, "### Section-1: File List")?;
    writeln!(writer, "#========================")?;
    for (file_name, output) in &listed {
        write_file_entry(writer, file_name, output, width)?;
    }
    writeln!(writer)?;

    writeln!(writer, "### Section-2: Fields List")?;
    writeln!(writer, "#=========================")?;
    for (file_name, output) in &listed {
        write_field_entries(writer, file_name, output)?;
    }
    Ok(())
}

/// Fills the case name into a written diag_table.
pub fn resolve_case_name(diag_table: &str, casename: &str) -> String {
    diag_table.replace(CASE_PLACEHOLDER, casename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::InputFormat;

    const TABLE: &str = r#"
Files:
  native:
    suffix: h.native
    output_freq: 1
    output_freq_units: months
    time_axis_units: days
    reduction_method: mean
    regional_section: none
    fields:
      module: ocean_model
      packing: 1
      lists:
        - [SSH, "tos:sst"]
        - ["thetao:thetao:max"]
    fields_2:
      module: ice_model
      packing: 2
      lists: [[hi]]
  spinup:
    suffix: h.spinup_only
    output_freq: 5
    output_freq_units: days
    time_axis_units: days
    reduction_method: mean
    regional_section: none
    fields:
      module: ocean_model
      packing: 1
      lists: null
  sfc:
    suffix: h.sfc
    output_freq: 1
    output_freq_units: days
    time_axis_units: days
    reduction_method: mean
    regional_section: none
    new_file_freq: 1
    new_file_freq_units: years
    fields:
      module: ocean_model
      packing: 2
      lists: [[SSH, a_very_long_field_name]]
"#;

    fn written(yaml: &str) -> MomResult<String> {
        let data = InputFormat::Yaml.parse(yaml).unwrap();
        let mut out = Vec::new();
        write_diag_table(&data, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn files_and_fields_are_aligned_in_columns() {
        let expected = concat!(
            "\"MOM6 diagnostic fields table for CESM case: ${CASE}\"\n",
            "1 1 1 0 0 0\n",
            "### Section-1: File List\n",
            "#========================\n",
            "\"${CASE}.mom6.h.native\",         1,  \"months\", 1, \"days\",   \"time\"\n",
            "\"${CASE}.mom6.h.sfc\",            1,  \"days\",   1, \"days\",   \"time\", ",
            "1, \"years\"\n",
            "\n",
            "### Section-2: Fields List\n",
            "#=========================\n",
            "# \"${CASE}.mom6.h.native\"\n",
            "\"ocean_model\", \"SSH\",          \"SSH\",          \"${CASE}.mom6.h.native\", ",
            "\"all\", \"mean\", \"none\", 1\n",
            "\"ocean_model\", \"tos\",          \"sst\",          \"${CASE}.mom6.h.native\", ",
            "\"all\", \"mean\", \"none\", 1\n",
            "\"ocean_model\", \"thetao\",       \"thetao\",       \"${CASE}.mom6.h.native\", ",
            "\"all\", \"max\", \"none\", 1\n",
            "\"ice_model\", \"hi\",\"hi\",\"${CASE}.mom6.h.native\", ",
            "\"all\", \"mean\", \"none\", 2\n",
            "\n",
            "# \"${CASE}.mom6.h.sfc\"\n",
            "\"ocean_model\", \"SSH\",          \"SSH\",          \"${CASE}.mom6.h.sfc\", ",
            "\"all\", \"mean\", \"none\", 2\n",
            "\"ocean_model\", \"a_very_long_field_name\",\"a_very_long_field_name\",",
            "\"${CASE}.mom6.h.sfc\", \"all\", \"mean\", \"none\", 2\n",
            "\n",
        );
        assert_eq!(written(TABLE).unwrap(), expected);
    }

    #[test]
    fn aliases_must_be_unique_within_a_file() {
        let table = TABLE.replace("[SSH, \"tos:sst\"]", "[SSH, \"tos:SSH\"]");
        match written(&table) {
            Err(MomError::DuplicateDiagField { field, file }) => {
                assert_eq!(field, "SSH");
                assert_eq!(file, "h.native");
            }
            other => panic!("expected a duplicate field, got {:?}", other),
        }
    }

    #[test]
    fn field_entries_have_at_most_three_parts() {
        let table = TABLE.replace("thetao:thetao:max", "thetao:thetao:max:min");
        assert!(matches!(
            written(&table),
            Err(MomError::InvalidDiagTable(_))
        ));
    }

    #[test]
    fn files_without_fields_are_skipped() {
        let text = written(TABLE).unwrap();
        assert!(!text.contains("h.spinup_only"));
        assert!(matches!(
            written("Global: {}\n"),
            Err(MomError::InvalidDiagTable(_))
        ));
    }

    #[test]
    fn case_name_is_filled_in() {
        let text = written(TABLE).unwrap();
        let resolved = resolve_case_name(&text, "b.e23.test");
        let header = "\"MOM6 diagnostic fields table for CESM case: b.e23.test\"\n";
        assert!(resolved.starts_with(header));
        assert!(resolved.contains("# \"b.e23.test.mom6.h.sfc\"\n"));
        assert!(!resolved.contains(CASE_PLACEHOLDER));
    }
}
