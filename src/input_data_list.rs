//! `input_data_list` writer: the input files a case needs, so the build
//! system can check for and download them.

use std::io::Write;
use std::path::Path;

use tracing::trace;

use crate::document::{Mapping, Node};
use crate::error::MomResult;
use crate::value::Value;

/// Writes `category = path` for every absolute path in `data`
/// (`module -> category -> path`). Relative paths are resolved against a
/// user input directory the build system does not manage and are skipped.
pub fn write_input_data_list<W: Write>(data: &Mapping, writer: &mut W) -> MomResult<()> {
    for (module, categories) in data {
        let categories = match categories.as_mapping() {
            Some(categories) => categories,
            None => continue,
        };

        for (category, entry) in categories {
            let raw = match entry.param_value() {
                Some(Value::Null) | None => continue,
                Some(value) => value.to_string(),
            };
            let file_path: String = raw.chars().filter(|c| *c != '"' && *c != '\'').collect();

            if Path::new(&file_path).is_absolute() {
                writeln!(writer, "{} = {}", category, file_path)?;
            } else {
                trace!(
                    module = %module,
                    category = %category,
                    path = %file_path,
                    "skipping relative path"
                );
            }
        }
    }
    Ok(())
}

/// True if `data` lists no file at all.
pub fn is_empty(data: &Mapping) -> bool {
    data.values().filter_map(Node::as_mapping).all(|categories| {
        categories
            .values()
            .all(|entry| entry.param_value().map_or(true, Value::is_null))
    })
}
