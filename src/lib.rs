#![warn(clippy::all)]

pub mod case;
pub mod diag_table;
pub mod document;
pub mod error;
pub mod expr;
pub mod fortran_array_2d;
pub mod input_data_list;
pub mod land_mask;
pub mod layout;
pub mod lbe;
pub mod lbe_parameters;
pub mod mom_input;
pub mod namelist;
pub mod rps;
pub mod value;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use case::CaseLookup;
use document::InputFormat;
use error::MomResult;
use land_mask::LandMask;
use lbe::MaskTable;
use lbe_parameters::LbeParameters;
use rps::RuntimeParams;
use value::Value;

/// Loads a parameter template and layers `overlays` on top of it, later
/// documents taking precedence.
pub fn load_params(
    template: &Path,
    overlays: &[PathBuf],
    format: Option<InputFormat>,
) -> MomResult<RuntimeParams> {
    let mut params = RuntimeParams::from_path(template, format)?;
    for overlay in overlays {
        params.append(RuntimeParams::from_path(overlay, format)?);
        info!(path = %overlay.display(), "applied parameter overlay");
    }
    Ok(params)
}

/// Resolves the MOM_input parameters for the case and writes them to
/// `output`. The resolved parameters are returned for use by the other
/// generators.
pub fn generate_mom_input<C: CaseLookup + ?Sized>(
    template: &Path,
    overlays: &[PathBuf],
    case: &C,
    output: &Path,
) -> MomResult<RuntimeParams> {
    let mut params = load_params(template, overlays, None)?;
    params.reduce(case)?;

    write_file(output, |writer| mom_input::write_mom_input(params.data(), writer))?;
    info!(path = %output.display(), "wrote MOM_input");
    Ok(params)
}

/// Writes MOM_override from the user's user_nl_mom, comparing each
/// parameter against the generated MOM_input.
pub fn generate_mom_override(
    user_nl: &Path,
    mom_input_path: &Path,
    output: &Path,
) -> MomResult<()> {
    let user = mom_input::read_mom_input_file(user_nl)?;
    let defaults = mom_input::read_mom_input_file(mom_input_path)?;

    write_file(output, |writer| mom_input::write_mom_override(&user, &defaults, writer))?;
    info!(path = %output.display(), "wrote MOM_override");
    Ok(())
}

pub fn generate_input_nml<C: CaseLookup + ?Sized>(
    template: &Path,
    case: &C,
    output: &Path,
) -> MomResult<()> {
    let mut groups = RuntimeParams::from_path(template, None)?;
    groups.reduce(case)?;

    write_file(output, |writer| namelist::write_namelist(groups.data(), writer))?;
    info!(path = %output.display(), "wrote input.nml");
    Ok(())
}

/// Writes the input_data_list. Variables not defined by the case are taken
/// from the `Global` module of the resolved MOM_input parameters.
pub fn generate_input_data_list<C: CaseLookup + ?Sized>(
    template: &Path,
    case: &C,
    mom_params: &RuntimeParams,
    output: &Path,
) -> MomResult<()> {
    let mut data = RuntimeParams::from_path(template, None)?;
    data.reduce(&with_mom_input_fallback(case, mom_params))?;
    if input_data_list::is_empty(data.data()) {
        warn!("no input data files are listed for this case");
    }

    write_file(output, |writer| input_data_list::write_input_data_list(data.data(), writer))?;
    info!(path = %output.display(), "wrote input_data_list");
    Ok(())
}

/// Writes the diag_table. File names keep a `${CASE}` placeholder, filled
/// in later by [`resolve_diag_table`]. Variables not defined by the case are
/// taken from the `Global` module of the resolved MOM_input parameters.
pub fn generate_diag_table<C: CaseLookup + ?Sized>(
    template: &Path,
    case: &C,
    mom_params: &RuntimeParams,
    output: &Path,
) -> MomResult<()> {
    let mut table = RuntimeParams::from_path(template, None)?;
    table.reduce(&with_mom_input_fallback(case, mom_params))?;

    write_file(output, |writer| diag_table::write_diag_table(table.data(), writer))?;
    info!(path = %output.display(), "wrote diag_table");
    Ok(())
}

/// Copies the diag_table at `input` to `output` with the case name filled in.
pub fn resolve_diag_table(input: &Path, output: &Path, casename: &str) -> MomResult<()> {
    let unresolved = fs::read_to_string(input)?;
    fs::write(output, diag_table::resolve_case_name(&unresolved, casename))?;
    info!(path = %output.display(), casename, "resolved diag_table");
    Ok(())
}

fn with_mom_input_fallback<'a, C: CaseLookup + ?Sized>(
    case: &'a C,
    mom_params: &'a RuntimeParams,
) -> impl Fn(&str) -> Option<Value> + 'a {
    move |name: &str| {
        case.get_value(name)
            .filter(|value| !value.is_null())
            .or_else(|| mom_params.global_value(name).cloned())
    }
}

/// Computes the land-block-elimination mask table for `npes` processors
/// over the topography at `topography` and writes it to `output_dir`.
pub fn auto_mask_table(
    topography: &Path,
    npes: usize,
    lbe_params: &LbeParameters,
    output_dir: &Path,
) -> MomResult<(MaskTable, PathBuf)> {
    let mask = LandMask::read_topography(topography)?;
    info!(nx = mask.nx(), ny = mask.ny(), npes, "generating mask table");

    let table = lbe::generate_mask_table(&mask, npes, lbe_params)?;
    let path = table.write_to_dir(output_dir, &lbe_params.mask_table_name)?;
    Ok((table, path))
}

fn write_file<F>(path: &Path, write_contents: F) -> MomResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> MomResult<()>,
{
    let mut writer = BufWriter::new(File::create(path)?);
    write_contents(&mut writer)?;
    writer.flush()?;
    Ok(())
}
