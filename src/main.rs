//! Generates the MOM6 runtime input files of a CESM case.
//!
//! Usage: `mom-interface <COMMAND> [OPTIONS]`, see `--help`.

use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mom_interface_lib::case::CaseVars;
use mom_interface_lib::error::MomResult;
use mom_interface_lib::lbe_parameters::LbeParameters;
use mom_interface_lib::rps::RuntimeParams;

#[derive(Parser, Debug)]
#[command(name = "mom-interface")]
#[command(about = "Generate MOM6 runtime input files for a case")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a parameter template into MOM_input
    MomInput {
        /// JSON or YAML parameter template
        #[arg(long)]
        template: PathBuf,

        /// Documents merged over the template, in order
        #[arg(long = "overlay")]
        overlays: Vec<PathBuf>,

        #[command(flatten)]
        case: CaseArgs,

        #[arg(long, default_value = "MOM_input")]
        output: PathBuf,
    },

    /// Turn user_nl_mom into MOM_override
    MomOverride {
        #[arg(long = "user-nl", default_value = "user_nl_mom")]
        user_nl: PathBuf,

        /// Generated MOM_input holding the default values
        #[arg(long = "mom-input", default_value = "MOM_input")]
        mom_input: PathBuf,

        #[arg(long, default_value = "MOM_override")]
        output: PathBuf,
    },

    /// Resolve a namelist template into input.nml
    InputNml {
        #[arg(long)]
        template: PathBuf,

        #[command(flatten)]
        case: CaseArgs,

        #[arg(long, default_value = "input.nml")]
        output: PathBuf,
    },

    /// Resolve the list of input data files of the case
    InputDataList {
        #[arg(long)]
        template: PathBuf,

        /// MOM_input parameter template, consulted for variables the case
        /// does not define
        #[arg(long = "mom-input-template")]
        mom_input_template: PathBuf,

        #[arg(long = "overlay")]
        overlays: Vec<PathBuf>,

        #[command(flatten)]
        case: CaseArgs,

        #[arg(long, default_value = "ocn.input_data_list")]
        output: PathBuf,
    },

    /// Resolve a diagnostics template into diag_table, leaving the case name
    /// as a placeholder
    DiagTable {
        #[arg(long)]
        template: PathBuf,

        /// MOM_input parameter template, consulted for variables the case
        /// does not define
        #[arg(long = "mom-input-template")]
        mom_input_template: PathBuf,

        #[arg(long = "overlay")]
        overlays: Vec<PathBuf>,

        #[command(flatten)]
        case: CaseArgs,

        #[arg(long, default_value = "diag_table.unresolved")]
        output: PathBuf,
    },

    /// Fill the case name into a generated diag_table
    ResolveDiagTable {
        #[arg(long, default_value = "diag_table.unresolved")]
        input: PathBuf,

        #[arg(long)]
        casename: String,

        #[arg(long, default_value = "diag_table")]
        output: PathBuf,
    },

    /// Compute the land-block-elimination mask table
    MaskTable {
        /// Text grid of the ocean mask, southernmost row first
        #[arg(long)]
        topography: PathBuf,

        /// Number of active processors wanted
        #[arg(long)]
        npes: usize,

        /// Settings file (extension optional), overridden by MOM_LBE_* variables
        #[arg(long, default_value = "Config")]
        config: String,

        #[arg(long = "output-dir", default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CaseArgs {
    /// JSON object of case variables
    #[arg(long = "case-file")]
    case_file: Option<PathBuf>,

    /// Case variable assignment NAME=VALUE, applied after --case-file
    #[arg(long = "set", value_name = "NAME=VALUE")]
    assignments: Vec<String>,
}

impl CaseArgs {
    fn case_vars(&self) -> MomResult<CaseVars> {
        let mut case = match &self.case_file {
            Some(path) => CaseVars::from_json_file(path)?,
            None => CaseVars::new(),
        };
        for assignment in &self.assignments {
            let (name, value) = CaseVars::parse_assignment(assignment)?;
            case.set(&name, value);
        }
        Ok(case)
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn reduced_mom_params(
    template: &Path,
    overlays: &[PathBuf],
    case: &CaseVars,
) -> MomResult<RuntimeParams> {
    let mut mom_params = mom_interface_lib::load_params(template, overlays, None)?;
    mom_params.reduce(case)?;
    Ok(mom_params)
}

fn run(command: Command) -> MomResult<()> {
    match command {
        Command::MomInput {
            template,
            overlays,
            case,
            output,
        } => {
            let case = case.case_vars()?;
            mom_interface_lib::generate_mom_input(&template, &overlays, &case, &output)?;
        }
        Command::MomOverride {
            user_nl,
            mom_input,
            output,
        } => {
            mom_interface_lib::generate_mom_override(&user_nl, &mom_input, &output)?;
        }
        Command::InputNml {
            template,
            case,
            output,
        } => {
            let case = case.case_vars()?;
            mom_interface_lib::generate_input_nml(&template, &case, &output)?;
        }
        Command::InputDataList {
            template,
            mom_input_template,
            overlays,
            case,
            output,
        } => {
            let case = case.case_vars()?;
            let mom_params = reduced_mom_params(&mom_input_template, &overlays, &case)?;
            mom_interface_lib::generate_input_data_list(&template, &case, &mom_params, &output)?;
        }
        Command::DiagTable {
            template,
            mom_input_template,
            overlays,
            case,
            output,
        } => {
            let case = case.case_vars()?;
            let mom_params = reduced_mom_params(&mom_input_template, &overlays, &case)?;
            mom_interface_lib::generate_diag_table(&template, &case, &mom_params, &output)?;
        }
        Command::ResolveDiagTable {
            input,
            casename,
            output,
        } => {
            mom_interface_lib::resolve_diag_table(&input, &output, &casename)?;
        }
        Command::MaskTable {
            topography,
            npes,
            config,
            output_dir,
        } => {
            let lbe_params = LbeParameters::new(&config)?;
            info!(?lbe_params, "land block elimination settings");
            let (table, path) =
                mom_interface_lib::auto_mask_table(&topography, npes, &lbe_params, &output_dir)?;
            info!(
                idiv = table.layout.idiv,
                jdiv = table.layout.jdiv,
                masked = table.masked_blocks.len(),
                path = %path.display(),
                "mask table ready"
            );
        }
    }
    Ok(())
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    if let Err(err) = run(cli.command) {
        error!("{}", err);
        process::exit(1);
    }
}
