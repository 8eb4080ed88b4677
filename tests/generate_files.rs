use std::fs;
use std::path::Path;

use tempfile::TempDir;

use mom_interface_lib::case::CaseVars;
use mom_interface_lib::error::MomError;
use mom_interface_lib::lbe_parameters::LbeParameters;
use mom_interface_lib::mom_input::{MOM_INPUT_HEADER, MOM_OVERRIDE_HEADER};
use mom_interface_lib::value::Value;
use mom_interface_lib::{
    auto_mask_table, generate_diag_table, generate_input_data_list, generate_input_nml,
    generate_mom_input, generate_mom_override, resolve_diag_table,
};

const MOM_INPUT_TEMPLATE: &str = r#"{
    "Global": {
        "INPUTDIR": {
            "value": "${DIN_LOC_ROOT}/ocn/mom/${OCN_GRID}",
            "description": "The directory in which input files are found."
        },
        "DT": {
            "value": {
                "$OCN_GRID == \"tx0.66v1\"": 1800.0,
                "$OCN_GRID == \"tx0.25v1\"": 900.0,
                "else": 3600.0
            },
            "description": "The (baroclinic) dynamics time step."
        },
        "DT_THERM": {
            "value": "= 2 * 1800.0",
            "description": "The thermodynamic time step."
        },
        "DEBUG": {
            "value": {"$NTASKS_OCN < 64": true},
            "description": "Only set on small layouts."
        }
    },
    "KPP": {
        "N_SMOOTH": {
            "value": {"$OCN_GRID != \"gx1v6\"": 2, "else": 0},
            "description": "Smoothing passes."
        }
    }
}"#;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn case() -> CaseVars {
    vec![
        ("OCN_GRID", Value::from("tx0.66v1")),
        ("DIN_LOC_ROOT", Value::from("/glade/inputdata")),
        ("NTASKS_OCN", Value::Int(128)),
    ]
    .into_iter()
    .collect()
}

#[test]
fn mom_input_is_resolved_for_the_case() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let output = dir.path().join("MOM_input");

    let params = generate_mom_input(&template, &[], &case(), &output).unwrap();
    assert_eq!(params.global_value("DT"), Some(&Value::Float(1800.0)));
    assert_eq!(params.global_value("DEBUG"), Some(&Value::Null));

    let text = fs::read_to_string(&output).unwrap();
    let tab = " ".repeat(32);
    let expected = format!(
        "{header}\
         INPUTDIR = /glade/inputdata/ocn/mom/tx0.66v1\n\
         {tab}! The directory in which input files are found.\n\n\
         DT = 1800.0\n{tab}! The (baroclinic) dynamics time step.\n\n\
         DT_THERM = 3600.0\n{tab}! The thermodynamic time step.\n\n\
         KPP%\nN_SMOOTH = 2\n{tab}! Smoothing passes.\n\n%KPP\n",
        header = MOM_INPUT_HEADER,
        tab = tab
    );
    assert_eq!(text, expected);
}

#[test]
fn overlays_take_precedence_over_the_template() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let overlay = write(
        dir.path(),
        "overlay.yaml",
        "Global:\n  DT:\n    value: 600.0\nKPP:\n  N_SMOOTH:\n    value: 4\n",
    );
    let output = dir.path().join("MOM_input");

    let params = generate_mom_input(&template, &[overlay], &case(), &output).unwrap();
    assert_eq!(params.global_value("DT"), Some(&Value::Float(600.0)));
    // descriptions survive the merge
    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("DT = 600.0\n"));
    assert!(text.contains("N_SMOOTH = 4\n"));
    assert!(text.contains("! The (baroclinic) dynamics time step."));
}

#[test]
fn undefined_case_variable_is_reported() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let output = dir.path().join("MOM_input");

    let mut case = CaseVars::new();
    case.set("OCN_GRID", "tx0.66v1");
    match generate_mom_input(&template, &[], &case, &output) {
        Err(MomError::UndefinedCaseVariable(name)) => assert_eq!(name, "DIN_LOC_ROOT"),
        other => panic!("expected an undefined variable, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn mom_override_compares_against_generated_mom_input() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let mom_input = dir.path().join("MOM_input");
    generate_mom_input(&template, &[], &case(), &mom_input).unwrap();

    let user_nl = write(
        dir.path(),
        "user_nl_mom",
        "! user changes\n\
         DT = 900.0\n\
         DT_THERM = 3600.0\n\
         KPP%\n\
         ENERGY_CONSERVING = False\n\
         %KPP\n",
    );
    let output = dir.path().join("MOM_override");
    generate_mom_override(&user_nl, &mom_input, &output).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert_eq!(
        text,
        format!(
            "{}#override DT = 900.0\n\
             !!! DT_THERM = 3600.0 !(UNCHANGED)\n\n\
             KPP%\nENERGY_CONSERVING = False\n%KPP\n\n",
            MOM_OVERRIDE_HEADER
        )
    );
}

#[test]
fn input_nml_is_resolved_for_the_case() {
    let dir = TempDir::new().unwrap();
    let template = write(
        dir.path(),
        "input_nml.yaml",
        "\
MOM_input_nml:
  parameter_filename:
    values: ['INPUT/MOM_input', 'INPUT/MOM_override']
fms_nml:
  domains_stack_size:
    values:
      $OCN_GRID == \"tx0.25v1\": 20000000
      else: 14000000
",
    );
    let output = dir.path().join("input.nml");

    generate_input_nml(&template, &case(), &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "&MOM_input_nml\n    parameter_filename = 'INPUT/MOM_input', 'INPUT/MOM_override'\n/\n\n\
         &fms_nml\n    domains_stack_size = 14000000\n/\n\n"
    );
}

#[test]
fn input_data_list_falls_back_to_mom_input_globals() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let mom_input = dir.path().join("MOM_input");
    let mom_params = generate_mom_input(&template, &[], &case(), &mom_input).unwrap();

    let data_template = write(
        dir.path(),
        "input_data_list.yaml",
        "\
mom.input_data_list:
  ocean_hgrid: $INPUTDIR/ocean_hgrid.nc
  tempsalt:
    $OCN_GRID == \"tx0.66v1\": \"'${INPUTDIR}/woa18_04_initial_conditions.nc'\"
  custom: INPUT/my_file.nc
",
    );
    let output = dir.path().join("ocn.input_data_list");

    generate_input_data_list(&data_template, &case(), &mom_params, &output).unwrap();
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "ocean_hgrid = /glade/inputdata/ocn/mom/tx0.66v1/ocean_hgrid.nc\n\
         tempsalt = /glade/inputdata/ocn/mom/tx0.66v1/woa18_04_initial_conditions.nc\n"
    );
}

const DIAG_TABLE_TEMPLATE: &str = r#"
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
  z:
    suffix: h.z
    output_freq:
      '$OCN_GRID == "tx0.66v1"': 5
      else: 1
    output_freq_units: days
    time_axis_units: days
    reduction_method: mean
    regional_section: none
    fields:
      module: ocean_model_z
      packing: 2
      lists:
        $DT < 3600.0: [[temp, salt]]
  spinup:
    suffix: h.spinup
    output_freq: 1
    output_freq_units: days
    time_axis_units: days
    reduction_method: mean
    regional_section: none
    fields:
      module: ocean_model
      packing: 1
      lists:
        $NTASKS_OCN < 64: [[thetao]]
"#;

#[test]
fn diag_table_is_resolved_for_the_case() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let mom_input = dir.path().join("MOM_input");
    let mom_params = generate_mom_input(&template, &[], &case(), &mom_input).unwrap();

    let diag_template = write(dir.path(), "diag_table.yaml", DIAG_TABLE_TEMPLATE);
    let unresolved = dir.path().join("diag_table.unresolved");
    generate_diag_table(&diag_template, &case(), &mom_params, &unresolved).unwrap();
    assert!(fs::read_to_string(&unresolved)
        .unwrap()
        .contains("# \"${CASE}.mom6.h.z\"\n"));

    let resolved = dir.path().join("diag_table");
    resolve_diag_table(&unresolved, &resolved, "b.test").unwrap();
    // DT comes from MOM_input, the spinup file lists nothing for 128 tasks
    assert_eq!(
        fs::read_to_string(&resolved).unwrap(),
        concat!(
            "\"MOM6 diagnostic fields table for CESM case: b.test\"\n",
            "1 1 1 0 0 0\n",
            "### Section-1: File List\n",
            "#========================\n",
            "\"b.test.mom6.h.native\",    1,  \"months\", 1, \"days\",   \"time\"\n",
            "\"b.test.mom6.h.z\",         5,  \"days\",   1, \"days\",   \"time\"\n",
            "\n",
            "### Section-2: Fields List\n",
            "#=========================\n",
            "# \"b.test.mom6.h.native\"\n",
            "\"ocean_model\", \"SSH\",    \"SSH\",    \"b.test.mom6.h.native\", ",
            "\"all\", \"mean\", \"none\", 1\n",
            "\"ocean_model\", \"tos\",    \"sst\",    \"b.test.mom6.h.native\", ",
            "\"all\", \"mean\", \"none\", 1\n",
            "\n",
            "# \"b.test.mom6.h.z\"\n",
            "\"ocean_model_z\", \"temp\",\"temp\",\"b.test.mom6.h.z\", ",
            "\"all\", \"mean\", \"none\", 2\n",
            "\"ocean_model_z\", \"salt\",\"salt\",\"b.test.mom6.h.z\", ",
            "\"all\", \"mean\", \"none\", 2\n",
            "\n",
        )
    );
}

#[test]
fn duplicate_diag_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let template = write(dir.path(), "MOM_input.json", MOM_INPUT_TEMPLATE);
    let mom_params =
        generate_mom_input(&template, &[], &case(), &dir.path().join("MOM_input")).unwrap();

    let diag_template = write(
        dir.path(),
        "diag_table.yaml",
        &DIAG_TABLE_TEMPLATE.replace("[temp, salt]", "[temp, \"salt:temp\"]"),
    );
    let output = dir.path().join("diag_table.unresolved");
    match generate_diag_table(&diag_template, &case(), &mom_params, &output) {
        Err(MomError::DuplicateDiagField { field, file }) => {
            assert_eq!(field, "temp");
            assert_eq!(file, "h.z");
        }
        other => panic!("expected a duplicate field, got {:?}", other),
    }
}

#[test]
fn mask_table_is_written_for_the_topography() {
    let dir = TempDir::new().unwrap();
    // western half land, eastern half ocean
    let row = format!("{} {}\n", vec!["0"; 16].join(" "), vec!["1"; 16].join(" "));
    let topography = write(dir.path(), "ocean_mask.txt", &row.repeat(32));

    let lbe_params = LbeParameters {
        halo_i: 0,
        halo_j: 0,
        ..LbeParameters::default()
    };
    let (table, path) = auto_mask_table(&topography, 4, &lbe_params, dir.path()).unwrap();

    assert_eq!(path, dir.path().join("MOM_auto_mask_table"));
    assert_eq!(table.num_active(), 4);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "4\n2,4\n1,1\n1,2\n1,3\n1,4\n"
    );
}

#[test]
fn lbe_parameters_are_read_from_a_config_file() {
    let dir = TempDir::new().unwrap();
    let config = write(
        dir.path(),
        "lbe.toml",
        "halo_i = 1\n\
         reentrant_x = true\n\
         prune_extreme_layouts = false\n\
         aspect_ratio_limit = 2.0\n\
         mask_table_name = \"mask_table.4\"\n",
    );

    let params = LbeParameters::new(&config.display().to_string()).unwrap();
    assert_eq!(params.halo_i, 1);
    assert_eq!(params.halo_j, 2);
    assert!(params.reentrant_x);
    assert!(!params.tripolar_n);
    assert!(!params.prune_extreme_layouts);
    assert_eq!(params.aspect_ratio_limit, 2.0);
    assert_eq!(params.aspect_limit(), None);
    assert_eq!(params.mask_table_name, "mask_table.4");
}

#[test]
fn missing_lbe_config_falls_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let absent = dir.path().join("absent");
    let params = LbeParameters::new(&absent.display().to_string()).unwrap();
    assert_eq!(params.halo_i, 2);
    assert!(params.prune_extreme_layouts);
    assert_eq!(params.aspect_limit(), Some(4.0));
    assert_eq!(params.mask_table_name, "MOM_auto_mask_table");
}
