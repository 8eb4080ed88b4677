use std::env;

use tempfile::TempDir;

use mom_interface_lib::lbe_parameters::LbeParameters;

// Runs in its own test binary so the variables cannot leak into other tests.
#[test]
fn environment_overrides_the_settings_file() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("lbe.toml");
    std::fs::write(&config, "halo_i = 1\naspect_ratio_limit = 8.0\n").unwrap();

    env::set_var("MOM_LBE_PRUNE_EXTREME_LAYOUTS", "false");
    env::set_var("MOM_LBE_ASPECT_RATIO_LIMIT", "2.5");
    let params = LbeParameters::new(&config.display().to_string()).unwrap();
    env::remove_var("MOM_LBE_PRUNE_EXTREME_LAYOUTS");
    env::remove_var("MOM_LBE_ASPECT_RATIO_LIMIT");

    assert_eq!(params.halo_i, 1);
    assert!(!params.prune_extreme_layouts);
    assert_eq!(params.aspect_ratio_limit, 2.5);
    assert_eq!(params.aspect_limit(), None);
}
