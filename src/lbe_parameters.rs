use serde_derive::Deserialize;

use crate::land_mask::Topology;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LbeParameters {
    /// Halo width in the i direction (in cells)
    pub halo_i: usize,

    /// Halo width in the j direction (in cells)
    pub halo_j: usize,

    // Is the domain reentrant in the x direction?
    pub reentrant_x: bool,

    // Is the domain reentrant in the y direction?
    pub reentrant_y: bool,

    /// Is the domain tripolar (folded along its northern edge)?
    pub tripolar_n: bool,

    /// Skip candidate layouts whose tiles are too far from square?
    pub prune_extreme_layouts: bool,

    /// Aspect ratio limit (>1) for a layout to be considered when pruning;
    /// zero or less checks every candidate layout
    pub aspect_ratio_limit: f64,

    /// File name of the generated mask table
    pub mask_table_name: String,
}

impl Default for LbeParameters {
    fn default() -> Self {
        LbeParameters {
            halo_i: 2,
            halo_j: 2,
            reentrant_x: false,
            reentrant_y: false,
            tripolar_n: false,
            prune_extreme_layouts: true,
            aspect_ratio_limit: 4.0,
            mask_table_name: "MOM_auto_mask_table".to_owned(),
        }
    }
}

impl LbeParameters {
    /// Loads the parameters from an optional config file, overridden by
    /// `MOM_LBE_*` environment variables.
    pub fn new(config_fname: &str) -> Result<Self, config::ConfigError> {
        let mut settings = config::Config::default();

        settings
            .merge(config::File::with_name(config_fname).required(false))?
            .merge(config::Environment::with_prefix("MOM_LBE"))?;

        settings.try_into()
    }

    /// The tile aspect ratio limit in force, if candidate layouts are pruned.
    pub fn aspect_limit(&self) -> Option<f64> {
        if self.prune_extreme_layouts && self.aspect_ratio_limit > 0.0 {
            Some(self.aspect_ratio_limit)
        } else {
            None
        }
    }

    pub fn topology(&self) -> Topology {
        Topology {
            reentrant_x: self.reentrant_x,
            reentrant_y: self.reentrant_y,
            tripolar_n: self.tripolar_n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pruning_can_be_switched_off() {
        assert_eq!(LbeParameters::default().aspect_limit(), Some(4.0));

        let off = LbeParameters {
            prune_extreme_layouts: false,
            ..LbeParameters::default()
        };
        assert_eq!(off.aspect_limit(), None);

        let unlimited = LbeParameters {
            aspect_ratio_limit: 0.0,
            ..LbeParameters::default()
        };
        assert_eq!(unlimited.aspect_limit(), None);
    }
}
