use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RewriteError;
use crate::io;

/// Subset of the MATSim vehicle definitions document. Only the vehicle
/// registry entries matter here; vehicle type bodies are skipped.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(rename = "vehicleDefinitions")]
pub struct IOVehicleDefinitions {
    #[serde(rename = "vehicleType", default)]
    pub veh_types: Vec<IOVehicleType>,
    #[serde(rename = "vehicle", default)]
    pub vehicles: Vec<IOVehicle>,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct IOVehicleType {
    #[serde(rename = "@id")]
    pub id: String,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct IOVehicle {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub vehicle_type: String,
}

impl IOVehicleDefinitions {
    pub fn from_file(path: &Path) -> Result<IOVehicleDefinitions, RewriteError> {
        let defs: IOVehicleDefinitions = io::read_from_file(path)?;
        info!(
            "IOVehicleDefinitions: Finished reading vehicles. Registry contains {} vehicles and {} types",
            defs.vehicles.len(),
            defs.veh_types.len()
        );
        Ok(defs)
    }

    /// All vehicle instance ids belonging to a category. A vehicle qualifies
    /// when its type matches the category exactly or its id carries the
    /// `_<category>` suffix. Plain substring matching would also hit
    /// unrelated categories ("car" inside "microcar").
    pub fn instances_of(&self, category: &str) -> Vec<String> {
        let suffix = format!("_{category}");
        self.vehicles
            .iter()
            .filter(|v| v.vehicle_type == category || v.id.ends_with(&suffix))
            .map(|v| v.id.clone())
            .collect()
    }
}
