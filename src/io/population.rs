use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::RewriteError;
use crate::io;
use crate::io::attributes::{IOAttr, IOAttrs};

/// Person attribute holding the category -> vehicle instance mapping,
/// e.g. `{"car":"p42_car"}`.
pub const VEHICLES_ATTR: &str = "vehicles";
pub const VEHICLES_CLASS: &str = "org.matsim.vehicles.PersonVehicles";

/// Person attribute annotating categories with concrete vehicle types,
/// e.g. `{"car":"golf1.4"}`. Used to flag special fleet vehicles.
pub const VEHICLE_TYPES_ATTR: &str = "vehicleTypes";
pub const VEHICLE_TYPES_CLASS: &str = "org.matsim.vehicles.PersonVehicleTypes";

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IORoute {
    #[serde(rename = "@type")]
    pub r#type: String,
    #[serde(rename = "@start_link")]
    pub start_link: String,
    #[serde(rename = "@end_link")]
    pub end_link: String,
    #[serde(rename = "@trav_time", skip_serializing_if = "Option::is_none")]
    pub trav_time: Option<String>,
    #[serde(rename = "@distance")]
    pub distance: f64,
    #[serde(rename = "@vehicleRefId", skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<String>,

    // link ids for "links" routes, a json blob for pt routes
    #[serde(rename = "$value", skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IOActivity {
    #[serde(rename = "@type")]
    pub r#type: String,
    #[serde(rename = "@link", skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "@x", skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(rename = "@y", skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(rename = "@start_time", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "@end_time", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(rename = "@max_dur", skip_serializing_if = "Option::is_none")]
    pub max_dur: Option<String>,
}

impl IOActivity {
    pub fn is_interaction(&self) -> bool {
        self.r#type.contains("interaction")
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IOLeg {
    #[serde(rename = "@mode")]
    pub mode: String,
    #[serde(rename = "@dep_time", skip_serializing_if = "Option::is_none")]
    pub dep_time: Option<String>,
    #[serde(rename = "@trav_time", skip_serializing_if = "Option::is_none")]
    pub trav_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<IOAttrs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<IORoute>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum IOPlanElement {
    Activity(IOActivity),
    Leg(IOLeg),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IOPlan {
    #[serde(rename = "@score", skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(
        rename = "@selected",
        deserialize_with = "bool_from_yes_no",
        serialize_with = "bool_to_yes_no"
    )]
    pub selected: bool,
    // https://users.rust-lang.org/t/serde-deserializing-a-vector-of-enums/51647/2
    #[serde(rename = "$value", default)]
    pub elements: Vec<IOPlanElement>,
}

fn bool_from_yes_no<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    match s.to_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err(serde::de::Error::custom(format!("invalid value: {}", s))),
    }
}

fn bool_to_yes_no<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(if *value { "yes" } else { "no" })
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IOPerson {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "attributes", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<IOAttrs>,
    #[serde(rename = "plan", default)]
    pub plans: Vec<IOPlan>,
}

impl IOPerson {
    pub fn selected_plan(&self) -> Option<&IOPlan> {
        self.plans.iter().find(|p| p.selected)
    }

    /// The category -> vehicle instance mapping from the `vehicles`
    /// attribute, or `None` if the person carries no such attribute.
    pub fn vehicle_mapping(&self) -> Result<Option<Map<String, Value>>, RewriteError> {
        self.json_attr(VEHICLES_ATTR)
    }

    pub fn set_vehicle_mapping(&mut self, mapping: &Map<String, Value>) -> Result<(), RewriteError> {
        self.set_json_attr(VEHICLES_ATTR, VEHICLES_CLASS, mapping)
    }

    /// The category -> vehicle type annotations from the `vehicleTypes`
    /// attribute, or `None` if absent.
    pub fn vehicle_types(&self) -> Result<Option<Map<String, Value>>, RewriteError> {
        self.json_attr(VEHICLE_TYPES_ATTR)
    }

    pub fn set_vehicle_types(&mut self, types: &Map<String, Value>) -> Result<(), RewriteError> {
        self.set_json_attr(VEHICLE_TYPES_ATTR, VEHICLE_TYPES_CLASS, types)
    }

    fn json_attr(&self, name: &str) -> Result<Option<Map<String, Value>>, RewriteError> {
        let Some(attrs) = self.attributes.as_ref() else {
            return Ok(None);
        };
        let Some(raw) = attrs.find(name) else {
            return Ok(None);
        };

        match serde_json::from_str(raw)? {
            Value::Object(map) => Ok(Some(map)),
            other => Err(RewriteError::Parse(format!(
                "person {}: attribute '{name}' is not a json object but {other}",
                self.id
            ))),
        }
    }

    fn set_json_attr(
        &mut self,
        name: &str,
        class: &str,
        map: &Map<String, Value>,
    ) -> Result<(), RewriteError> {
        let value = serde_json::to_string(map)?;
        let attrs = self.attributes.get_or_insert_with(IOAttrs::default);
        if let Some(attr) = attrs.find_mut(name) {
            attr.value = value;
        } else {
            attrs.attributes.push(IOAttr::new(name, class, value));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename = "population")]
pub struct IOPopulation {
    #[serde(rename = "attributes", skip_serializing_if = "Option::is_none")]
    pub attributes: Option<IOAttrs>,
    #[serde(rename = "person", default)]
    pub persons: Vec<IOPerson>,
}

impl IOPopulation {
    pub fn from_file(path: &std::path::Path) -> Result<IOPopulation, RewriteError> {
        let population: IOPopulation = io::read_from_file(path)?;
        info!(
            "IOPopulation: Finished reading population. Population contains {} persons",
            population.persons.len()
        );
        Ok(population)
    }
}
