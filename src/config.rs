use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::boundary::classify::AssignmentPolicy;
use crate::boundary::render::OutputFormat;
use crate::data::osm::{ElementType, OsmId};
use crate::errors::{Error, Result};

/// A requested element, written as `relation/62149`, `way 4` or `r62149`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct ElementRef {
    pub element_type: ElementType,
    pub element_id: OsmId,
}

impl FromStr for ElementRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let re = Regex::new(r"^(?<type>node|way|relation|n|w|r)[/ ]?(?<id>-?\d+)$")
            .map_err(|err| err.to_string())?;
        let captures = re
            .captures(s.trim())
            .ok_or_else(|| format!("Cannot parse element reference {:?}", s))?;
        Ok(ElementRef {
            element_type: captures["type"].parse()?,
            element_id: captures["id"].parse()?,
        })
    }
}

impl TryFrom<String> for ElementRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.element_type, self.element_id)
    }
}

/// What to do with the remaining elements once one fails.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Skip,
    Abort,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Kml]
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    pub data_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    pub folder_name: String,
    pub elements: Vec<ElementRef>,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub inner_ring_policy: AssignmentPolicy,
}

pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {}", path.display(), err))?;
    Ok(serde_json::from_reader(file)?)
}
