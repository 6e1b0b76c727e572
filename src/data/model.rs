//! Data Dictionary Module
//! Typed row records and categorical dictionaries for the two input tables.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Cell contents treated as missing regardless of column type.
pub const NULL_SENTINELS: [&str; 7] = ["", "na", "n/a", "null", "none", "-", "."];

/// True when a trimmed cell is one of the recognised null markers.
pub fn is_null_token(cell: &str) -> bool {
    let lowered = cell.trim().to_lowercase();
    NULL_SENTINELS.contains(&lowered.as_str())
}

/// Date formats accepted on input, tried in order. Output is always ISO-8601.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y", "%Y/%m/%d"];

/// Parse a date cell against the accepted formats.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let trimmed = cell.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Raised when a categorical cell is not part of the column's dictionary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("value {value:?} is not in the dictionary")]
pub struct UnmappedCategory {
    pub value: String,
}

impl UnmappedCategory {
    fn new(raw: &str) -> Self {
        Self {
            value: raw.trim().to_string(),
        }
    }
}

/// Customer entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Entity {
    Individual,
    Business,
}

impl Entity {
    /// Map a raw cell onto the dictionary. Matching is case-insensitive
    /// and tolerant of surrounding whitespace.
    pub fn from_raw(raw: &str) -> Result<Self, UnmappedCategory> {
        match raw.trim().to_lowercase().as_str() {
            "individual" => Ok(Entity::Individual),
            "business" | "firm" | "company" => Ok(Entity::Business),
            _ => Err(UnmappedCategory::new(raw)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Entity::Individual => "Individual",
            Entity::Business => "Business",
        }
    }
}

/// Customer sex, recorded only for individuals in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    pub fn from_raw(raw: &str) -> Result<Self, UnmappedCategory> {
        match raw.trim().to_lowercase().as_str() {
            "f" | "female" => Ok(Sex::Female),
            "m" | "male" => Ok(Sex::Male),
            _ => Err(UnmappedCategory::new(raw)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sex::Female => "Female",
            Sex::Male => "Male",
        }
    }
}

/// Yes/no flags such as the mortgage column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    pub fn from_raw(raw: &str) -> Result<Self, UnmappedCategory> {
        match raw.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(YesNo::Yes),
            "no" | "n" | "false" | "0" => Ok(YesNo::No),
            _ => Err(UnmappedCategory::new(raw)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        }
    }

    pub fn as_bool(self) -> bool {
        matches!(self, YesNo::Yes)
    }
}

/// One cleaned row of the properties table.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRecord {
    pub id: Option<String>,
    pub building: Option<i64>,
    pub property_number: Option<String>,
    pub area: Option<f64>,
    pub price: Option<f64>,
    pub sold: Option<bool>,
    pub country: Option<String>,
    /// Only retained when the country is the USA.
    pub state: Option<String>,
    pub deal_satisfaction: Option<f64>,
}

/// One cleaned row of the customers table.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub customer_id: Option<String>,
    pub entity: Option<Entity>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub sex: Option<Sex>,
    pub birth_date: Option<NaiveDate>,
    pub purpose: Option<String>,
    pub source: Option<String>,
    pub mortgage: Option<YesNo>,
    pub date_of_sale: Option<NaiveDate>,
}
