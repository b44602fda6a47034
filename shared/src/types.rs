//! Common types used across the planning core

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a growing lot, owned by the cultivation-line subsystem
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LotId(pub String);

impl LotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LotId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Opaque identifier of a cost category
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CostCategoryId(pub String);

impl CostCategoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CostCategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CostCategoryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Generate a fresh record identifier
pub fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The four representations of a shellfish count
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuantityUnit {
    /// Individual specimens (base unit)
    #[default]
    #[serde(alias = "conchas")]
    Conchitas,
    /// Bundles of 96 conchitas
    Manojos,
    /// Mesh-bags of 3 manojos
    Mallas,
    /// Weight, through the configured conchitas-per-kg factor
    Kg,
}

impl QuantityUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantityUnit::Conchitas => "conchitas",
            QuantityUnit::Manojos => "manojos",
            QuantityUnit::Mallas => "mallas",
            QuantityUnit::Kg => "kg",
        }
    }
}

impl fmt::Display for QuantityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QuantityUnit {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conchitas" | "conchas" | "conchita" => Ok(QuantityUnit::Conchitas),
            "manojos" | "manojo" => Ok(QuantityUnit::Manojos),
            "mallas" | "malla" => Ok(QuantityUnit::Mallas),
            "kg" => Ok(QuantityUnit::Kg),
            _ => Err("Unknown quantity unit"),
        }
    }
}

/// Date range for queries (inclusive on both ends)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// A stored derived value that disagreed with its recomputation on load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDrift {
    pub field: String,
    pub stored: String,
    pub derived: String,
}

impl FieldDrift {
    pub fn new(field: impl Into<String>, stored: impl ToString, derived: impl ToString) -> Self {
        Self {
            field: field.into(),
            stored: stored.to_string(),
            derived: derived.to_string(),
        }
    }
}

/// A value decoded from a record, along with any repaired drift
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub value: T,
    pub drift: Vec<FieldDrift>,
}

impl<T> Loaded<T> {
    pub fn is_clean(&self) -> bool {
        self.drift.is_empty()
    }
}

/// Lenient deserialization of specimen counts.
///
/// Records written by older front-end screens sometimes carry counts as
/// floats or numeric strings; they are rounded to the nearest whole count.
pub mod count {
    use serde::de::{self, Deserializer};
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawCount {
        Int(u64),
        Float(f64),
        Text(String),
    }

    fn from_raw<E: de::Error>(raw: RawCount) -> Result<u64, E> {
        let value = match raw {
            RawCount::Int(n) => return Ok(n),
            RawCount::Float(f) => f,
            RawCount::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("invalid count: {:?}", s)))?,
        };
        if value.is_finite() && value >= 0.0 {
            Ok(value.round() as u64)
        } else {
            Err(E::custom(format!("count must be a non-negative number, got {}", value)))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        from_raw(RawCount::deserialize(deserializer)?)
    }

    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<RawCount>::deserialize(deserializer)? {
            Some(raw) => from_raw(raw).map(Some),
            None => Ok(None),
        }
    }
}
