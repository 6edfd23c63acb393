//! # Constraint tables
//!
//! Valid ranges, enumerations, and lookup tables for two-lane highway inputs.
//!
//! The engine validates every descriptor against [`CONSTRAINTS`],
//! and [`constraints_json`] exports the very same document for external validators,
//! so the two can't drift apart.
//!
//! ```
//! use twolane_hcm::constraints::CONSTRAINTS;
//!
//! let lane_width = &CONSTRAINTS.two_lane_highways.lane_width;
//! assert!(lane_width.contains(11.0));
//! assert!(!lane_width.contains(8.0));
//! ```

use crate::error::ValidationError;
use crate::los::{LosCategory, LosThresholds};
use crate::model::{PassingType, VerticalClass};
use crate::tables::{
    BASE_FREE_FLOW_SPEED, HEAVY_VEHICLE_EQUIVALENTS, MINIMUM_CURVE_RADIUS, SEGMENT_LENGTH_LIMITS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// A closed (or half-open, when `exclusive_min` is set) numeric range.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RangeConstraint {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub unit: Option<String>,
    /// When set, `min` itself is not a valid value.
    pub exclusive_min: Option<bool>,
}

impl RangeConstraint {
    fn new(name: &str, min: f64, max: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            min,
            max,
            unit: Some(unit.to_string()),
            exclusive_min: None,
        }
    }

    fn unitless(name: &str, min: f64, max: f64) -> Self {
        Self {
            unit: None,
            ..Self::new(name, min, max, "")
        }
    }

    #[must_use]
    fn excluding_min(mut self) -> Self {
        self.exclusive_min = Some(true);
        self
    }

    pub fn contains(&self, value: f64) -> bool {
        let above_min = if self.exclusive_min.unwrap_or_default() {
            value > self.min
        } else {
            value >= self.min
        };
        value.is_finite() && above_min && value <= self.max
    }

    /// Passes a valid value through.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for the constrained field when the value is out of range.
    pub fn check(&self, value: f64) -> Result<f64, ValidationError> {
        if self.contains(value) {
            Ok(value)
        } else {
            let open = if self.exclusive_min.unwrap_or_default() {
                '('
            } else {
                '['
            };
            Err(ValidationError::new(
                &self.name,
                format!("{value} is not within {open}{}, {}]", self.min, self.max),
            ))
        }
    }
}

/// A set of valid codes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EnumConstraint {
    pub name: String,
    pub values: Vec<u8>,
}

impl EnumConstraint {
    pub fn contains(&self, value: u8) -> bool {
        self.values.contains(&value)
    }

    /// # Errors
    ///
    /// Returns a [`ValidationError`] for the constrained field when the code is unknown.
    pub fn check(&self, value: u8) -> Result<u8, ValidationError> {
        if self.contains(value) {
            Ok(value)
        } else {
            Err(ValidationError::new(
                &self.name,
                format!("{value} is not one of {:?}", self.values),
            ))
        }
    }
}

/// A (possibly nested) value in a [`TableConstraint`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TableEntry {
    Value(f64),
    Nested(BTreeMap<String, TableEntry>),
}

impl TableEntry {
    fn nested<K: ToString>(entries: impl IntoIterator<Item = (K, TableEntry)>) -> Self {
        Self::Nested(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

/// A lookup table, keyed by break point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: String,
    pub table: BTreeMap<String, TableEntry>,
}

impl TableConstraint {
    fn new(name: &str, entry: TableEntry) -> Self {
        let table = match entry {
            TableEntry::Nested(table) => table,
            TableEntry::Value(value) => {
                BTreeMap::from([(String::from("value"), TableEntry::Value(value))])
            }
        };
        Self {
            name: name.to_string(),
            table,
        }
    }

    /// Looks up a value by its path of keys.
    pub fn get(&self, path: &[&str]) -> Option<f64> {
        let (first, rest) = path.split_first()?;
        let mut entry = self.table.get(*first)?;
        for key in rest {
            match entry {
                TableEntry::Nested(map) => entry = map.get(*key)?,
                TableEntry::Value(_) => return None,
            }
        }
        match entry {
            TableEntry::Value(value) => Some(*value),
            TableEntry::Nested(_) => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TwoLaneHighwayConstraints {
    // Facility
    pub lane_width: RangeConstraint,
    pub shoulder_width: RangeConstraint,
    pub access_point_density: RangeConstraint,
    pub faster_lane_heavy_vehicle_share: RangeConstraint,
    pub downstream_effective_length: RangeConstraint,
    // Segment
    pub passing_type: EnumConstraint,
    pub segment_length: RangeConstraint,
    pub grade: RangeConstraint,
    pub speed_limit: RangeConstraint,
    pub volume: RangeConstraint,
    pub peak_hour_factor: RangeConstraint,
    pub percent_heavy_vehicles: RangeConstraint,
    // Subsegment
    pub horizontal_class: EnumConstraint,
    pub design_radius: RangeConstraint,
    pub superelevation: RangeConstraint,
    pub central_angle: RangeConstraint,
    pub measured_speed: RangeConstraint,
    // Precomputed values
    pub vertical_class: EnumConstraint,
    pub flow_rate: RangeConstraint,
    pub capacity: RangeConstraint,
    pub free_flow_speed: RangeConstraint,
    pub average_speed: RangeConstraint,
    pub percent_followers: RangeConstraint,
    // Tables
    pub segment_length_limits: TableConstraint,
    pub minimum_curve_radius: TableConstraint,
    pub base_free_flow_speed: TableConstraint,
    pub heavy_vehicle_equivalents: TableConstraint,
    pub los_thresholds: TableConstraint,
}

/// The versioned constraint document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConstraintDocument {
    pub version: String,
    pub two_lane_highways: TwoLaneHighwayConstraints,
}

fn segment_length_limits() -> TableEntry {
    let passing_types = [
        (PassingType::PassingConstrained, "passing_constrained"),
        (PassingType::PassingZone, "passing_zone"),
        (PassingType::PassingLane, "passing_lane"),
    ];
    TableEntry::nested(passing_types.map(|(passing_type, key)| {
        let by_class = VerticalClass::ALL.map(|class| {
            let (min, max) = SEGMENT_LENGTH_LIMITS[class.index()][passing_type.index()];
            (
                class.number(),
                TableEntry::nested([("min", TableEntry::Value(min)), ("max", TableEntry::Value(max))]),
            )
        });
        (key, TableEntry::nested(by_class))
    }))
}

fn breakpoint_table(points: &[(f64, f64)]) -> TableEntry {
    TableEntry::nested(points.iter().map(|&(x, y)| (x, TableEntry::Value(y))))
}

fn los_thresholds() -> TableEntry {
    TableEntry::nested(LosCategory::ALL.map(|category| {
        let LosThresholds {
            high_speed,
            low_speed,
            speed_override,
        } = category.thresholds();
        let grades = |limits: [f64; 4]| {
            TableEntry::nested(
                ["A", "B", "C", "D"]
                    .into_iter()
                    .zip(limits.map(TableEntry::Value)),
            )
        };
        let mut entries = vec![
            ("high_speed", grades(high_speed)),
            ("low_speed", grades(low_speed)),
        ];
        if let Some(rule) = speed_override {
            entries.push((
                "speed_override",
                TableEntry::nested([
                    ("max_flow_rate", TableEntry::Value(rule.max_flow_rate)),
                    ("min_speed_ratio", TableEntry::Value(rule.min_speed_ratio)),
                ]),
            ));
        }
        (category.key(), TableEntry::nested(entries))
    }))
}

pub static CONSTRAINTS: LazyLock<ConstraintDocument> = LazyLock::new(|| ConstraintDocument {
    version: env!("CARGO_PKG_VERSION").to_string(),
    two_lane_highways: TwoLaneHighwayConstraints {
        lane_width: RangeConstraint::new("lane_width", 9.0, 12.0, "ft"),
        shoulder_width: RangeConstraint::new("shoulder_width", 0.0, 8.0, "ft"),
        access_point_density: RangeConstraint::new("access_point_density", 0.0, 30.0, "pts/mi"),
        faster_lane_heavy_vehicle_share: RangeConstraint::unitless(
            "faster_lane_heavy_vehicle_share",
            0.0,
            1.0,
        ),
        downstream_effective_length: RangeConstraint::new(
            "downstream_effective_length",
            0.0,
            50.0,
            "mi",
        )
        .excluding_min(),
        passing_type: EnumConstraint {
            name: "passing_type".to_string(),
            values: vec![0, 1, 2],
        },
        segment_length: RangeConstraint::new("length", 0.0, 20.0, "mi").excluding_min(),
        grade: RangeConstraint::new("grade", -10.0, 10.0, "%"),
        speed_limit: RangeConstraint::new("speed_limit", 15.0, 80.0, "mph"),
        volume: RangeConstraint::new("volume", 0.0, 3000.0, "veh/h"),
        peak_hour_factor: RangeConstraint::unitless("peak_hour_factor", 0.0, 1.0).excluding_min(),
        percent_heavy_vehicles: RangeConstraint::new("percent_heavy_vehicles", 0.0, 100.0, "%"),
        horizontal_class: EnumConstraint {
            name: "horizontal_class".to_string(),
            values: vec![0, 1, 2, 3, 4, 5],
        },
        design_radius: RangeConstraint::new("design_radius", 0.0, 20_000.0, "ft").excluding_min(),
        superelevation: RangeConstraint::unitless("superelevation", 0.0, 0.12),
        central_angle: RangeConstraint::new("central_angle", 0.0, 180.0, "deg").excluding_min(),
        measured_speed: RangeConstraint::new("average_speed", 0.0, 100.0, "mph").excluding_min(),
        vertical_class: EnumConstraint {
            name: "vertical_class".to_string(),
            values: VerticalClass::ALL.map(VerticalClass::number).to_vec(),
        },
        flow_rate: RangeConstraint::new("flow_rate", 0.0, 5000.0, "veh/h"),
        capacity: RangeConstraint::new("capacity", 0.0, 2000.0, "veh/h").excluding_min(),
        free_flow_speed: RangeConstraint::new("free_flow_speed", 0.0, 100.0, "mph")
            .excluding_min(),
        average_speed: RangeConstraint::new("average_speed", 0.0, 100.0, "mph"),
        percent_followers: RangeConstraint::new("percent_followers", 0.0, 100.0, "%"),
        segment_length_limits: TableConstraint::new(
            "segment_length_limits",
            segment_length_limits(),
        ),
        minimum_curve_radius: TableConstraint::new(
            "minimum_curve_radius",
            breakpoint_table(MINIMUM_CURVE_RADIUS.points()),
        ),
        base_free_flow_speed: TableConstraint::new(
            "base_free_flow_speed",
            breakpoint_table(BASE_FREE_FLOW_SPEED.points()),
        ),
        heavy_vehicle_equivalents: TableConstraint::new(
            "heavy_vehicle_equivalents",
            TableEntry::nested(VerticalClass::ALL.map(|class| {
                (
                    class.number(),
                    TableEntry::Value(HEAVY_VEHICLE_EQUIVALENTS[class.index()]),
                )
            })),
        ),
        los_thresholds: TableConstraint::new("los_thresholds", los_thresholds()),
    },
});

/// The constraint document as pretty-printed JSON.
///
/// # Panics
///
/// Never in practice: every map in the document is keyed by strings.
pub fn constraints_json() -> String {
    serde_json::to_string_pretty(&*CONSTRAINTS)
        .expect("Programming error: the constraint document only contains string-keyed maps.")
}
