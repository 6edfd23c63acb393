//! # Level of service
//!
//! Follower density is the primary measure.
//! Some categories add a speed rule for free-flowing, low-volume conditions,
//! which can only ever improve the density-based grade.

use crate::model::PassingType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Posted speed limit (mph) from which the high-speed thresholds apply.
pub const HIGH_SPEED_LIMIT: f64 = 50.0;

/// Level of service grade, from A (best) to F (demand exceeds capacity).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Los {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Los {
    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::D => 'D',
            Self::E => 'E',
            Self::F => 'F',
        }
    }
}

impl Display for Los {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedRegime {
    /// Posted speed limit of 50 mph or more.
    HighSpeed,
    LowSpeed,
}

impl SpeedRegime {
    pub fn from_speed_limit(speed_limit: f64) -> Self {
        if speed_limit >= HIGH_SPEED_LIMIT {
            Self::HighSpeed
        } else {
            Self::LowSpeed
        }
    }
}

/// The threshold table to classify against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LosCategory {
    PassingConstrained,
    PassingZone,
    PassingLane,
    /// Aggregated results of a whole facility.
    Facility,
}

/// Grants the better of the density grade and `grade` when traffic is free-flowing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedOverride {
    /// The rule only applies at or below this demand flow rate (veh/h).
    pub max_flow_rate: f64,
    /// Minimum ratio of average speed to free-flow speed.
    pub min_speed_ratio: f64,
    pub grade: Los,
}

/// Upper follower density limits (followers/mi/ln) of grades A through D.
///
/// Anything above D's limit is E.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LosThresholds {
    pub high_speed: [f64; 4],
    pub low_speed: [f64; 4],
    /// Only consulted in the high-speed regime.
    pub speed_override: Option<SpeedOverride>,
}

const HIGH_SPEED: [f64; 4] = [2.0, 4.0, 8.0, 12.0];
const LOW_SPEED: [f64; 4] = [2.5, 5.0, 10.0, 15.0];

const FREE_FLOW_OVERRIDE: SpeedOverride = SpeedOverride {
    max_flow_rate: 200.0,
    min_speed_ratio: 0.95,
    grade: Los::A,
};

impl LosCategory {
    pub const ALL: [Self; 4] = [
        Self::PassingConstrained,
        Self::PassingZone,
        Self::PassingLane,
        Self::Facility,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::PassingConstrained => "passing_constrained",
            Self::PassingZone => "passing_zone",
            Self::PassingLane => "passing_lane",
            Self::Facility => "facility",
        }
    }

    pub const fn thresholds(self) -> LosThresholds {
        match self {
            Self::PassingConstrained | Self::PassingZone | Self::Facility => LosThresholds {
                high_speed: HIGH_SPEED,
                low_speed: LOW_SPEED,
                speed_override: Some(FREE_FLOW_OVERRIDE),
            },
            // The added lane relieves platooning; density alone decides.
            Self::PassingLane => LosThresholds {
                high_speed: HIGH_SPEED,
                low_speed: LOW_SPEED,
                speed_override: None,
            },
        }
    }
}

impl From<PassingType> for LosCategory {
    fn from(value: PassingType) -> Self {
        match value {
            PassingType::PassingConstrained => Self::PassingConstrained,
            PassingType::PassingZone => Self::PassingZone,
            PassingType::PassingLane => Self::PassingLane,
        }
    }
}

/// Everything the classifier looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LosInputs {
    pub follower_density: f64,
    pub average_speed: f64,
    pub free_flow_speed: f64,
    pub flow_rate: f64,
    pub speed_limit: f64,
    /// Demand exceeds capacity somewhere.
    pub over_capacity: bool,
}

/// Grades the inputs against the category's thresholds.
pub fn classify(category: LosCategory, inputs: &LosInputs) -> Los {
    if inputs.over_capacity {
        return Los::F;
    }

    let thresholds = category.thresholds();
    let regime = SpeedRegime::from_speed_limit(inputs.speed_limit);
    let limits = match regime {
        SpeedRegime::HighSpeed => thresholds.high_speed,
        SpeedRegime::LowSpeed => thresholds.low_speed,
    };
    let by_density = [Los::A, Los::B, Los::C, Los::D]
        .into_iter()
        .zip(limits)
        .find_map(|(grade, limit)| (inputs.follower_density <= limit).then_some(grade))
        .unwrap_or(Los::E);

    match thresholds.speed_override {
        Some(rule)
            if regime == SpeedRegime::HighSpeed
                && inputs.flow_rate <= rule.max_flow_rate
                && inputs.free_flow_speed > 0.0
                && inputs.average_speed >= rule.min_speed_ratio * inputs.free_flow_speed =>
        {
            by_density.min(rule.grade)
        }
        _ => by_density,
    }
}
