//! # Geometry and demand model
//!
//! Descriptors are the raw, deserializable form of a facility.
//! They are validated against the constraint tables into the typed inputs
//! that the pipeline stages consume.

use crate::constraints::CONSTRAINTS;
use crate::error::ValidationError;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Subsegment lengths must add up to the segment length within this tolerance (mi).
pub const LENGTH_TOLERANCE: f64 = 1e-6;

/// Passing opportunity of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PassingType {
    /// Passing is prohibited.
    PassingConstrained = 0,
    /// Passing is permitted in the oncoming lane where sight distance allows.
    PassingZone = 1,
    /// An added lane in the direction of travel.
    PassingLane = 2,
}

impl PassingType {
    /// The customary two letter abbreviation.
    pub const fn abbreviation(self) -> &'static str {
        match self {
            Self::PassingConstrained => "PC",
            Self::PassingZone => "PZ",
            Self::PassingLane => "PL",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

impl Display for PassingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.abbreviation())
    }
}

/// Severity of the vertical alignment, from level (1) to the steepest and longest grades (5).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum VerticalClass {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
}

impl VerticalClass {
    pub const ALL: [Self; 5] = [Self::One, Self::Two, Self::Three, Self::Four, Self::Five];

    /// Zero-based index into the coefficient tables.
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Severity of a horizontal curve; tangents are class 0.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    TryFromPrimitive,
    IntoPrimitive,
)]
#[repr(u8)]
pub enum HorizontalClass {
    #[default]
    Tangent = 0,
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
}

impl HorizontalClass {
    pub const fn number(self) -> u8 {
        self as u8
    }

    pub fn value(self) -> f64 {
        f64::from(self.number())
    }
}

/// A piece of horizontal alignment, as supplied by the user.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SubSegmentDescriptor {
    /// Length (mi).
    pub length: f64,
    /// 0 for tangents, 1-5 for curves.
    pub horizontal_class: Option<u8>,
    /// Design radius (ft).
    pub design_radius: Option<f64>,
    /// Superelevation rate (fraction, e.g. 0.06).
    pub superelevation: Option<f64>,
    /// Central angle (degrees).
    pub central_angle: Option<f64>,
    /// Measured average speed through the curve (mph).
    ///
    /// Takes precedence over the radius and superelevation based estimate.
    pub average_speed: Option<f64>,
}

/// Values from a previous analysis that a stage should adopt rather than compute.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Precomputed {
    pub vertical_class: Option<u8>,
    pub flow_rate: Option<f64>,
    pub opposing_flow_rate: Option<f64>,
    pub capacity: Option<f64>,
    pub free_flow_speed: Option<f64>,
    pub average_speed: Option<f64>,
    pub percent_followers: Option<f64>,
}

/// A directional segment, as supplied by the user.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SegmentDescriptor {
    /// 0 = passing constrained, 1 = passing zone, 2 = passing lane.
    pub passing_type: u8,
    /// Length (mi).
    pub length: f64,
    /// Grade (%); negative for downgrades.
    pub grade: f64,
    /// Posted speed limit (mph).
    pub speed_limit: f64,
    /// Directional demand volume (veh/h).
    pub volume: f64,
    /// Opposing demand volume (veh/h). Required for passing zones.
    pub opposing_volume: Option<f64>,
    /// Defaults to [`DEFAULT_PEAK_HOUR_FACTOR`].
    pub peak_hour_factor: Option<f64>,
    /// Defaults to the facility value.
    pub percent_heavy_vehicles: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsegments: Vec<SubSegmentDescriptor>,
    #[serde(default)]
    pub precomputed: Precomputed,
}

pub const DEFAULT_PEAK_HOUR_FACTOR: f64 = 0.94;

/// Facility-wide geometry and traffic parameters.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct FacilityParams {
    /// Lane width (ft).
    pub lane_width: f64,
    /// Shoulder width (ft).
    pub shoulder_width: f64,
    /// Access points per mile, both sides.
    pub access_point_density: f64,
    /// Heavy vehicle percentage for segments that don't specify their own.
    pub percent_heavy_vehicles: f64,
    /// Multiplier applied to the heavy vehicle percentage in the faster lane of a passing lane.
    pub faster_lane_heavy_vehicle_share: f64,
    /// Distance (mi) past a passing lane over which its benefit persists.
    ///
    /// When unset, the distance at which the modelled improvement decays to nothing is used.
    pub downstream_effective_length: Option<f64>,
}

impl Default for FacilityParams {
    fn default() -> Self {
        Self {
            lane_width: 12.0,
            shoulder_width: 6.0,
            access_point_density: 0.0,
            percent_heavy_vehicles: 5.0,
            faster_lane_heavy_vehicle_share: 0.4,
            downstream_effective_length: None,
        }
    }
}

impl FacilityParams {
    /// # Errors
    ///
    /// Returns the first parameter that is outside of its constraint range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let c = &CONSTRAINTS.two_lane_highways;
        c.lane_width.check(self.lane_width)?;
        c.shoulder_width.check(self.shoulder_width)?;
        c.access_point_density.check(self.access_point_density)?;
        c.percent_heavy_vehicles.check(self.percent_heavy_vehicles)?;
        c.faster_lane_heavy_vehicle_share
            .check(self.faster_lane_heavy_vehicle_share)?;
        if let Some(length) = self.downstream_effective_length {
            c.downstream_effective_length.check(length)?;
        }
        Ok(())
    }
}

/// A whole facility, as read from JSON by collaborators.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FacilityDescriptor {
    #[serde(default)]
    pub facility: FacilityParams,
    pub segments: Vec<SegmentDescriptor>,
}

/// Curve geometry from design plans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveGeometry {
    /// Radius (ft).
    pub radius: f64,
    /// Superelevation rate (fraction).
    pub superelevation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubSegmentKind {
    Tangent,
    /// At least one of `geometry` and `measured_speed` is present.
    Curve {
        geometry: Option<CurveGeometry>,
        declared_class: Option<HorizontalClass>,
        measured_speed: Option<f64>,
    },
}

/// A validated subsegment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubSegment {
    pub length: f64,
    pub kind: SubSegmentKind,
    pub central_angle: Option<f64>,
}

impl SubSegment {
    /// # Errors
    ///
    /// Fails when a field is out of range, or when a curve lacks both geometry and a
    /// measured speed (or a tangent carries curve data).
    pub fn from_descriptor(descriptor: &SubSegmentDescriptor) -> Result<Self, ValidationError> {
        let c = &CONSTRAINTS.two_lane_highways;
        let length = c.segment_length.check(descriptor.length)?;

        let declared_class = descriptor
            .horizontal_class
            .map(|class| {
                c.horizontal_class.check(class)?;
                HorizontalClass::try_from(class).map_err(|_| {
                    ValidationError::new("horizontal_class", format!("unknown class {class}"))
                })
            })
            .transpose()?;
        let radius = descriptor
            .design_radius
            .map(|r| c.design_radius.check(r))
            .transpose()?;
        let superelevation = descriptor
            .superelevation
            .map(|e| c.superelevation.check(e))
            .transpose()?;
        let measured_speed = descriptor
            .average_speed
            .map(|s| c.measured_speed.check(s))
            .transpose()?;
        let central_angle = descriptor
            .central_angle
            .map(|a| c.central_angle.check(a))
            .transpose()?;

        let is_curve = declared_class.is_some_and(|class| class != HorizontalClass::Tangent)
            || radius.is_some()
            || superelevation.is_some()
            || measured_speed.is_some();

        let kind = if is_curve {
            if declared_class == Some(HorizontalClass::Tangent) {
                return Err(ValidationError::new(
                    "horizontal_class",
                    "a tangent must not carry curve data",
                ));
            }
            let geometry = match (radius, superelevation) {
                (Some(radius), Some(superelevation)) => Some(CurveGeometry {
                    radius,
                    superelevation,
                }),
                (None, None) => None,
                (Some(_), None) => {
                    return Err(ValidationError::new(
                        "superelevation",
                        "required when a design radius is given",
                    ));
                }
                (None, Some(_)) => {
                    return Err(ValidationError::new(
                        "design_radius",
                        "required when a superelevation is given",
                    ));
                }
            };
            if geometry.is_none() && measured_speed.is_none() {
                return Err(ValidationError::new(
                    "design_radius",
                    "a curve needs a radius and superelevation, or a measured average speed",
                ));
            }
            SubSegmentKind::Curve {
                geometry,
                declared_class,
                measured_speed,
            }
        } else {
            SubSegmentKind::Tangent
        };

        Ok(Self {
            length,
            kind,
            central_angle,
        })
    }

    pub const fn is_curve(&self) -> bool {
        matches!(self.kind, SubSegmentKind::Curve { .. })
    }
}

/// Validated segment inputs, with facility defaults resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInputs {
    pub passing_type: PassingType,
    pub length: f64,
    pub grade: f64,
    pub speed_limit: f64,
    pub volume: f64,
    /// Zero when not given.
    pub opposing_volume: f64,
    pub peak_hour_factor: f64,
    pub percent_heavy_vehicles: f64,
    pub subsegments: Vec<SubSegment>,
    pub precomputed: Precomputed,
}

impl SegmentInputs {
    /// Validates a descriptor.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the segment and the offending field.
    pub fn from_descriptor(
        index: usize,
        descriptor: &SegmentDescriptor,
        params: &FacilityParams,
    ) -> Result<Self, ValidationError> {
        Self::validate(descriptor, params).map_err(|e| e.in_segment(index))
    }

    fn validate(
        descriptor: &SegmentDescriptor,
        params: &FacilityParams,
    ) -> Result<Self, ValidationError> {
        let c = &CONSTRAINTS.two_lane_highways;

        c.passing_type.check(descriptor.passing_type)?;
        let passing_type = PassingType::try_from(descriptor.passing_type).map_err(|_| {
            ValidationError::new(
                "passing_type",
                format!("unknown passing type {}", descriptor.passing_type),
            )
        })?;
        let length = c.segment_length.check(descriptor.length)?;
        let grade = c.grade.check(descriptor.grade)?;
        let speed_limit = c.speed_limit.check(descriptor.speed_limit)?;
        let volume = c.volume.check(descriptor.volume)?;
        let opposing_volume = match (passing_type, descriptor.opposing_volume) {
            (PassingType::PassingZone, None) => {
                return Err(ValidationError::new(
                    "opposing_volume",
                    "required for passing zone segments",
                ));
            }
            (_, Some(v)) => c.volume.check(v).map_err(|e| ValidationError {
                field: "opposing_volume".into(),
                ..e
            })?,
            (_, None) => 0.0,
        };
        let peak_hour_factor = c
            .peak_hour_factor
            .check(descriptor.peak_hour_factor.unwrap_or(DEFAULT_PEAK_HOUR_FACTOR))?;
        let percent_heavy_vehicles = c.percent_heavy_vehicles.check(
            descriptor
                .percent_heavy_vehicles
                .unwrap_or(params.percent_heavy_vehicles),
        )?;

        let subsegments = descriptor
            .subsegments
            .iter()
            .enumerate()
            .map(|(i, sub)| SubSegment::from_descriptor(sub).map_err(|e| e.in_subsegment(i)))
            .collect::<Result<Vec<_>, _>>()?;
        if !subsegments.is_empty() {
            let total: f64 = subsegments.iter().map(|sub| sub.length).sum();
            if (total - length).abs() > LENGTH_TOLERANCE {
                return Err(ValidationError::new(
                    "subsegments",
                    format!("lengths sum to {total} mi, but the segment is {length} mi long"),
                ));
            }
        }

        let precomputed = descriptor.precomputed;
        if let Some(class) = precomputed.vertical_class {
            c.vertical_class.check(class)?;
        }
        for (value, range) in [
            (precomputed.flow_rate, &c.flow_rate),
            (precomputed.opposing_flow_rate, &c.flow_rate),
            (precomputed.capacity, &c.capacity),
            (precomputed.free_flow_speed, &c.free_flow_speed),
            (precomputed.average_speed, &c.average_speed),
            (precomputed.percent_followers, &c.percent_followers),
        ] {
            if let Some(value) = value {
                range.check(value)?;
            }
        }

        Ok(Self {
            passing_type,
            length,
            grade,
            speed_limit,
            volume,
            opposing_volume,
            peak_hour_factor,
            percent_heavy_vehicles,
            subsegments,
            precomputed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> SegmentDescriptor {
        SegmentDescriptor {
            passing_type: 0,
            length: 1.0,
            grade: 0.0,
            speed_limit: 55.0,
            volume: 500.0,
            ..Default::default()
        }
    }

    #[test]
    fn resolves_defaults() {
        let params = FacilityParams {
            percent_heavy_vehicles: 12.0,
            ..Default::default()
        };
        let Ok(inputs) = SegmentInputs::from_descriptor(0, &segment(), &params) else {
            panic!("Expected a valid segment");
        };
        assert_eq!(inputs.passing_type, PassingType::PassingConstrained);
        assert!((inputs.peak_hour_factor - DEFAULT_PEAK_HOUR_FACTOR).abs() < f64::EPSILON);
        assert!((inputs.percent_heavy_vehicles - 12.0).abs() < f64::EPSILON);
        assert!(inputs.opposing_volume.abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_passing_type() {
        let descriptor = SegmentDescriptor {
            passing_type: 3,
            ..segment()
        };
        let Err(error) = SegmentInputs::from_descriptor(2, &descriptor, &FacilityParams::default())
        else {
            panic!("Expected passing type 3 to be rejected");
        };
        assert_eq!(error.segment, Some(2));
        assert_eq!(error.field, "passing_type");
    }

    #[test]
    fn rejects_non_positive_peak_hour_factor() {
        for phf in [0.0, -0.5] {
            let descriptor = SegmentDescriptor {
                peak_hour_factor: Some(phf),
                ..segment()
            };
            let Err(error) =
                SegmentInputs::from_descriptor(0, &descriptor, &FacilityParams::default())
            else {
                panic!("Expected phf {phf} to be rejected");
            };
            assert_eq!(error.field, "peak_hour_factor");
        }
    }

    #[test]
    fn rejects_negative_volume() {
        let descriptor = SegmentDescriptor {
            volume: -1.0,
            ..segment()
        };
        let Err(error) = SegmentInputs::from_descriptor(0, &descriptor, &FacilityParams::default())
        else {
            panic!("Expected a negative volume to be rejected");
        };
        assert_eq!(error.field, "volume");
    }

    #[test]
    fn passing_zone_requires_opposing_volume() {
        let descriptor = SegmentDescriptor {
            passing_type: 1,
            ..segment()
        };
        let Err(error) = SegmentInputs::from_descriptor(0, &descriptor, &FacilityParams::default())
        else {
            panic!("Expected a missing opposing volume to be rejected");
        };
        assert_eq!(error.field, "opposing_volume");
    }

    #[test]
    fn subsegment_lengths_must_match() {
        let descriptor = SegmentDescriptor {
            subsegments: vec![
                SubSegmentDescriptor {
                    length: 0.4,
                    ..Default::default()
                },
                SubSegmentDescriptor {
                    length: 0.5,
                    design_radius: Some(900.0),
                    superelevation: Some(0.04),
                    ..Default::default()
                },
            ],
            ..segment()
        };
        let Err(error) = SegmentInputs::from_descriptor(1, &descriptor, &FacilityParams::default())
        else {
            panic!("Expected a length mismatch");
        };
        insta::assert_snapshot!(error, @"segment 1: invalid subsegments: lengths sum to 0.9 mi, but the segment is 1 mi long");
    }

    #[test]
    fn curve_needs_geometry_or_speed() {
        let descriptor = SubSegmentDescriptor {
            length: 0.5,
            horizontal_class: Some(3),
            ..Default::default()
        };
        assert!(SubSegment::from_descriptor(&descriptor).is_err());

        let descriptor = SubSegmentDescriptor {
            length: 0.5,
            design_radius: Some(800.0),
            ..Default::default()
        };
        let Err(error) = SubSegment::from_descriptor(&descriptor) else {
            panic!("Expected a radius without superelevation to be rejected");
        };
        assert_eq!(error.field, "superelevation");

        let descriptor = SubSegmentDescriptor {
            length: 0.5,
            horizontal_class: Some(2),
            average_speed: Some(48.0),
            ..Default::default()
        };
        let Ok(sub) = SubSegment::from_descriptor(&descriptor) else {
            panic!("Expected a measured curve to be accepted");
        };
        assert!(sub.is_curve());
    }

    #[test]
    fn tangent_must_not_carry_curve_data() {
        let descriptor = SubSegmentDescriptor {
            length: 0.5,
            horizontal_class: Some(0),
            design_radius: Some(800.0),
            superelevation: Some(0.02),
            ..Default::default()
        };
        let Err(error) = SubSegment::from_descriptor(&descriptor) else {
            panic!("Expected a tangent with a radius to be rejected");
        };
        assert_eq!(error.field, "horizontal_class");
    }

    #[test]
    fn facility_descriptor_from_json() {
        let json = r#"{
            "facility": { "lane_width": 11, "access_point_density": 4 },
            "segments": [
                { "passing_type": 1, "length": 0.5, "grade": -2, "speed_limit": 50,
                  "volume": 400, "opposing_volume": 380,
                  "subsegments": [{ "length": 0.5, "design_radius": 1000, "superelevation": 0.04 }] }
            ]
        }"#;
        let Ok(descriptor) = serde_json::from_str::<FacilityDescriptor>(json) else {
            panic!("Expected the facility JSON to parse");
        };
        assert!((descriptor.facility.lane_width - 11.0).abs() < f64::EPSILON);
        assert!((descriptor.facility.shoulder_width - 6.0).abs() < f64::EPSILON);
        assert_eq!(descriptor.segments.len(), 1);
        assert_eq!(descriptor.segments[0].subsegments.len(), 1);
        assert_eq!(descriptor.segments[0].precomputed, Precomputed::default());
    }
}
