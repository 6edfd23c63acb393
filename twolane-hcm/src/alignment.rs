//! Horizontal alignment adjustments.

use crate::error::{AdvisoryKind, AdvisoryLog};
use crate::model::{CurveGeometry, HorizontalClass, SubSegment, SubSegmentKind};
use crate::speed::curve_base_free_flow_speed;
use crate::tables::{MINIMUM_CURVE_RADIUS, RADIUS_BANDS, SUPERELEVATION_DOMAIN};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlignedKind {
    Tangent,
    /// A curve with a speed estimated from its class.
    Curve { class: HorizontalClass },
    /// A curve with a measured average speed (mph).
    MeasuredCurve {
        class: Option<HorizontalClass>,
        speed: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignedSubSegment {
    pub length: f64,
    pub kind: AlignedKind,
    /// Share of the base free-flow speed lost in this subsegment, within `[0, 1]`.
    pub speed_reduction: f64,
}

impl AlignedSubSegment {
    pub const fn horizontal_class(&self) -> Option<HorizontalClass> {
        match self.kind {
            AlignedKind::Tangent => Some(HorizontalClass::Tangent),
            AlignedKind::Curve { class } => Some(class),
            AlignedKind::MeasuredCurve { class, .. } => class,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HorizontalAlignment {
    pub subsegments: Vec<AlignedSubSegment>,
    /// Length-weighted speed reduction of the whole segment.
    pub weighted_reduction: f64,
}

impl HorizontalAlignment {
    /// A single tangent of the given length.
    pub fn tangent(length: f64) -> Self {
        Self::from_subsegments(vec![AlignedSubSegment {
            length,
            kind: AlignedKind::Tangent,
            speed_reduction: 0.0,
        }])
    }

    pub fn from_subsegments(subsegments: Vec<AlignedSubSegment>) -> Self {
        let length: f64 = subsegments.iter().map(|sub| sub.length).sum();
        let weighted_reduction = if length > 0.0 {
            subsegments
                .iter()
                .map(|sub| sub.length * sub.speed_reduction)
                .sum::<f64>()
                / length
        } else {
            0.0
        };
        Self {
            subsegments,
            weighted_reduction,
        }
    }

    /// True when no subsegment is a curve.
    pub fn is_tangent(&self) -> bool {
        self.subsegments
            .iter()
            .all(|sub| sub.kind == AlignedKind::Tangent)
    }
}

/// The horizontal class of a curve, from its radius (ft) and superelevation (%).
///
/// The superelevation must be within [`SUPERELEVATION_DOMAIN`].
pub fn horizontal_class(radius: f64, superelevation: f64) -> HorizontalClass {
    let band = RADIUS_BANDS
        .iter()
        .rev()
        .find(|band| radius >= band.min_radius)
        .unwrap_or(&RADIUS_BANDS[0]);
    let class = if superelevation < band.superelevation_limit {
        band.class_below
    } else {
        band.class_at_or_above
    };
    HorizontalClass::try_from(class).unwrap_or(HorizontalClass::Five)
}

fn classify_geometry(
    index: usize,
    geometry: CurveGeometry,
    speed_limit: f64,
    log: &mut AdvisoryLog,
) -> HorizontalClass {
    let (min, max) = SUPERELEVATION_DOMAIN;
    let percent = geometry.superelevation * 100.0;
    let clamped = percent.clamp(min, max);
    if (clamped - percent).abs() > f64::EPSILON {
        log.record(AdvisoryKind::LookupOutOfRange {
            table: "superelevation",
            input: percent,
            min,
            max,
            clamped_to: clamped,
        });
    }

    let minimum = MINIMUM_CURVE_RADIUS.lookup(speed_limit).value;
    if geometry.radius < minimum {
        log.record(AdvisoryKind::RadiusBelowMinimum {
            subsegment: index,
            radius: geometry.radius,
            minimum,
        });
    }

    horizontal_class(geometry.radius, clamped)
}

/// Classifies each subsegment and estimates the speed lost to curvature.
///
/// Segments without subsegments are treated as a single tangent.
pub fn adjust(
    length: f64,
    subsegments: &[SubSegment],
    speed_limit: f64,
    base_free_flow_speed: f64,
    log: &mut AdvisoryLog,
) -> HorizontalAlignment {
    if subsegments.is_empty() {
        return HorizontalAlignment::tangent(length);
    }

    let aligned = subsegments
        .iter()
        .enumerate()
        .map(|(i, sub)| {
            let kind = match sub.kind {
                SubSegmentKind::Tangent => AlignedKind::Tangent,
                SubSegmentKind::Curve {
                    geometry,
                    declared_class,
                    measured_speed,
                } => {
                    let class = geometry
                        .map(|geometry| classify_geometry(i, geometry, speed_limit, log))
                        .or(declared_class);
                    match (measured_speed, class) {
                        (Some(speed), class) => AlignedKind::MeasuredCurve { class, speed },
                        (None, Some(HorizontalClass::Tangent) | None) => AlignedKind::Tangent,
                        (None, Some(class)) => AlignedKind::Curve { class },
                    }
                }
            };
            let speed_reduction = match kind {
                AlignedKind::Tangent => 0.0,
                AlignedKind::Curve { class } => {
                    1.0 - curve_base_free_flow_speed(base_free_flow_speed, class)
                        / base_free_flow_speed
                }
                AlignedKind::MeasuredCurve { speed, .. } => {
                    (1.0 - speed / base_free_flow_speed).max(0.0)
                }
            };
            AlignedSubSegment {
                length: sub.length,
                kind,
                speed_reduction,
            }
        })
        .collect();

    HorizontalAlignment::from_subsegments(aligned)
}
