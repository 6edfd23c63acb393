//! # Free-flow and average travel speed
//!
//! Free-flow speed starts from a base derived from the posted speed limit,
//! and is reduced for heavy vehicles, the cross-section and access points.
//! The average travel speed then drops from the free-flow speed as demand grows,
//! and drops further through horizontal curves.

use crate::alignment::{AlignedKind, HorizontalAlignment};
use crate::breakpoints::Lookup;
use crate::error::{AdvisoryKind, AdvisoryLog};
use crate::model::{HorizontalClass, PassingType, VerticalClass};
use crate::tables::{
    BASE_FREE_FLOW_SPEED, FREE_FLOW_COEFFICIENTS, PASSING_LANE_SPEED_COEFFICIENTS,
    SPEED_COEFFICIENTS, SpeedCoefficients,
};

/// Adjusted free-flow speeds below this (mph) are floored.
pub const MIN_FREE_FLOW_SPEED: f64 = 10.0;

/// Below this demand flow rate (veh/h), traffic runs at free-flow speed.
const FREE_FLOW_DEMAND: f64 = 100.0;

/// Base free-flow speed (mph) for a posted speed limit.
pub fn base_free_flow_speed(speed_limit: f64) -> Lookup {
    BASE_FREE_FLOW_SPEED.lookup(speed_limit)
}

/// `f_LS`, the free-flow speed lost to narrow lanes and shoulders (mph).
pub fn lane_shoulder_adjustment(lane_width: f64, shoulder_width: f64) -> f64 {
    0.6 * (12.0 - lane_width) + 0.7 * (6.0 - shoulder_width.min(6.0))
}

/// `f_A`, the free-flow speed lost to access points (mph).
pub fn access_point_adjustment(access_point_density: f64) -> f64 {
    (access_point_density / 4.0).min(10.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeFlowSpeed {
    /// Base free-flow speed (mph).
    pub base: f64,
    /// Free-flow speed after all adjustments (mph).
    pub adjusted: f64,
}

/// Everything the free-flow speed estimate reads from a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FreeFlowInputs {
    pub class: VerticalClass,
    /// Segment length the model is evaluated at (mi).
    pub length: f64,
    /// Model opposing flow rate (veh/h).
    pub opposing_flow_rate: f64,
    pub percent_heavy_vehicles: f64,
    pub lane_width: f64,
    pub shoulder_width: f64,
    pub access_point_density: f64,
}

/// `a`, the slope of the heavy vehicle adjustment.
fn heavy_vehicle_slope(base: f64, inputs: &FreeFlowInputs) -> f64 {
    let [a0, a1, a2, a3, a4, a5] = FREE_FLOW_COEFFICIENTS[inputs.class.index()];
    let opposing = (a3 + a4 * base + a5 * inputs.length).max(0.0);
    (a0 + a1 * base + a2 * inputs.length + opposing * inputs.opposing_flow_rate / 1000.0)
        .max(0.0333)
}

/// Adjusts the base free-flow speed (mph) for the segment.
///
/// The result never exceeds the base, and is floored at [`MIN_FREE_FLOW_SPEED`].
pub fn free_flow_speed(base: f64, inputs: &FreeFlowInputs, log: &mut AdvisoryLog) -> FreeFlowSpeed {
    let computed = base
        - heavy_vehicle_slope(base, inputs) * inputs.percent_heavy_vehicles
        - lane_shoulder_adjustment(inputs.lane_width, inputs.shoulder_width)
        - access_point_adjustment(inputs.access_point_density);

    let adjusted = if computed < MIN_FREE_FLOW_SPEED {
        log.record(AdvisoryKind::FreeFlowSpeedFloored {
            computed,
            floor: MIN_FREE_FLOW_SPEED,
        });
        MIN_FREE_FLOW_SPEED
    } else {
        computed
    };

    FreeFlowSpeed {
        base,
        adjusted: adjusted.min(base),
    }
}

/// The average speed model for tangent alignment.
#[derive(Debug, Clone, Copy)]
pub struct TangentSpeedModel {
    coefficients: &'static SpeedCoefficients,
    free_flow_speed: f64,
    length: f64,
    opposing_flow_rate: f64,
    percent_heavy_vehicles: f64,
}

impl TangentSpeedModel {
    pub fn new(
        passing_type: PassingType,
        class: VerticalClass,
        free_flow_speed: f64,
        length: f64,
        opposing_flow_rate: f64,
        percent_heavy_vehicles: f64,
    ) -> Self {
        let table = match passing_type {
            PassingType::PassingConstrained | PassingType::PassingZone => &SPEED_COEFFICIENTS,
            PassingType::PassingLane => &PASSING_LANE_SPEED_COEFFICIENTS,
        };
        Self {
            coefficients: &table[class.index()],
            free_flow_speed,
            length,
            opposing_flow_rate,
            percent_heavy_vehicles,
        }
    }

    /// The same model, for a different share of heavy vehicles.
    #[must_use]
    pub fn with_heavy_vehicles(self, percent_heavy_vehicles: f64) -> Self {
        Self {
            percent_heavy_vehicles,
            ..self
        }
    }

    pub const fn free_flow_speed(&self) -> f64 {
        self.free_flow_speed
    }

    pub const fn percent_heavy_vehicles(&self) -> f64 {
        self.percent_heavy_vehicles
    }

    /// `m`, the rate at which speed drops with demand.
    pub fn slope(&self) -> f64 {
        let [b0, b1, b2, b5] = self.coefficients.b;
        let [c0, c1, c2, c3] = self.coefficients.c;
        let [d0, d1, d2, d3] = self.coefficients.d;
        let ffs = self.free_flow_speed;
        let root_length = self.length.sqrt();
        let root_hv = self.percent_heavy_vehicles.sqrt();

        let b3 = c0 + c1 * root_length + c2 * ffs + c3 * ffs * root_length;
        let b4 = d0 + d1 * root_hv + d2 * ffs + d3 * ffs * root_hv;
        (b0 + b1 * ffs
            + b2 * self.opposing_flow_rate / 1000.0
            + b3.max(0.0) * root_length
            + b4.max(0.0) * root_hv)
            .max(b5)
    }

    /// `p`, the power of the speed-flow curve.
    pub fn power(&self) -> f64 {
        let [f0, f1, f2, f3, f4, f5, f6, f7, f8] = self.coefficients.f;
        let opposing = self.opposing_flow_rate / 1000.0;
        let phv = self.percent_heavy_vehicles;
        (f0 + f1 * self.free_flow_speed
            + f2 * self.length
            + f3 * opposing
            + f4 * opposing.sqrt()
            + f5 * phv
            + f6 * phv.sqrt()
            + f7 * self.length * phv)
            .max(f8)
    }

    /// Average speed (mph) at a demand flow rate (veh/h), within `[0, FFS]`.
    pub fn speed(&self, flow_rate: f64) -> f64 {
        if flow_rate <= FREE_FLOW_DEMAND {
            return self.free_flow_speed;
        }
        let drop = self.slope() * (flow_rate / 1000.0 - 0.1).powf(self.power());
        (self.free_flow_speed - drop).clamp(0.0, self.free_flow_speed)
    }
}

/// `BFFS_HC`, the base free-flow speed through a curve (mph).
pub fn curve_base_free_flow_speed(base: f64, class: HorizontalClass) -> f64 {
    base.min(44.32 + 0.3728 * base - 6.868 * class.value())
}

/// Average speed (mph) through a curve of the given class.
///
/// Never faster than the speed on the adjoining tangent.
pub fn curve_speed(
    tangent_speed: f64,
    base: f64,
    class: HorizontalClass,
    percent_heavy_vehicles: f64,
    flow_rate: f64,
) -> f64 {
    let free_flow = curve_base_free_flow_speed(base, class) - 0.0255 * percent_heavy_vehicles;
    let hc = class.value();
    let slope = (-25.8993 - 0.7756 * free_flow + 10.6294 * free_flow.max(0.0).sqrt()
        + 2.4766 * hc
        - 9.8238 * hc.sqrt())
    .max(0.277);
    let speed = free_flow - slope * (flow_rate / 1000.0 - 0.1).max(0.0).sqrt();
    tangent_speed.min(speed).max(0.0)
}

/// Average travel speed (mph) over the whole segment.
///
/// Each subsegment's speed is weighted by the time spent in it,
/// so the result is the length divided by the total travel time.
/// No curve, measured or estimated, is faster than the tangent.
pub fn segment_speed(
    alignment: &HorizontalAlignment,
    model: &TangentSpeedModel,
    base: f64,
    flow_rate: f64,
) -> f64 {
    let tangent_speed = model.speed(flow_rate);
    if alignment.is_tangent() {
        return tangent_speed;
    }

    let (length, travel_time) = alignment
        .subsegments
        .iter()
        .map(|sub| {
            let speed = match sub.kind {
                AlignedKind::Tangent => tangent_speed,
                AlignedKind::Curve { class } => curve_speed(
                    tangent_speed,
                    base,
                    class,
                    model.percent_heavy_vehicles(),
                    flow_rate,
                ),
                AlignedKind::MeasuredCurve { speed, .. } => speed.min(tangent_speed),
            };
            (sub.length, sub.length / speed)
        })
        .fold((0.0, 0.0), |(l, t), (length, time)| (l + length, t + time));

    if travel_time > 0.0 {
        (length / travel_time).clamp(0.0, model.free_flow_speed())
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::AlignedSubSegment;

    fn inputs(class: VerticalClass, length: f64, opposing_flow_rate: f64) -> FreeFlowInputs {
        FreeFlowInputs {
            class,
            length,
            opposing_flow_rate,
            percent_heavy_vehicles: 5.0,
            lane_width: 12.0,
            shoulder_width: 6.0,
            access_point_density: 0.0,
        }
    }

    #[test]
    fn base_follows_speed_limit() {
        let lookup = base_free_flow_speed(50.0);
        assert!((lookup.value - 57.0).abs() < 1e-9);
        assert!(lookup.clamp.is_none());
        let lookup = base_free_flow_speed(80.0);
        assert!((lookup.value - 85.5).abs() < 1e-9);
        assert!(lookup.clamp.is_some());
    }

    #[test]
    fn level_free_flow_speed() {
        let mut log = AdvisoryLog::new(0);
        let ffs = free_flow_speed(57.0, &inputs(VerticalClass::One, 0.75, 1500.0), &mut log);
        assert!((ffs.adjusted - 56.8335).abs() < 1e-9);
        assert!(log.is_empty());
    }

    #[test]
    fn cross_section_adjustments() {
        assert!((lane_shoulder_adjustment(11.0, 4.0) - 2.0).abs() < 1e-12);
        assert!(lane_shoulder_adjustment(12.0, 8.0).abs() < 1e-12);
        assert!((access_point_adjustment(2.0) - 0.5).abs() < 1e-12);
        assert!((access_point_adjustment(60.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn implausible_free_flow_speed_is_floored() {
        let mut log = AdvisoryLog::new(2);
        let ffs = free_flow_speed(
            20.0,
            &FreeFlowInputs {
                percent_heavy_vehicles: 100.0,
                lane_width: 9.0,
                shoulder_width: 0.0,
                access_point_density: 30.0,
                ..inputs(VerticalClass::Five, 3.0, 1500.0)
            },
            &mut log,
        );
        assert!((ffs.adjusted - MIN_FREE_FLOW_SPEED).abs() < f64::EPSILON);
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn tangent_speed_drops_with_demand() {
        let model = TangentSpeedModel::new(
            PassingType::PassingConstrained,
            VerticalClass::One,
            56.8335,
            0.75,
            1500.0,
            5.0,
        );
        assert!((model.speed(80.0) - 56.8335).abs() < f64::EPSILON);
        assert!((model.speed(800.0) - 53.6299).abs() < 1e-3);
        assert!(model.speed(1200.0) < model.speed(800.0));
    }

    #[test]
    fn curves_are_slower() {
        let tangent = 59.0;
        let gentle = curve_speed(tangent, 62.7, HorizontalClass::One, 8.0, 545.0);
        let sharp = curve_speed(tangent, 62.7, HorizontalClass::Five, 8.0, 545.0);
        assert!(gentle <= tangent);
        assert!(sharp < gentle);
        // A tangent "curve" never restricts the tangent speed
        assert!((curve_base_free_flow_speed(62.7, HorizontalClass::Tangent) - 62.7).abs() < 1e-9);
    }

    #[test]
    fn harmonic_mean_over_subsegments() {
        let model = TangentSpeedModel::new(
            PassingType::PassingConstrained,
            VerticalClass::One,
            60.0,
            1.0,
            1500.0,
            5.0,
        );
        let alignment = HorizontalAlignment::from_subsegments(vec![
            AlignedSubSegment {
                length: 0.5,
                kind: AlignedKind::Tangent,
                speed_reduction: 0.0,
            },
            AlignedSubSegment {
                length: 0.5,
                kind: AlignedKind::MeasuredCurve {
                    class: None,
                    speed: 30.0,
                },
                speed_reduction: 0.5,
            },
        ]);
        // 1 mi at 60 and 30 mph over the two halves: 1 / (0.5/60 + 0.5/30) = 40
        let speed = segment_speed(&alignment, &model, 60.0, 50.0);
        assert!((speed - 40.0).abs() < 1e-9);
    }

    #[test]
    fn measured_curve_no_faster_than_tangent() {
        let model = TangentSpeedModel::new(
            PassingType::PassingConstrained,
            VerticalClass::One,
            60.0,
            1.0,
            1500.0,
            5.0,
        );
        let alignment = HorizontalAlignment::from_subsegments(vec![
            AlignedSubSegment {
                length: 0.2,
                kind: AlignedKind::Tangent,
                speed_reduction: 0.0,
            },
            AlignedSubSegment {
                length: 0.8,
                kind: AlignedKind::MeasuredCurve {
                    class: Some(HorizontalClass::One),
                    speed: 95.0,
                },
                speed_reduction: 0.0,
            },
        ]);
        let speed = segment_speed(&alignment, &model, 60.0, 50.0);
        assert!((speed - model.speed(50.0)).abs() < 1e-9);
    }
}
