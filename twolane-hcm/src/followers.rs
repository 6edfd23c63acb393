//! Percent followers.
//!
//! The share of vehicles travelling in platoons rises along a curve anchored at two
//! calibrated points, the percent followers at capacity and at a quarter of capacity.

use crate::breakpoints::{Clamp, Lookup};
use crate::error::AdvisoryLog;
use crate::model::{PassingType, VerticalClass};
use crate::tables::{
    FOLLOWER_COEFFICIENTS, FOLLOWER_CURVE, FollowerCoefficients, FollowerCurve,
    PASSING_LANE_FOLLOWER_COEFFICIENTS, PASSING_LANE_FOLLOWER_CURVE,
};

/// Calibration points are kept strictly inside `(0, 100)`.
const ANCHOR_DOMAIN: (f64, f64) = (0.1, 99.9);

fn clamp_anchor(value: f64) -> Lookup {
    let (min, max) = ANCHOR_DOMAIN;
    let clamped = value.clamp(min, max);
    Lookup {
        value: clamped,
        clamp: (value < min || value > max).then_some(Clamp {
            input: value,
            min,
            max,
            clamped_to: clamped,
        }),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FollowerModel {
    passing_type: PassingType,
    coefficients: &'static FollowerCoefficients,
    curve: &'static FollowerCurve,
    length: f64,
    free_flow_speed: f64,
    opposing_flow_rate: f64,
    percent_heavy_vehicles: f64,
    capacity: f64,
}

impl FollowerModel {
    pub fn new(
        passing_type: PassingType,
        class: VerticalClass,
        length: f64,
        free_flow_speed: f64,
        opposing_flow_rate: f64,
        percent_heavy_vehicles: f64,
        capacity: f64,
    ) -> Self {
        let (coefficients, curve) = match passing_type {
            PassingType::PassingConstrained | PassingType::PassingZone => {
                (&FOLLOWER_COEFFICIENTS[class.index()], &FOLLOWER_CURVE)
            }
            PassingType::PassingLane => (
                &PASSING_LANE_FOLLOWER_COEFFICIENTS[class.index()],
                &PASSING_LANE_FOLLOWER_CURVE,
            ),
        };
        Self {
            passing_type,
            coefficients,
            curve,
            length,
            free_flow_speed,
            opposing_flow_rate,
            percent_heavy_vehicles,
            capacity,
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

    fn regression(&self, k: &[f64; 8]) -> f64 {
        let length = self.length;
        let ffs = self.free_flow_speed;
        let phv = self.percent_heavy_vehicles;
        let common = k[0] + k[1] * length + k[2] * length.sqrt() + k[3] * ffs + k[4] * ffs.sqrt();
        match self.passing_type {
            PassingType::PassingConstrained | PassingType::PassingZone => {
                let opposing = self.opposing_flow_rate / 1000.0;
                common + k[5] * phv + k[6] * ffs * opposing + k[7] * opposing.sqrt()
            }
            PassingType::PassingLane => common + k[5] * phv + k[6] * phv.sqrt() + k[7] * ffs * phv,
        }
    }

    /// Percent followers at capacity and at 25% of capacity.
    pub fn anchors(&self, log: &mut AdvisoryLog) -> (f64, f64) {
        let at_capacity = clamp_anchor(self.regression(&self.coefficients.at_capacity));
        let at_quarter = clamp_anchor(self.regression(&self.coefficients.at_quarter_capacity));
        log.record_lookup("percent_followers_at_capacity", &at_capacity);
        log.record_lookup("percent_followers_at_quarter_capacity", &at_quarter);
        (at_capacity.value, at_quarter.value)
    }

    /// Percent followers (0-100) at a demand flow rate (veh/h).
    pub fn percent_followers(&self, flow_rate: f64, log: &mut AdvisoryLog) -> f64 {
        let (at_capacity, at_quarter) = self.anchors(log);
        if flow_rate <= 0.0 {
            return 0.0;
        }

        let capacity = self.capacity / 1000.0;
        let z_capacity = -(1.0 - at_capacity / 100.0).ln() / capacity;
        let z_quarter = -(1.0 - at_quarter / 100.0).ln() / (0.25 * capacity);

        let [d1, d2] = self.curve.d;
        let [e0, e1, e2, e3, e4] = self.curve.e;
        let slope = d1 * z_quarter + d2 * z_capacity;
        let power = e0
            + e1 * z_quarter
            + e2 * z_capacity
            + e3 * z_quarter.sqrt()
            + e4 * z_capacity.sqrt();

        let followers = 100.0 * (1.0 - (slope * (flow_rate / 1000.0).powf(power)).exp());
        followers.clamp(0.0, 100.0)
    }
}
