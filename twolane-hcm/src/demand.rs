//! Demand flow rates and capacity.

use crate::model::{FacilityParams, PassingType, Precomputed, VerticalClass};
use crate::speed::{access_point_adjustment, lane_shoulder_adjustment};
use crate::tables::{
    BASE_CAPACITY, CONSTRAINED_OPPOSING_FLOW, HEAVY_VEHICLE_EQUIVALENTS, passing_lane_capacity,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandFlow {
    pub heavy_vehicle_factor: f64,
    /// Subject direction demand flow rate (veh/h).
    pub flow_rate: f64,
    /// Opposing direction demand flow rate (veh/h).
    pub opposing_flow_rate: f64,
    /// The opposing flow rate the speed and follower models are evaluated with.
    ///
    /// The models assume 1500 veh/h where passing is prohibited,
    /// and ignore the opposing direction on passing lanes.
    pub model_opposing_flow_rate: f64,
    /// Capacity (veh/h).
    pub capacity: f64,
}

impl DemandFlow {
    pub fn exceeds_capacity(&self) -> bool {
        self.flow_rate > self.capacity
    }
}

/// `1 / (1 + P_HV (E_HV - 1))`, with `E_HV` by vertical class.
pub fn heavy_vehicle_factor(percent_heavy_vehicles: f64, class: VerticalClass) -> f64 {
    let equivalent = HEAVY_VEHICLE_EQUIVALENTS[class.index()];
    1.0 / (1.0 + percent_heavy_vehicles / 100.0 * (equivalent - 1.0))
}

/// Capacity (veh/h), reduced in proportion to the free-flow speed lost to the cross-section
/// and access points.
pub fn capacity(
    passing_type: PassingType,
    class: VerticalClass,
    percent_heavy_vehicles: f64,
    base_free_flow_speed: f64,
    params: &FacilityParams,
) -> f64 {
    let base = match passing_type {
        PassingType::PassingConstrained | PassingType::PassingZone => BASE_CAPACITY,
        PassingType::PassingLane => passing_lane_capacity(percent_heavy_vehicles, class.number()),
    };
    let loss = lane_shoulder_adjustment(params.lane_width, params.shoulder_width)
        + access_point_adjustment(params.access_point_density);
    base * (1.0 - loss / base_free_flow_speed).max(0.0)
}

/// Everything the demand stage reads from a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DemandInputs {
    pub passing_type: PassingType,
    pub class: VerticalClass,
    pub volume: f64,
    pub opposing_volume: f64,
    pub peak_hour_factor: f64,
    pub percent_heavy_vehicles: f64,
    pub base_free_flow_speed: f64,
}

/// Converts hourly volumes into peak flow rates, and determines capacity.
///
/// Inputs are validated beforehand (`phf > 0`, volumes non-negative).
pub fn demand_flow(
    inputs: &DemandInputs,
    params: &FacilityParams,
    precomputed: &Precomputed,
) -> DemandFlow {
    let heavy_vehicle_factor = heavy_vehicle_factor(inputs.percent_heavy_vehicles, inputs.class);
    let divisor = inputs.peak_hour_factor * heavy_vehicle_factor;

    let flow_rate = precomputed
        .flow_rate
        .unwrap_or(inputs.volume / divisor);
    let opposing_flow_rate = precomputed
        .opposing_flow_rate
        .unwrap_or(inputs.opposing_volume / divisor);
    let model_opposing_flow_rate = match inputs.passing_type {
        PassingType::PassingConstrained => CONSTRAINED_OPPOSING_FLOW,
        PassingType::PassingZone => opposing_flow_rate,
        PassingType::PassingLane => 0.0,
    };
    let capacity = precomputed.capacity.unwrap_or_else(|| {
        capacity(
            inputs.passing_type,
            inputs.class,
            inputs.percent_heavy_vehicles,
            inputs.base_free_flow_speed,
            params,
        )
    });

    DemandFlow {
        heavy_vehicle_factor,
        flow_rate,
        opposing_flow_rate,
        model_opposing_flow_rate,
        capacity,
    }
}
