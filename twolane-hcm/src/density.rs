//! # Follower density
//!
//! Followers per mile per lane, the primary service measure. On passing lanes the flow is
//! split between the two lanes, and the platoons broken up by the lane keep
//! improving conditions for some distance downstream.

/// Speeds below this (mph) are treated as this for density purposes.
const MIN_DENSITY_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FollowerDensity {
    /// Segment-average density, the value the facility aggregates.
    pub average: f64,
    /// Single-stream density of the traffic entering the segment.
    pub entry: f64,
    /// Density halfway along a passing lane.
    pub mid_segment: Option<f64>,
}

/// `PF * v_d / (100 * S)`, in followers/mi/ln.
pub fn single_stream(percent_followers: f64, flow_rate: f64, speed: f64) -> f64 {
    if flow_rate <= 0.0 {
        return 0.0;
    }
    (percent_followers * flow_rate / (100.0 * speed.max(MIN_DENSITY_SPEED))).max(0.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneDemand {
    /// veh/h
    pub flow_rate: f64,
    pub percent_heavy_vehicles: f64,
}

/// Demand on the faster and slower lanes of a passing lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneSplit {
    pub faster: LaneDemand,
    pub slower: LaneDemand,
}

/// Splits a passing lane's demand between its lanes.
///
/// `faster_lane_share` is the faster lane's heavy vehicle percentage as a share of
/// the segment's.
pub fn split_lanes(flow_rate: f64, percent_heavy_vehicles: f64, faster_lane_share: f64) -> LaneSplit {
    let heavy_vehicles = (flow_rate * percent_heavy_vehicles / 100.0).ceil();
    let faster_share =
        (0.92183 - 0.05022 * flow_rate.ln() - 0.0003 * heavy_vehicles).clamp(0.0, 1.0);
    let faster_flow = (flow_rate * faster_share).ceil();
    let slower_flow = (flow_rate * (1.0 - faster_share)).ceil().max(0.0);

    let faster_hv = percent_heavy_vehicles * faster_lane_share;
    let slower_hv = if slower_flow > 0.0 {
        let slower_heavy_vehicles = (heavy_vehicles - faster_flow * faster_hv / 100.0).ceil();
        (slower_heavy_vehicles / slower_flow * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    LaneSplit {
        faster: LaneDemand {
            flow_rate: faster_flow,
            percent_heavy_vehicles: faster_hv,
        },
        slower: LaneDemand {
            flow_rate: slower_flow,
            percent_heavy_vehicles: slower_hv,
        },
    }
}

/// Average speed difference between the faster and slower lanes (mph).
pub fn speed_differential(flow_rate: f64, percent_heavy_vehicles: f64) -> f64 {
    2.750 + 0.00056 * flow_rate + 3.8521 * percent_heavy_vehicles / 100.0
}

/// Speed and percent followers of one lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneTraffic {
    pub flow_rate: f64,
    pub speed: f64,
    pub percent_followers: f64,
}

/// Density halfway along a passing lane, averaged over both lanes.
pub fn mid_segment(faster: &LaneTraffic, slower: &LaneTraffic, differential: f64) -> f64 {
    let faster_speed = (faster.speed + differential / 2.0).max(MIN_DENSITY_SPEED);
    let slower_speed = (slower.speed - differential / 2.0).max(MIN_DENSITY_SPEED);
    ((faster.percent_followers * faster.flow_rate / faster_speed
        + slower.percent_followers * slower.flow_rate / slower_speed)
        / 200.0)
        .max(0.0)
}

/// Distance (mi) at which the improvements downstream of a passing lane have decayed to zero.
pub fn default_effective_length() -> f64 {
    (27.0_f64 / 8.75).exp()
}

/// `(I_PF, I_S)`, the percent improvements to percent followers and speed at `distance` (mi)
/// downstream of a passing lane.
pub fn downstream_improvement(distance: f64, effective_length: Option<f64>) -> (f64, f64) {
    if distance >= effective_length.unwrap_or_else(default_effective_length) {
        return (0.0, 0.0);
    }
    let log_distance = distance.max(0.1).ln();
    (
        (27.0 - 8.75 * log_distance).max(0.0),
        (3.0 - 0.8 * log_distance).max(0.0),
    )
}

/// The factor applied to the entry density at `distance` (mi) downstream of a passing lane.
pub fn downstream_decay(distance: f64, effective_length: Option<f64>) -> f64 {
    let (followers, speed) = downstream_improvement(distance, effective_length);
    (1.0 - followers / 100.0) / (1.0 + speed / 100.0)
}

/// Segment-average density of a passing lane.
pub fn passing_lane(
    entry: f64,
    mid_segment: f64,
    length: f64,
    effective_length: Option<f64>,
) -> FollowerDensity {
    let average =
        (0.5 * (mid_segment + entry * downstream_decay(length / 2.0, effective_length))).max(0.0);
    FollowerDensity {
        average,
        entry,
        mid_segment: Some(mid_segment),
    }
}
