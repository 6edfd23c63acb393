//! # Calibration tables
//!
//! Coefficients and lookup tables of the two-lane highway methodology (HCM 7th edition,
//! chapter 15). Arrays indexed by vertical class use [`VerticalClass::index`].
//!
//! [`VerticalClass::index`]: crate::VerticalClass::index

use crate::breakpoints::Breakpoints;

/// Recommended `(min, max)` segment lengths (mi), by vertical class then
/// passing type (PC, PZ, PL).
pub static SEGMENT_LENGTH_LIMITS: [[(f64, f64); 3]; 5] = [
    [(0.25, 3.0), (0.25, 2.0), (0.5, 3.0)],
    [(0.25, 3.0), (0.25, 2.0), (0.5, 3.0)],
    [(0.25, 1.1), (0.25, 1.1), (0.5, 1.1)],
    [(0.5, 3.0), (0.5, 2.0), (0.5, 3.0)],
    [(0.5, 3.0), (0.5, 2.0), (0.5, 3.0)],
];

/// A band of segment lengths and the grades (%) at which classes 2 through 5 begin.
///
/// A class that doesn't occur in the band is marked with infinity.
#[derive(Debug, Clone, Copy)]
pub struct VerticalBand {
    /// Inclusive lower bound of the band (mi).
    pub min_length: f64,
    pub class_thresholds: [f64; 4],
}

const NEVER: f64 = f64::INFINITY;

const fn band(min_length: f64, class_thresholds: [f64; 4]) -> VerticalBand {
    VerticalBand {
        min_length,
        class_thresholds,
    }
}

/// Vertical alignment classes for upgrades, by ascending length band.
pub static UPGRADE_BANDS: [VerticalBand; 8] = [
    band(0.0, [7.0, NEVER, NEVER, NEVER]),
    band(0.1, [4.0, 7.0, NEVER, NEVER]),
    band(0.2, [3.0, 5.0, 7.0, 9.0]),
    band(0.3, [2.0, 4.0, 6.0, 7.0]),
    band(0.4, [2.0, 4.0, 5.0, 6.0]),
    band(0.5, [2.0, 3.0, 4.0, 6.0]),
    band(0.8, [2.0, 3.0, 4.0, 5.0]),
    band(1.1, [2.0, NEVER, 3.0, 5.0]),
];

/// Vertical alignment classes for downgrades (absolute grade), by ascending length band.
pub static DOWNGRADE_BANDS: [VerticalBand; 10] = [
    band(0.0, [8.0, NEVER, NEVER, NEVER]),
    band(0.1, [5.0, 8.0, NEVER, NEVER]),
    band(0.2, [4.0, 6.0, 8.0, 9.0]),
    band(0.3, [2.0, 5.0, 6.0, 8.0]),
    band(0.4, [3.0, 4.0, 6.0, 7.0]),
    band(0.5, [3.0, 4.0, 5.0, 6.0]),
    band(0.7, [NEVER, 3.0, 4.0, 6.0]),
    band(0.8, [NEVER, 3.0, 4.0, 5.0]),
    band(0.9, [2.0, 3.0, 4.0, 5.0]),
    band(1.1, [2.0, NEVER, 3.0, 5.0]),
];

/// Passenger car equivalents of a heavy vehicle, by vertical class.
pub static HEAVY_VEHICLE_EQUIVALENTS: [f64; 5] = [1.0, 1.5, 2.0, 2.5, 3.0];

/// Capacity (veh/h) of passing-constrained and passing-zone segments.
pub const BASE_CAPACITY: f64 = 1700.0;

/// Opposing flow rate (veh/h) the models assume where passing is prohibited.
pub const CONSTRAINED_OPPOSING_FLOW: f64 = 1500.0;

/// Base capacity (veh/h) of a passing lane segment.
pub fn passing_lane_capacity(percent_heavy_vehicles: f64, vertical_class: u8) -> f64 {
    match percent_heavy_vehicles {
        p if p < 10.0 => 1500.0,
        p if p < 15.0 => {
            if vertical_class <= 3 {
                1400.0
            } else {
                1300.0
            }
        }
        p if p < 20.0 => {
            if vertical_class <= 4 {
                1300.0
            } else {
                1200.0
            }
        }
        p if p < 25.0 => match vertical_class {
            0..=3 => 1300.0,
            4 => 1200.0,
            _ => 1100.0,
        },
        _ => 1100.0,
    }
}

/// Base free-flow speed (mph) by posted speed limit (mph).
pub static BASE_FREE_FLOW_SPEED: Breakpoints = Breakpoints::new(&[
    (25.0, 28.5),
    (30.0, 34.2),
    (35.0, 39.9),
    (40.0, 45.6),
    (45.0, 51.3),
    (50.0, 57.0),
    (55.0, 62.7),
    (60.0, 68.4),
    (65.0, 74.1),
    (70.0, 79.8),
    (75.0, 85.5),
]);

/// Minimum curve radius (ft) by posted speed limit (mph).
pub static MINIMUM_CURVE_RADIUS: Breakpoints = Breakpoints::new(&[
    (15.0, 50.0),
    (20.0, 90.0),
    (25.0, 170.0),
    (30.0, 230.0),
    (35.0, 340.0),
    (40.0, 430.0),
    (45.0, 560.0),
    (50.0, 710.0),
    (55.0, 835.0),
    (60.0, 1000.0),
    (65.0, 1150.0),
    (70.0, 1310.0),
    (75.0, 1560.0),
    (80.0, 1810.0),
]);

/// A band of curve radii (ft) and its horizontal classes.
///
/// Curves in the band with a superelevation (%) below `superelevation_limit` get
/// `class_below`; the rest get `class_at_or_above`.
#[derive(Debug, Clone, Copy)]
pub struct RadiusBand {
    /// Inclusive lower bound of the band.
    pub min_radius: f64,
    pub superelevation_limit: f64,
    pub class_below: u8,
    pub class_at_or_above: u8,
}

const fn radius(
    min_radius: f64,
    superelevation_limit: f64,
    class_below: u8,
    class_at_or_above: u8,
) -> RadiusBand {
    RadiusBand {
        min_radius,
        superelevation_limit,
        class_below,
        class_at_or_above,
    }
}

/// Horizontal class by radius and superelevation, by ascending radius.
pub static RADIUS_BANDS: [RadiusBand; 17] = [
    radius(0.0, 0.0, 5, 5),
    radius(300.0, 0.0, 4, 4),
    radius(450.0, 1.0, 4, 3),
    radius(600.0, 6.0, 3, 2),
    radius(750.0, 0.0, 2, 2),
    radius(900.0, 8.0, 2, 1),
    radius(1050.0, 4.0, 2, 1),
    radius(1200.0, 2.0, 2, 1),
    radius(1350.0, 0.0, 1, 1),
    radius(1500.0, 8.0, 1, 0),
    radius(1750.0, 6.0, 1, 0),
    radius(1800.0, 5.0, 1, 0),
    radius(1950.0, 4.0, 1, 0),
    radius(2100.0, 3.0, 1, 0),
    radius(2250.0, 2.0, 1, 0),
    radius(2400.0, 1.0, 1, 0),
    radius(2550.0, 0.0, 0, 0),
];

/// Superelevation domain (%) of [`RADIUS_BANDS`].
pub const SUPERELEVATION_DOMAIN: (f64, f64) = (0.0, 10.0);

/// Coefficients `a0..a5` of the heavy vehicle adjustment to free-flow speed, by vertical class.
pub static FREE_FLOW_COEFFICIENTS: [[f64; 6]; 5] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [-0.45036, 0.00814, 0.01543, 0.01358, 0.0, 0.0],
    [-0.29591, 0.00743, 0.0, 0.01246, 0.0, 0.0],
    [-0.40902, 0.00975, 0.00767, -0.18363, 0.00423, 0.0],
    [-0.3836, 0.01074, 0.01945, -0.69848, 0.01069, 0.127],
];

/// Coefficients of the average speed model.
#[derive(Debug, Clone, Copy)]
pub struct SpeedCoefficients {
    /// `b0, b1, b2, b5` of the slope.
    pub b: [f64; 4],
    /// `c0..c3` of the length term `b3`.
    pub c: [f64; 4],
    /// `d0..d3` of the heavy vehicle term `b4`.
    pub d: [f64; 4],
    /// `f0..f8` of the power.
    pub f: [f64; 9],
}

const fn speed(b: [f64; 4], c: [f64; 4], d: [f64; 4], f: [f64; 9]) -> SpeedCoefficients {
    SpeedCoefficients { b, c, d, f }
}

/// Average speed coefficients for passing-constrained and passing-zone segments.
pub static SPEED_COEFFICIENTS: [SpeedCoefficients; 5] = [
    speed(
        [0.0558, 0.0542, 0.3278, 0.0],
        [0.1029, 0.0, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0],
        [0.67576, 0.0, 0.0, 0.12060, -0.35919, 0.0, 0.0, 0.0, 0.0],
    ),
    speed(
        [5.7280, -0.0809, 0.7404, 3.1155],
        [-13.8036, 0.0, 0.2446, 0.0],
        [-1.7765, 0.0, 0.0392, 0.0],
        [
            0.34524, 0.00591, 0.02031, 0.14911, -0.43784, -0.00296, 0.02956, 0.0, 0.41622,
        ],
    ),
    speed(
        [9.3079, -0.1706, 1.1292, 3.1155],
        [-11.9703, 0.0, 0.2542, 0.0],
        [-3.5550, 0.0, 0.0826, 0.0],
        [
            0.17291, 0.00917, 0.05698, 0.27734, -0.61893, -0.00918, 0.09184, 0.0, 0.41622,
        ],
    ),
    speed(
        [9.0115, -0.1994, 1.8252, 3.2685],
        [-12.5113, 0.0, 0.2656, 0.0],
        [-5.7775, 0.0, 0.1373, 0.0],
        [
            0.67689, 0.00534, -0.13037, 0.25699, -0.68465, -0.00709, 0.07087, 0.0, 0.33950,
        ],
    ),
    speed(
        [23.9144, -0.6925, 1.9473, 3.5115],
        [-14.8961, 0.0, 0.4370, 0.0],
        [-18.2910, 2.3875, 0.4494, -0.0520],
        [
            1.13262, 0.0, -0.26367, 0.18811, -0.64304, -0.00867, 0.08675, 0.0, 0.30590,
        ],
    ),
];

/// Average speed coefficients for passing lane segments.
pub static PASSING_LANE_SPEED_COEFFICIENTS: [SpeedCoefficients; 5] = [
    speed(
        [-1.1379, 0.0941, 0.0, 0.0],
        [0.0, 0.2667, 0.0, 0.0],
        [0.0, 0.1252, 0.0, 0.0],
        [
            0.91793, -0.00557, 0.36862, 0.0, 0.0, 0.00611, 0.0, -0.00419, 0.0,
        ],
    ),
    speed(
        [-2.0668, 0.1053, 0.0, 0.0],
        [0.0, 0.4479, 0.0, 0.0],
        [0.0, 0.1631, 0.0, 0.0],
        [0.65105, 0.0, 0.34931, 0.0, 0.0, 0.00722, 0.0, -0.00391, 0.0],
    ),
    speed(
        [-0.5074, 0.0935, 0.0, 0.0],
        [0.0, 0.0, 0.0, 0.0],
        [0.0, -0.2201, 0.0, 0.0072],
        [0.40117, 0.0, 0.68633, 0.0, 0.0, 0.02350, 0.0, -0.02088, 0.0],
    ),
    speed(
        [8.0354, -0.0860, 0.0, 4.1900],
        [-27.1244, 11.5196, 0.4681, -0.1873],
        [0.0, -0.7506, 0.0, 0.0193],
        [
            1.13282, -0.00798, 0.35425, 0.0, 0.0, 0.01521, 0.0, -0.00987, 0.0,
        ],
    ),
    speed(
        [7.2991, -0.3535, 0.0, 4.8700],
        [-45.3391, 17.3749, 1.0587, -0.3729],
        [3.8457, -0.9112, 0.0, 0.0170],
        [
            1.12077, -0.00550, 0.25431, 0.0, 0.0, 0.01269, 0.0, -0.01053, 0.0,
        ],
    ),
];

/// Coefficients of the percent followers model.
#[derive(Debug, Clone, Copy)]
pub struct FollowerCoefficients {
    /// Percent followers at capacity.
    pub at_capacity: [f64; 8],
    /// Percent followers at 25% of capacity.
    pub at_quarter_capacity: [f64; 8],
}

const fn followers(at_capacity: [f64; 8], at_quarter_capacity: [f64; 8]) -> FollowerCoefficients {
    FollowerCoefficients {
        at_capacity,
        at_quarter_capacity,
    }
}

/// Shape of the percent followers curve, `d1, d2` for the slope and `e0..e4` for the power.
#[derive(Debug, Clone, Copy)]
pub struct FollowerCurve {
    pub d: [f64; 2],
    pub e: [f64; 5],
}

/// Percent followers coefficients for passing-constrained and passing-zone segments.
pub static FOLLOWER_COEFFICIENTS: [FollowerCoefficients; 5] = [
    followers(
        [
            37.68080, 3.05089, -7.90866, -0.94321, 13.64266, -0.00050, -0.05500, 7.13758,
        ],
        [
            18.01780, 10.0, -21.6, -0.97853, 12.05214, -0.00750, -0.06700, 11.60405,
        ],
    ),
    followers(
        [
            58.21104, 5.73387, -13.66293, -0.66126, 9.08575, -0.00950, -0.03602, 7.14619,
        ],
        [
            47.83887, 12.8, -28.2, -0.61758, 5.8, -0.04550, -0.03344, 11.35573,
        ],
    ),
    followers(
        [
            113.20439, 10.01778, -18.9, 0.46542, -6.75338, -0.03, -0.058, 10.03239,
        ],
        [
            125.4, 19.5, -34.9, 0.90672, -16.1, -0.11, -0.062, 14.71136,
        ],
    ),
    followers(
        [
            58.29978, -0.53611, 7.35076, -0.27046, 4.49850, -0.011, -0.02968, 8.89680,
        ],
        [
            103.13534, 14.68459, -23.72704, 0.66444, -11.95763, -0.1, 0.00172, 14.56611,
        ],
    ),
    followers(
        [
            3.32968, -0.84377, 7.08952, -1.32089, 19.98477, -0.0125, -0.0296, 9.99453,
        ],
        [
            89.0, 19.02642, -34.54240, 0.29792, -6.62528, -0.16, 0.0048, 17.56611,
        ],
    ),
];

pub static FOLLOWER_CURVE: FollowerCurve = FollowerCurve {
    d: [-0.29764, -0.71917],
    e: [0.81165, 0.37920, -0.49524, -2.11289, 2.41146],
};

/// Percent followers coefficients for passing lane segments.
pub static PASSING_LANE_FOLLOWER_COEFFICIENTS: [FollowerCoefficients; 5] = [
    followers(
        [
            61.73075, 6.73922, -23.68853, -0.84126, 11.44533, -1.05124, 1.50390, 0.00491,
        ],
        [
            80.37105, 14.44997, -46.41831, -0.23367, 0.84914, -0.56747, 0.89427, 0.00119,
        ],
    ),
    followers(
        [
            12.30096, 9.57465, -30.79427, -1.79448, 25.76436, -0.66350, 1.26039, -0.00323,
        ],
        [
            18.37886, 14.71856, -47.78892, -1.43373, 18.32040, -0.13226, 0.77127, -0.00778,
        ],
    ),
    followers(
        [
            206.07369, -4.29885, 0.0, 1.96483, -30.32556, -0.75812, 1.06453, -0.00839,
        ],
        [
            239.98930, 15.90683, -46.87525, 2.73582, -42.88130, -0.53746, -0.76271, -0.00428,
        ],
    ),
    followers(
        [
            263.13428, 5.38749, -19.04859, 2.73018, -42.76919, -1.31277, -0.32242, 0.01412,
        ],
        [
            223.68435, 10.26908, -35.60830, 2.31877, -38.30034, -0.60275, -0.67758, 0.00117,
        ],
    ),
    followers(
        [
            126.95629, 5.95754, -19.22229, 0.43238, -7.35636, -1.03017, -2.66026, 0.01389,
        ],
        [
            137.37633, 11.00106, -38.89043, 0.78501, -14.88672, -0.72576, -2.49546, 0.00872,
        ],
    ),
];

pub static PASSING_LANE_FOLLOWER_CURVE: FollowerCurve = FollowerCurve {
    d: [-0.15808, -0.83732],
    e: [-1.63246, 1.64960, -4.45823, -4.89119, 10.33057],
};
