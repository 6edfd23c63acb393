//! Serializable reports of two-lane highway facility analyses.
//!
//! Results that don't apply (or haven't been computed yet) are left out of the output.

use serde::{Deserialize, Serialize};
use twolane_hcm::{Facility, FacilityResults, Los, Segment};

/// Measures are reported to two decimal places.
fn rounded(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The results of a single directional segment.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SegmentReport {
    /// Position of the segment in the direction of travel.
    pub index: usize,
    /// `PC`, `PZ` or `PL`.
    pub passing_type: String,
    /// Length (mi).
    pub length: f64,
    /// The last pipeline stage the segment completed.
    pub stage: String,
    pub vertical_class: Option<u8>,
    /// Demand flow rate (veh/h).
    pub flow_rate: Option<f64>,
    /// Opposing demand flow rate (veh/h).
    pub opposing_flow_rate: Option<f64>,
    /// Capacity (veh/h).
    pub capacity: Option<f64>,
    /// Free-flow speed (mph).
    pub free_flow_speed: Option<f64>,
    /// Average travel speed (mph).
    pub average_speed: Option<f64>,
    /// Length-weighted share of the base free-flow speed lost to curves.
    ///
    /// Only included for segments with horizontal curves.
    pub curve_speed_reduction: Option<f64>,
    pub percent_followers: Option<f64>,
    /// Segment-average follower density (followers/mi/ln).
    pub follower_density: Option<f64>,
    /// Follower density halfway along the segment.
    ///
    /// Only included for passing lanes.
    pub mid_segment_follower_density: Option<f64>,
    /// Follower density eased by an upstream passing lane.
    ///
    /// Only included for segments within reach of a passing lane.
    pub adjusted_follower_density: Option<f64>,
    pub los: Option<Los>,
}

impl SegmentReport {
    pub fn from_segment(segment: &Segment) -> Self {
        let demand = segment.demand_flow().ok();
        let density = segment.follower_density().ok();
        Self {
            index: segment.index(),
            passing_type: segment.passing_type().to_string(),
            length: segment.length(),
            stage: segment.stage().to_string(),
            vertical_class: segment
                .vertical_classification()
                .ok()
                .map(|v| v.class.number()),
            flow_rate: demand.map(|d| rounded(d.flow_rate)),
            opposing_flow_rate: demand.map(|d| rounded(d.opposing_flow_rate)),
            capacity: demand.map(|d| rounded(d.capacity)),
            free_flow_speed: segment.free_flow_speed().ok().map(|s| rounded(s.adjusted)),
            average_speed: segment.average_speed().ok().map(rounded),
            curve_speed_reduction: segment
                .horizontal_alignment()
                .ok()
                .filter(|alignment| !alignment.is_tangent())
                .map(|alignment| rounded(alignment.weighted_reduction)),
            percent_followers: segment.percent_followers().ok().map(rounded),
            follower_density: density.map(|d| rounded(d.average)),
            mid_segment_follower_density: density.and_then(|d| d.mid_segment).map(rounded),
            adjusted_follower_density: None,
            los: segment.los().ok(),
        }
    }
}

/// The results of a facility and all of its segments.
#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FacilityReport {
    /// Total length (mi).
    pub length: f64,
    /// Length-weighted follower density (followers/mi/ln).
    ///
    /// Only included once every segment has been analysed.
    pub follower_density: Option<f64>,
    /// Length-weighted average travel speed (mph).
    ///
    /// Only included once every segment has been analysed.
    pub average_speed: Option<f64>,
    pub los: Option<Los>,
    pub segments: Vec<SegmentReport>,
    /// Inputs the methodology is not calibrated for, and how they were handled.
    pub advisories: Vec<String>,
}

impl FacilityReport {
    /// Reports a facility, whether or not it has been analysed.
    pub fn from_facility(facility: &Facility) -> Self {
        match facility.aggregate() {
            Ok(results) => Self::from_results(facility, &results),
            Err(_) => Self {
                length: facility.length(),
                follower_density: None,
                average_speed: None,
                los: None,
                segments: facility
                    .segments()
                    .iter()
                    .map(SegmentReport::from_segment)
                    .collect(),
                advisories: facility
                    .segments()
                    .iter()
                    .flat_map(Segment::advisories)
                    .map(ToString::to_string)
                    .collect(),
            },
        }
    }

    /// Reports an analysed facility from the results of its aggregation.
    pub fn from_results(facility: &Facility, results: &FacilityResults) -> Self {
        let segments = facility
            .segments()
            .iter()
            .zip(&results.adjusted_follower_densities)
            .map(|(segment, adjusted)| SegmentReport {
                adjusted_follower_density: adjusted.map(rounded),
                ..SegmentReport::from_segment(segment)
            })
            .collect();
        Self {
            length: results.length,
            follower_density: Some(rounded(results.follower_density)),
            average_speed: Some(rounded(results.average_speed)),
            los: Some(results.los),
            segments,
            advisories: results.advisories.iter().map(ToString::to_string).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twolane_hcm::{AnalysisOptions, FacilityParams, SegmentDescriptor};

    fn segment(passing_type: u8, length: f64) -> SegmentDescriptor {
        SegmentDescriptor {
            passing_type,
            length,
            grade: 0.0,
            speed_limit: 50.0,
            volume: 752.0,
            opposing_volume: Some(500.0),
            peak_hour_factor: Some(0.94),
            percent_heavy_vehicles: Some(5.0),
            ..Default::default()
        }
    }

    fn facility() -> Facility {
        let segment = SegmentDescriptor {
            opposing_volume: None,
            ..segment(0, 0.75)
        };
        let Ok(facility) = Facility::new(FacilityParams::default(), vec![segment]) else {
            panic!("Expected a valid facility");
        };
        facility
    }

    #[test]
    fn unanalysed_facility() {
        let report = FacilityReport::from_facility(&facility());
        let Ok(json) = serde_json::to_string_pretty(&report) else {
            panic!("Expected the report to serialize");
        };
        insta::assert_snapshot!(json, @r#"
        {
          "length": 0.75,
          "segments": [
            {
              "index": 0,
              "passing_type": "PC",
              "length": 0.75,
              "stage": "Created"
            }
          ],
          "advisories": []
        }
        "#);
    }

    #[test]
    fn analysed_segment() {
        let mut facility = facility();
        let Ok(_) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        let report = FacilityReport::from_facility(&facility);
        assert_eq!(report.los, Some(Los::D));
        assert!(
            report
                .follower_density
                .is_some_and(|fd| (fd - 10.1).abs() < 1e-9)
        );
        assert!(report.advisories.is_empty());

        let Ok(json) = serde_json::to_string_pretty(&report.segments[0]) else {
            panic!("Expected the report to serialize");
        };
        insta::assert_snapshot!(json, @r#"
        {
          "index": 0,
          "passing_type": "PC",
          "length": 0.75,
          "stage": "LosAssigned",
          "vertical_class": 1,
          "flow_rate": 800.0,
          "opposing_flow_rate": 0.0,
          "capacity": 1700.0,
          "free_flow_speed": 56.83,
          "average_speed": 53.63,
          "percent_followers": 67.71,
          "follower_density": 10.1,
          "los": "D"
        }
        "#);
    }

    #[test]
    fn report_from_analysis_results() {
        let Ok(mut facility) = Facility::new(
            FacilityParams::default(),
            vec![segment(2, 1.5), segment(0, 1.0)],
        ) else {
            panic!("Expected a valid facility");
        };
        let Ok(results) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        let report = FacilityReport::from_results(&facility, &results);
        assert_eq!(report, FacilityReport::from_facility(&facility));
        assert_eq!(report.los, Some(results.los));

        let [lane, downstream] = &report.segments[..] else {
            panic!("Expected two segment reports");
        };
        assert!(lane.mid_segment_follower_density.is_some());
        assert_eq!(lane.adjusted_follower_density, None);
        let (Some(adjusted), Some(unadjusted)) = (
            downstream.adjusted_follower_density,
            downstream.follower_density,
        ) else {
            panic!("Expected the downstream segment to be adjusted");
        };
        assert!(adjusted < unadjusted);
    }

    #[test]
    fn round_trip() {
        let report = FacilityReport::from_facility(&facility());
        let Ok(json) = serde_json::to_string(&report) else {
            panic!("Expected the report to serialize");
        };
        let Ok(parsed) = serde_json::from_str::<FacilityReport>(&json) else {
            panic!("Expected the report to parse");
        };
        assert_eq!(parsed, report);
    }
}
