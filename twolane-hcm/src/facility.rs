//! # Facility analysis
//!
//! Segments are analysed independently, in parallel by default.
//! Aggregation waits for every segment, eases the follower density of segments
//! downstream of a passing lane, and then weights the segment results by length.

use crate::density;
use crate::error::{Advisory, AnalysisError, ValidationError};
use crate::los::{self, Los, LosCategory, LosInputs};
use crate::model::{FacilityDescriptor, FacilityParams, PassingType, SegmentDescriptor};
use crate::segment::{Segment, Stage};
use rayon::prelude::*;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Runs the segment pipelines on the rayon thread pool.
    pub parallel: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Facility-wide results.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityResults {
    /// Total length (mi).
    pub length: f64,
    /// Length-weighted follower density (followers/mi/ln), after downstream adjustments.
    pub follower_density: f64,
    /// Length-weighted average travel speed (mph).
    pub average_speed: f64,
    pub los: Los,
    /// Follower density of each segment as eased by the nearest upstream passing lane.
    ///
    /// `None` for passing lanes and for segments no passing lane reaches.
    pub adjusted_follower_densities: Vec<Option<f64>>,
    /// Advisories of every segment, in segment order.
    pub advisories: Vec<Advisory>,
}

/// A two-lane highway facility: an ordered sequence of directional segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    params: FacilityParams,
    segments: Vec<Segment>,
}

impl Facility {
    /// Validates the parameters and every segment.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, in segment order.
    pub fn new(
        params: FacilityParams,
        segments: Vec<SegmentDescriptor>,
    ) -> Result<Self, ValidationError> {
        params.validate()?;
        if segments.is_empty() {
            return Err(ValidationError::new(
                "segments",
                "a facility needs at least one segment",
            ));
        }
        let segments = segments
            .iter()
            .enumerate()
            .map(|(i, descriptor)| Segment::new(i, descriptor, &params))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { params, segments })
    }

    /// # Errors
    ///
    /// See [`Facility::new`].
    pub fn from_descriptor(descriptor: FacilityDescriptor) -> Result<Self, ValidationError> {
        Self::new(descriptor.facility, descriptor.segments)
    }

    pub const fn params(&self) -> &FacilityParams {
        &self.params
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Total length (mi).
    pub fn length(&self) -> f64 {
        self.segments.iter().map(Segment::length).sum()
    }

    /// Discards the results of a previous analysis.
    pub fn reset(&mut self) {
        self.segments.iter_mut().for_each(Segment::reset);
    }

    /// Runs every segment's pipeline, then aggregates the results.
    ///
    /// # Errors
    ///
    /// Fails if a segment was already analysed (see [`Facility::reset`]).
    /// When several segments fail, the error of the first one is returned.
    pub fn analyze(&mut self, options: &AnalysisOptions) -> Result<FacilityResults, AnalysisError> {
        info!(
            segments = self.segments.len(),
            length = self.length(),
            parallel = options.parallel,
            "Analysing facility"
        );

        let outcomes: Vec<_> = if options.parallel {
            self.segments
                .par_iter_mut()
                .map(Segment::run_pipeline)
                .collect()
        } else {
            self.segments.iter_mut().map(Segment::run_pipeline).collect()
        };
        outcomes.into_iter().collect::<Result<Vec<_>, _>>()?;

        let results = self.aggregate()?;
        info!(
            los = %results.los,
            follower_density = results.follower_density,
            advisories = results.advisories.len(),
            "Facility analysed"
        );
        Ok(results)
    }

    /// Combines the segment results into facility results.
    ///
    /// The follower density of a segment downstream of a passing lane is scaled by
    /// [`density::downstream_decay`] at the segment's midpoint,
    /// measured from the end of the nearest upstream passing lane.
    ///
    /// # Errors
    ///
    /// Fails if any segment has not reached [`Stage::LosAssigned`].
    pub fn aggregate(&self) -> Result<FacilityResults, ValidationError> {
        let mut adjusted_follower_densities = Vec::with_capacity(self.segments.len());
        // Distance (mi) from the end of the last passing lane to the start of the segment
        let mut past_passing_lane: Option<f64> = None;
        let mut length = 0.0;
        let mut weighted_density = 0.0;
        let mut speed = 0.0;
        let mut free_flow_speed = 0.0;
        let mut flow_rate = 0.0;
        let mut speed_limit = 0.0;
        let mut any_failing = false;

        for segment in &self.segments {
            let not_analysed = |_| {
                ValidationError::new(
                    "stage",
                    format!(
                        "{} must be {} before aggregation",
                        segment.stage(),
                        Stage::LosAssigned
                    ),
                )
                .in_segment(segment.index())
            };
            let los = segment.los().map_err(not_analysed)?;
            let weight = segment.length();
            length += weight;
            let follower_density = segment.follower_density().map_err(not_analysed)?.average;
            let adjusted = match (segment.passing_type(), past_passing_lane) {
                (PassingType::PassingLane, _) => {
                    past_passing_lane = Some(0.0);
                    None
                }
                (_, Some(distance)) => {
                    past_passing_lane = Some(distance + weight);
                    let effective_length = self.params.downstream_effective_length;
                    (distance < effective_length.unwrap_or_else(density::default_effective_length))
                        .then(|| {
                            follower_density
                                * density::downstream_decay(distance + weight / 2.0, effective_length)
                        })
                }
                (_, None) => None,
            };
            adjusted_follower_densities.push(adjusted);
            weighted_density += weight * adjusted.unwrap_or(follower_density);
            speed += weight * segment.average_speed().map_err(not_analysed)?;
            free_flow_speed += weight * segment.free_flow_speed().map_err(not_analysed)?.adjusted;
            flow_rate += weight * segment.demand_flow().map_err(not_analysed)?.flow_rate;
            speed_limit += weight * segment.inputs().speed_limit;
            any_failing |= los == Los::F;
        }

        let follower_density = weighted_density / length;
        let average_speed = speed / length;
        let los = los::classify(
            LosCategory::Facility,
            &LosInputs {
                follower_density,
                average_speed,
                free_flow_speed: free_flow_speed / length,
                flow_rate: flow_rate / length,
                speed_limit: speed_limit / length,
                over_capacity: any_failing,
            },
        );

        Ok(FacilityResults {
            length,
            follower_density,
            average_speed,
            los,
            adjusted_follower_densities,
            advisories: self
                .segments
                .iter()
                .flat_map(|segment| segment.advisories().iter().cloned())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdvisoryKind;
    use crate::model::{PassingType, SubSegmentDescriptor};
    use proptest::prelude::*;

    fn params() -> FacilityParams {
        FacilityParams {
            lane_width: 12.0,
            shoulder_width: 6.0,
            access_point_density: 2.0,
            ..Default::default()
        }
    }

    fn descriptor(passing_type: u8, length: f64) -> SegmentDescriptor {
        SegmentDescriptor {
            passing_type,
            length,
            grade: 1.0,
            speed_limit: 55.0,
            volume: 512.0,
            opposing_volume: Some(512.0),
            peak_hour_factor: Some(0.94),
            percent_heavy_vehicles: Some(8.0),
            ..Default::default()
        }
    }

    fn facility(segments: Vec<SegmentDescriptor>) -> Facility {
        let Ok(facility) = Facility::new(params(), segments) else {
            panic!("Expected a valid facility");
        };
        facility
    }

    #[test]
    fn constrained_then_passing_zone() {
        let mut facility = facility(vec![descriptor(0, 0.16), descriptor(1, 0.64)]);
        let Ok(results) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        assert!(
            facility
                .segments()
                .iter()
                .all(|s| s.stage() == Stage::LosAssigned)
        );
        assert_eq!(results.los, Los::C);
        assert!((results.length - 0.8).abs() < 1e-12);
        assert!((results.follower_density - 5.097).abs() < 1e-3);
        assert!((results.average_speed - 59.372).abs() < 1e-3);

        let segments = facility.segments();
        assert_eq!(segments[0].los(), Ok(Los::C));
        assert_eq!(segments[1].los(), Ok(Los::C));
        let (Ok(first), Ok(second)) = (
            segments[0].follower_density(),
            segments[1].follower_density(),
        ) else {
            panic!("Expected follower densities");
        };
        assert!((first.average - 5.412).abs() < 1e-3);
        assert!((second.average - 5.018).abs() < 1e-3);
        assert_eq!(results.adjusted_follower_densities, vec![None, None]);
        assert!(
            (results.follower_density - (0.16 * first.average + 0.64 * second.average) / 0.8)
                .abs()
                < 1e-12
        );

        // The first segment is shorter than its models are calibrated for
        assert_eq!(results.advisories.len(), 1);
        assert!(matches!(
            results.advisories[0].kind,
            AdvisoryKind::LookupOutOfRange {
                table: "segment_length_limits",
                ..
            }
        ));
        assert_eq!(results.advisories[0].segment, 0);
    }

    #[test]
    fn passing_lane_eases_downstream_density() {
        let downstream = descriptor(0, 1.0);
        let mut alone = facility(vec![downstream.clone()]);
        let mut after_lane = facility(vec![descriptor(2, 1.5), downstream.clone(), downstream]);
        let (Ok(alone_results), Ok(results)) = (
            alone.analyze(&AnalysisOptions::default()),
            after_lane.analyze(&AnalysisOptions::default()),
        ) else {
            panic!("Expected both analyses to succeed");
        };

        // The segment's own results don't depend on its neighbours
        let (Ok(unadjusted), Ok(same)) = (
            alone.segments()[0].follower_density(),
            after_lane.segments()[1].follower_density(),
        ) else {
            panic!("Expected follower densities");
        };
        assert!((unadjusted.average - same.average).abs() < 1e-12);
        assert_eq!(alone_results.adjusted_follower_densities, vec![None]);

        let [None, Some(first), Some(second)] = results.adjusted_follower_densities[..] else {
            panic!("Expected both segments past the passing lane to be adjusted");
        };
        let decay = density::downstream_decay(0.5, None);
        assert!((decay - 0.646_37).abs() < 1e-4);
        assert!((first - unadjusted.average * decay).abs() < 1e-9);
        assert!(first < second && second < unadjusted.average);

        let Ok(lane) = after_lane.segments()[0].follower_density() else {
            panic!("Expected the passing lane density");
        };
        let expected = (1.5 * lane.average + first + second) / 3.5;
        assert!((results.follower_density - expected).abs() < 1e-9);
    }

    #[test]
    fn easing_stops_after_the_effective_length() {
        let Ok(mut facility) = Facility::new(
            FacilityParams {
                downstream_effective_length: Some(0.8),
                ..params()
            },
            vec![descriptor(2, 1.5), descriptor(0, 1.0), descriptor(0, 1.0)],
        ) else {
            panic!("Expected a valid facility");
        };
        let Ok(results) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        assert!(results.adjusted_follower_densities[1].is_some());
        assert_eq!(results.adjusted_follower_densities[2], None);
    }

    #[test]
    fn subsegments_must_cover_the_segment() {
        let short = SegmentDescriptor {
            subsegments: vec![
                SubSegmentDescriptor {
                    length: 0.3,
                    ..Default::default()
                },
                SubSegmentDescriptor {
                    length: 0.3,
                    design_radius: Some(1000.0),
                    superelevation: Some(0.06),
                    ..Default::default()
                },
            ],
            ..descriptor(1, 0.64)
        };
        let Err(error) = Facility::new(params(), vec![descriptor(0, 0.16), short]) else {
            panic!("Expected a validation error");
        };
        assert_eq!(error.segment, Some(1));
        assert_eq!(error.field, "subsegments");
    }

    #[test]
    fn rejects_empty_and_invalid_facilities() {
        let Err(error) = Facility::new(params(), vec![]) else {
            panic!("Expected a validation error");
        };
        insta::assert_snapshot!(error, @"invalid segments: a facility needs at least one segment");

        let Err(error) = Facility::new(
            FacilityParams {
                lane_width: 14.0,
                ..params()
            },
            vec![descriptor(0, 1.0)],
        ) else {
            panic!("Expected a validation error");
        };
        assert_eq!(error.field, "lane_width");
    }

    #[test]
    fn aggregation_waits_for_every_segment() {
        let facility = facility(vec![descriptor(0, 0.5), descriptor(1, 0.5)]);
        let Err(error) = facility.aggregate() else {
            panic!("Expected aggregation to fail");
        };
        insta::assert_snapshot!(error, @"segment 0: invalid stage: Created must be LosAssigned before aggregation");
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let segments: Vec<_> = (0..12)
            .map(|i| SegmentDescriptor {
                volume: 300.0 + 50.0 * f64::from(i),
                grade: f64::from(i % 5) - 2.0,
                ..descriptor(i % 3, 0.5 + 0.1 * f64::from(i))
            })
            .collect();
        let mut parallel = facility(segments.clone());
        let mut sequential = facility(segments);

        let parallel_results = parallel.analyze(&AnalysisOptions { parallel: true });
        let sequential_results = sequential.analyze(&AnalysisOptions { parallel: false });
        assert!(parallel_results.is_ok());
        assert_eq!(parallel_results, sequential_results);
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn reanalysis_requires_reset() {
        let mut facility = facility(vec![descriptor(0, 1.0)]);
        let Ok(first) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        assert!(matches!(
            facility.analyze(&AnalysisOptions::default()),
            Err(AnalysisError::Sequencing(_))
        ));
        facility.reset();
        assert_eq!(facility.analyze(&AnalysisOptions::default()), Ok(first));
    }

    #[test]
    fn over_capacity_fails_the_facility() {
        let mut facility = facility(vec![
            descriptor(0, 1.0),
            SegmentDescriptor {
                volume: 1700.0,
                peak_hour_factor: Some(0.85),
                ..descriptor(0, 1.0)
            },
        ]);
        let Ok(results) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        assert_eq!(facility.segments()[1].los(), Ok(Los::F));
        assert_eq!(results.los, Los::F);
    }

    #[test]
    fn example_facility_fixture() {
        let Ok(descriptor) = serde_json::from_str::<FacilityDescriptor>(include_str!(
            "../fixtures/example_facility.json"
        )) else {
            panic!("Expected the fixture to parse");
        };
        let Ok(mut facility) = Facility::from_descriptor(descriptor) else {
            panic!("Expected a valid facility");
        };
        let Ok(results) = facility.analyze(&AnalysisOptions::default()) else {
            panic!("Expected the analysis to succeed");
        };
        assert_eq!(facility.segments().len(), 3);
        assert_eq!(
            facility.segments()[2].passing_type(),
            PassingType::PassingConstrained
        );
        assert!((results.length - 1.8).abs() < 1e-9);
        assert!((results.follower_density - 5.554).abs() < 1e-3);
        assert!((results.average_speed - 57.400).abs() < 1e-3);
        assert_eq!(results.los, Los::C);
    }

    proptest! {
        #[test]
        fn results_within_bounds(
            passing_type in 0u8..=2,
            length in 0.25..3.0f64,
            grade in -6.0..6.0f64,
            speed_limit in 40.0..70.0f64,
            volume in 50.0..1000.0f64,
            opposing_volume in 0.0..1000.0f64,
            percent_heavy_vehicles in 0.0..20.0f64,
        ) {
            let mut facility = facility(vec![SegmentDescriptor {
                passing_type,
                length,
                grade,
                speed_limit,
                volume,
                opposing_volume: Some(opposing_volume),
                percent_heavy_vehicles: Some(percent_heavy_vehicles),
                ..Default::default()
            }]);
            let Ok(results) = facility.analyze(&AnalysisOptions { parallel: false }) else {
                panic!("Expected the analysis to succeed");
            };
            let segment = &facility.segments()[0];
            let (Ok(pf), Ok(fd), Ok(speed), Ok(ffs)) = (
                segment.percent_followers(),
                segment.follower_density(),
                segment.average_speed(),
                segment.free_flow_speed(),
            ) else {
                panic!("Expected every result to be set");
            };
            prop_assert!((0.0..=100.0).contains(&pf));
            prop_assert!(fd.average >= 0.0 && fd.average.is_finite());
            prop_assert!(speed >= 0.0 && speed <= ffs.adjusted);
            prop_assert!((results.length - length).abs() < 1e-12);
        }

        #[test]
        fn density_rises_with_demand(
            passing_type in 0u8..=1,
            length in 0.25..3.0f64,
            grade in -6.0..6.0f64,
            speed_limit in 40.0..70.0f64,
            volume in 50.0..900.0f64,
            step in 1.0..100.0f64,
            opposing_volume in 0.0..1000.0f64,
            percent_heavy_vehicles in 0.0..20.0f64,
        ) {
            let analyse = |volume: f64| {
                let mut facility = facility(vec![SegmentDescriptor {
                    passing_type,
                    length,
                    grade,
                    speed_limit,
                    volume,
                    opposing_volume: Some(opposing_volume),
                    percent_heavy_vehicles: Some(percent_heavy_vehicles),
                    ..Default::default()
                }]);
                let Ok(_) = facility.analyze(&AnalysisOptions { parallel: false }) else {
                    panic!("Expected the analysis to succeed");
                };
                let segment = &facility.segments()[0];
                let (Ok(pf), Ok(fd)) = (segment.percent_followers(), segment.follower_density())
                else {
                    panic!("Expected every result to be set");
                };
                (pf, fd.average)
            };
            let (pf_lower, fd_lower) = analyse(volume);
            let (pf_higher, fd_higher) = analyse(volume + step);
            prop_assert!(pf_higher >= pf_lower - 1e-9);
            prop_assert!(fd_higher >= fd_lower - 1e-9);
        }
    }
}
