//! # Segment pipeline
//!
//! A segment advances through a fixed sequence of stages. Each stage writes exactly one
//! derived result, and may only run once its predecessor has.
//! Reading a result before its stage has run is an error rather than a default.

use crate::alignment::{self, HorizontalAlignment};
use crate::demand::{DemandFlow, DemandInputs, demand_flow};
use crate::density::{self, FollowerDensity, LaneTraffic};
use crate::error::{Advisory, AdvisoryKind, AdvisoryLog, SequencingError, ValidationError};
use crate::followers::FollowerModel;
use crate::los::{self, Los, LosCategory, LosInputs};
use crate::model::{
    FacilityParams, PassingType, SegmentDescriptor, SegmentInputs, VerticalClass,
};
use crate::speed::{
    self, FreeFlowInputs, FreeFlowSpeed, TangentSpeedModel, base_free_flow_speed,
};
use crate::vertical::{self, VerticalClassification};
use std::fmt::{Display, Formatter};
use tracing::debug;

/// Pipeline stages, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Created,
    VerticalClassified,
    FlowDetermined,
    AlignmentAdjusted,
    FreeFlowSpeedSet,
    AverageSpeedSet,
    PercentFollowersSet,
    FollowerDensitySet,
    LosAssigned,
}

impl Stage {
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Created => Some(Self::VerticalClassified),
            Self::VerticalClassified => Some(Self::FlowDetermined),
            Self::FlowDetermined => Some(Self::AlignmentAdjusted),
            Self::AlignmentAdjusted => Some(Self::FreeFlowSpeedSet),
            Self::FreeFlowSpeedSet => Some(Self::AverageSpeedSet),
            Self::AverageSpeedSet => Some(Self::PercentFollowersSet),
            Self::PercentFollowersSet => Some(Self::FollowerDensitySet),
            Self::FollowerDensitySet => Some(Self::LosAssigned),
            Self::LosAssigned => None,
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One directional segment of a facility, and the results of its analysis so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    index: usize,
    inputs: SegmentInputs,
    params: FacilityParams,
    stage: Stage,
    vertical: Option<VerticalClassification>,
    /// Length the regression models are evaluated at (mi).
    model_length: Option<f64>,
    demand: Option<DemandFlow>,
    alignment: Option<HorizontalAlignment>,
    free_flow_speed: Option<FreeFlowSpeed>,
    average_speed: Option<f64>,
    percent_followers: Option<f64>,
    follower_density: Option<FollowerDensity>,
    los: Option<Los>,
    advisories: AdvisoryLog,
}

impl Segment {
    /// Validates a descriptor into a segment at position `index` of its facility.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the segment and the offending field.
    pub fn new(
        index: usize,
        descriptor: &SegmentDescriptor,
        params: &FacilityParams,
    ) -> Result<Self, ValidationError> {
        let inputs = SegmentInputs::from_descriptor(index, descriptor, params)?;
        Ok(Self {
            index,
            inputs,
            params: *params,
            stage: Stage::Created,
            vertical: None,
            model_length: None,
            demand: None,
            alignment: None,
            free_flow_speed: None,
            average_speed: None,
            percent_followers: None,
            follower_density: None,
            los: None,
            advisories: AdvisoryLog::new(index),
        })
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn inputs(&self) -> &SegmentInputs {
        &self.inputs
    }

    pub const fn length(&self) -> f64 {
        self.inputs.length
    }

    pub const fn passing_type(&self) -> PassingType {
        self.inputs.passing_type
    }

    pub const fn stage(&self) -> Stage {
        self.stage
    }

    pub fn advisories(&self) -> &[Advisory] {
        self.advisories.entries()
    }

    /// Discards all results, so that the segment can be analysed afresh.
    pub fn reset(&mut self) {
        self.stage = Stage::Created;
        self.vertical = None;
        self.model_length = None;
        self.demand = None;
        self.alignment = None;
        self.free_flow_speed = None;
        self.average_speed = None;
        self.percent_followers = None;
        self.follower_density = None;
        self.los = None;
        self.advisories = AdvisoryLog::new(self.index);
    }

    fn advance(&mut self, to: Stage) -> Result<(), SequencingError> {
        if self.stage.next() == Some(to) {
            Ok(())
        } else {
            Err(SequencingError::OutOfOrder {
                segment: self.index,
                attempted: to,
                current: self.stage,
            })
        }
    }

    fn complete(&mut self, stage: Stage) {
        self.stage = stage;
        debug!(segment = self.index, stage = %stage, "Stage complete");
    }

    fn ready<T: Clone>(
        &self,
        value: Option<&T>,
        field: &'static str,
        required: Stage,
    ) -> Result<T, SequencingError> {
        value.cloned().ok_or(SequencingError::NotReady {
            segment: self.index,
            field,
            required,
        })
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the vertical class has been determined.
    pub fn vertical_classification(&self) -> Result<VerticalClassification, SequencingError> {
        self.ready(
            self.vertical.as_ref(),
            "vertical_class",
            Stage::VerticalClassified,
        )
    }

    /// The segment length the models are evaluated at (mi).
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the vertical class has been determined.
    pub fn model_length(&self) -> Result<f64, SequencingError> {
        self.ready(
            self.model_length.as_ref(),
            "model_length",
            Stage::VerticalClassified,
        )
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the demand flow has been determined.
    pub fn demand_flow(&self) -> Result<DemandFlow, SequencingError> {
        self.ready(self.demand.as_ref(), "demand_flow", Stage::FlowDetermined)
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the horizontal alignment has been adjusted for.
    pub fn horizontal_alignment(&self) -> Result<&HorizontalAlignment, SequencingError> {
        self.alignment.as_ref().ok_or(SequencingError::NotReady {
            segment: self.index,
            field: "horizontal_alignment",
            required: Stage::AlignmentAdjusted,
        })
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the free-flow speed has been estimated.
    pub fn free_flow_speed(&self) -> Result<FreeFlowSpeed, SequencingError> {
        self.ready(
            self.free_flow_speed.as_ref(),
            "free_flow_speed",
            Stage::FreeFlowSpeedSet,
        )
    }

    /// Average travel speed (mph).
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the average speed has been estimated.
    pub fn average_speed(&self) -> Result<f64, SequencingError> {
        self.ready(
            self.average_speed.as_ref(),
            "average_speed",
            Stage::AverageSpeedSet,
        )
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the percent followers have been estimated.
    pub fn percent_followers(&self) -> Result<f64, SequencingError> {
        self.ready(
            self.percent_followers.as_ref(),
            "percent_followers",
            Stage::PercentFollowersSet,
        )
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the follower density has been determined.
    pub fn follower_density(&self) -> Result<FollowerDensity, SequencingError> {
        self.ready(
            self.follower_density.as_ref(),
            "follower_density",
            Stage::FollowerDensitySet,
        )
    }

    /// # Errors
    ///
    /// Fails with a [`SequencingError`] until the level of service has been assigned.
    pub fn los(&self) -> Result<Los, SequencingError> {
        self.ready(self.los.as_ref(), "los", Stage::LosAssigned)
    }

    /// Determines the vertical class, or adopts a precomputed one.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the segment was just created.
    pub fn classify_vertical(&mut self) -> Result<VerticalClass, SequencingError> {
        self.advance(Stage::VerticalClassified)?;
        let declared = self
            .inputs
            .precomputed
            .vertical_class
            .and_then(|class| VerticalClass::try_from(class).ok());
        let classification = vertical::classify(
            self.inputs.grade,
            self.inputs.length,
            self.inputs.passing_type,
            declared,
            &mut self.advisories,
        );
        self.model_length = Some(classification.model_length(self.inputs.length).value);
        self.vertical = Some(classification);
        self.complete(Stage::VerticalClassified);
        Ok(classification.class)
    }

    /// Determines flow rates and capacity.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the vertical class is the latest result.
    pub fn determine_demand_flow(&mut self) -> Result<DemandFlow, SequencingError> {
        self.advance(Stage::FlowDetermined)?;
        let class = self.vertical_classification()?.class;
        let demand = demand_flow(
            &DemandInputs {
                passing_type: self.inputs.passing_type,
                class,
                volume: self.inputs.volume,
                opposing_volume: self.inputs.opposing_volume,
                peak_hour_factor: self.inputs.peak_hour_factor,
                percent_heavy_vehicles: self.inputs.percent_heavy_vehicles,
                base_free_flow_speed: base_free_flow_speed(self.inputs.speed_limit).value,
            },
            &self.params,
            &self.inputs.precomputed,
        );
        self.demand = Some(demand);
        self.complete(Stage::FlowDetermined);
        Ok(demand)
    }

    /// Classifies the horizontal curves of the segment.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the demand flow is the latest result.
    pub fn adjust_horizontal_alignment(&mut self) -> Result<&HorizontalAlignment, SequencingError> {
        self.advance(Stage::AlignmentAdjusted)?;
        let adjusted = alignment::adjust(
            self.inputs.length,
            &self.inputs.subsegments,
            self.inputs.speed_limit,
            base_free_flow_speed(self.inputs.speed_limit).value,
            &mut self.advisories,
        );
        self.complete(Stage::AlignmentAdjusted);
        Ok(self.alignment.insert(adjusted))
    }

    /// Estimates the free-flow speed, or adopts a precomputed one.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the horizontal alignment is the latest result.
    pub fn estimate_free_flow_speed(&mut self) -> Result<FreeFlowSpeed, SequencingError> {
        self.advance(Stage::FreeFlowSpeedSet)?;
        let class = self.vertical_classification()?.class;
        let length = self.model_length()?;
        let demand = self.demand_flow()?;

        let base = base_free_flow_speed(self.inputs.speed_limit);
        self.advisories.record_lookup("base_free_flow_speed", &base);
        let free_flow_speed = match self.inputs.precomputed.free_flow_speed {
            Some(adjusted) => FreeFlowSpeed {
                base: base.value,
                adjusted,
            },
            None => speed::free_flow_speed(
                base.value,
                &FreeFlowInputs {
                    class,
                    length,
                    opposing_flow_rate: demand.model_opposing_flow_rate,
                    percent_heavy_vehicles: self.inputs.percent_heavy_vehicles,
                    lane_width: self.params.lane_width,
                    shoulder_width: self.params.shoulder_width,
                    access_point_density: self.params.access_point_density,
                },
                &mut self.advisories,
            ),
        };
        self.free_flow_speed = Some(free_flow_speed);
        self.complete(Stage::FreeFlowSpeedSet);
        Ok(free_flow_speed)
    }

    fn tangent_speed_model(&self) -> Result<TangentSpeedModel, SequencingError> {
        Ok(TangentSpeedModel::new(
            self.inputs.passing_type,
            self.vertical_classification()?.class,
            self.free_flow_speed()?.adjusted,
            self.model_length()?,
            self.demand_flow()?.model_opposing_flow_rate,
            self.inputs.percent_heavy_vehicles,
        ))
    }

    fn follower_model(&self) -> Result<FollowerModel, SequencingError> {
        let demand = self.demand_flow()?;
        Ok(FollowerModel::new(
            self.inputs.passing_type,
            self.vertical_classification()?.class,
            self.model_length()?,
            self.free_flow_speed()?.adjusted,
            demand.model_opposing_flow_rate,
            self.inputs.percent_heavy_vehicles,
            demand.capacity,
        ))
    }

    /// Estimates the average travel speed, or adopts a precomputed one.
    ///
    /// A precomputed speed is capped at the free-flow speed.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the free-flow speed is the latest result.
    pub fn estimate_average_speed(&mut self) -> Result<f64, SequencingError> {
        self.advance(Stage::AverageSpeedSet)?;
        let average_speed = match self.inputs.precomputed.average_speed {
            Some(given) => {
                let free_flow_speed = self.free_flow_speed()?.adjusted;
                if given > free_flow_speed {
                    self.advisories.record(AdvisoryKind::AverageSpeedCapped {
                        given,
                        free_flow_speed,
                    });
                }
                given.min(free_flow_speed)
            }
            None => speed::segment_speed(
                self.horizontal_alignment()?,
                &self.tangent_speed_model()?,
                self.free_flow_speed()?.base,
                self.demand_flow()?.flow_rate,
            ),
        };
        self.average_speed = Some(average_speed);
        self.complete(Stage::AverageSpeedSet);
        Ok(average_speed)
    }

    /// Estimates the percent followers, or adopts a precomputed value.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the average speed is the latest result.
    pub fn estimate_percent_followers(&mut self) -> Result<f64, SequencingError> {
        self.advance(Stage::PercentFollowersSet)?;
        let percent_followers = match self.inputs.precomputed.percent_followers {
            Some(percent) => percent,
            None => {
                let model = self.follower_model()?;
                let flow_rate = self.demand_flow()?.flow_rate;
                model.percent_followers(flow_rate, &mut self.advisories)
            }
        };
        self.percent_followers = Some(percent_followers);
        self.complete(Stage::PercentFollowersSet);
        Ok(percent_followers)
    }

    /// Speed and percent followers of one lane of a passing lane.
    fn lane_traffic(
        &mut self,
        flow_rate: f64,
        percent_heavy_vehicles: f64,
    ) -> Result<LaneTraffic, SequencingError> {
        let speed_model = self
            .tangent_speed_model()?
            .with_heavy_vehicles(percent_heavy_vehicles);
        let speed = speed::segment_speed(
            self.horizontal_alignment()?,
            &speed_model,
            self.free_flow_speed()?.base,
            flow_rate,
        );
        let percent_followers = self
            .follower_model()?
            .with_heavy_vehicles(percent_heavy_vehicles)
            .percent_followers(flow_rate, &mut self.advisories);
        Ok(LaneTraffic {
            flow_rate,
            speed,
            percent_followers,
        })
    }

    /// Determines the follower density.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the percent followers are the latest result.
    pub fn determine_follower_density(&mut self) -> Result<FollowerDensity, SequencingError> {
        self.advance(Stage::FollowerDensitySet)?;
        let flow_rate = self.demand_flow()?.flow_rate;
        let entry = density::single_stream(
            self.percent_followers()?,
            flow_rate,
            self.average_speed()?,
        );

        let follower_density = match self.inputs.passing_type {
            PassingType::PassingLane if flow_rate > 0.0 => {
                let split = density::split_lanes(
                    flow_rate,
                    self.inputs.percent_heavy_vehicles,
                    self.params.faster_lane_heavy_vehicle_share,
                );
                let faster = self.lane_traffic(
                    split.faster.flow_rate,
                    split.faster.percent_heavy_vehicles,
                )?;
                let slower = self.lane_traffic(
                    split.slower.flow_rate,
                    split.slower.percent_heavy_vehicles,
                )?;
                let differential =
                    density::speed_differential(flow_rate, self.inputs.percent_heavy_vehicles);
                density::passing_lane(
                    entry,
                    density::mid_segment(&faster, &slower, differential),
                    self.inputs.length,
                    self.params.downstream_effective_length,
                )
            }
            PassingType::PassingLane => FollowerDensity {
                average: 0.0,
                entry: 0.0,
                mid_segment: Some(0.0),
            },
            PassingType::PassingConstrained | PassingType::PassingZone => FollowerDensity {
                average: entry,
                entry,
                mid_segment: None,
            },
        };
        self.follower_density = Some(follower_density);
        self.complete(Stage::FollowerDensitySet);
        Ok(follower_density)
    }

    /// Assigns the level of service. The segment is read-only afterwards.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the follower density is the latest result.
    pub fn assign_los(&mut self) -> Result<Los, SequencingError> {
        self.advance(Stage::LosAssigned)?;
        let demand = self.demand_flow()?;
        let los = los::classify(
            LosCategory::from(self.inputs.passing_type),
            &LosInputs {
                follower_density: self.follower_density()?.average,
                average_speed: self.average_speed()?,
                free_flow_speed: self.free_flow_speed()?.adjusted,
                flow_rate: demand.flow_rate,
                speed_limit: self.inputs.speed_limit,
                over_capacity: demand.exceeds_capacity(),
            },
        );
        self.los = Some(los);
        self.complete(Stage::LosAssigned);
        Ok(los)
    }

    /// Runs every stage in order.
    ///
    /// # Errors
    ///
    /// Fails with a [`SequencingError`] unless the segment was just created.
    pub fn run_pipeline(&mut self) -> Result<Los, SequencingError> {
        self.classify_vertical()?;
        self.determine_demand_flow()?;
        self.adjust_horizontal_alignment()?;
        self.estimate_free_flow_speed()?;
        self.estimate_average_speed()?;
        self.estimate_percent_followers()?;
        self.determine_follower_density()?;
        self.assign_los()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Precomputed, SubSegmentDescriptor};

    fn descriptor() -> SegmentDescriptor {
        SegmentDescriptor {
            passing_type: 0,
            length: 0.75,
            grade: 0.0,
            speed_limit: 50.0,
            volume: 752.0,
            peak_hour_factor: Some(0.94),
            percent_heavy_vehicles: Some(5.0),
            ..Default::default()
        }
    }

    fn segment(descriptor: &SegmentDescriptor) -> Segment {
        segment_with(descriptor, &FacilityParams::default())
    }

    fn segment_with(descriptor: &SegmentDescriptor, params: &FacilityParams) -> Segment {
        let Ok(segment) = Segment::new(0, descriptor, params) else {
            panic!("Expected a valid segment");
        };
        segment
    }

    #[test]
    fn published_example() {
        let mut segment = segment(&descriptor());
        let Ok(los) = segment.run_pipeline() else {
            panic!("Expected the pipeline to complete");
        };
        assert_eq!(los, Los::D);
        assert_eq!(segment.stage(), Stage::LosAssigned);

        let Ok(demand) = segment.demand_flow() else {
            panic!("Expected a demand flow");
        };
        assert!((demand.flow_rate - 800.0).abs() < 1e-9);
        assert!((demand.capacity - 1700.0).abs() < 1e-9);

        let Ok(ffs) = segment.free_flow_speed() else {
            panic!("Expected a free-flow speed");
        };
        assert!((ffs.adjusted - 56.83).abs() < 0.01);
        let Ok(speed) = segment.average_speed() else {
            panic!("Expected an average speed");
        };
        assert!((speed - 53.63).abs() < 0.01);
        let Ok(pf) = segment.percent_followers() else {
            panic!("Expected percent followers");
        };
        assert!((pf - 67.71).abs() < 0.01);
        let Ok(fd) = segment.follower_density() else {
            panic!("Expected a follower density");
        };
        assert!((fd.average - 10.10).abs() < 0.01);
        assert!(segment.advisories().is_empty());
    }

    #[test]
    fn results_are_not_available_early() {
        let mut segment = segment(&descriptor());
        insta::assert_snapshot!(
            segment.average_speed().unwrap_err(),
            @"segment 0: average_speed is not available until AverageSpeedSet"
        );
        assert!(segment.classify_vertical().is_ok());
        assert!(segment.vertical_classification().is_ok());
        assert!(segment.demand_flow().is_err());
        assert!(segment.los().is_err());
    }

    #[test]
    fn stages_cannot_be_skipped_or_repeated() {
        let mut segment = segment(&descriptor());
        insta::assert_snapshot!(
            segment.estimate_free_flow_speed().unwrap_err(),
            @"segment 0: cannot advance to FreeFlowSpeedSet while Created"
        );
        assert_eq!(segment.stage(), Stage::Created);

        assert!(segment.classify_vertical().is_ok());
        assert!(matches!(
            segment.classify_vertical(),
            Err(SequencingError::OutOfOrder {
                current: Stage::VerticalClassified,
                ..
            })
        ));
    }

    #[test]
    fn terminal_until_reset() {
        let mut segment = segment(&descriptor());
        let Ok(first) = segment.run_pipeline() else {
            panic!("Expected the pipeline to complete");
        };
        assert!(segment.run_pipeline().is_err());
        assert!(segment.assign_los().is_err());
        // Repeated reads are stable
        assert_eq!(segment.los(), Ok(first));
        assert_eq!(segment.los(), Ok(first));

        segment.reset();
        assert_eq!(segment.stage(), Stage::Created);
        assert!(segment.los().is_err());
        assert_eq!(segment.run_pipeline(), Ok(first));
    }

    #[test]
    fn precomputed_results_are_adopted() {
        let mut segment = segment(&SegmentDescriptor {
            precomputed: Precomputed {
                vertical_class: Some(3),
                free_flow_speed: Some(50.0),
                average_speed: Some(45.0),
                percent_followers: Some(60.0),
                ..Default::default()
            },
            ..descriptor()
        });
        assert!(segment.run_pipeline().is_ok());
        assert_eq!(
            segment.vertical_classification().map(|v| v.class),
            Ok(VerticalClass::Three)
        );
        assert!(
            segment
                .average_speed()
                .is_ok_and(|speed| (speed - 45.0).abs() < f64::EPSILON)
        );
        let Ok(demand) = segment.demand_flow() else {
            panic!("Expected a demand flow");
        };
        let Ok(fd) = segment.follower_density() else {
            panic!("Expected a follower density");
        };
        assert!((fd.average - 60.0 * demand.flow_rate / 4500.0).abs() < 1e-9);
    }

    #[test]
    fn precomputed_speed_is_capped_at_free_flow_speed() {
        let mut segment = segment(&SegmentDescriptor {
            precomputed: Precomputed {
                free_flow_speed: Some(40.0),
                average_speed: Some(90.0),
                ..Default::default()
            },
            ..descriptor()
        });
        assert!(segment.run_pipeline().is_ok());
        assert!(
            segment
                .average_speed()
                .is_ok_and(|speed| (speed - 40.0).abs() < f64::EPSILON)
        );
        let capped: Vec<_> = segment
            .advisories()
            .iter()
            .filter(|a| matches!(a.kind, AdvisoryKind::AverageSpeedCapped { .. }))
            .collect();
        assert_eq!(capped.len(), 1);
        insta::assert_snapshot!(capped[0], @"segment 0: average speed 90 mph exceeds the free-flow speed; capped at 40.00 mph");
    }

    #[test]
    fn curves_slow_traffic_down() {
        let straight = SegmentDescriptor {
            length: 1.0,
            grade: 2.0,
            speed_limit: 55.0,
            volume: 512.0,
            percent_heavy_vehicles: Some(8.0),
            ..descriptor()
        };
        let curved = SegmentDescriptor {
            subsegments: vec![
                SubSegmentDescriptor {
                    length: 0.6,
                    ..Default::default()
                },
                SubSegmentDescriptor {
                    length: 0.4,
                    design_radius: Some(900.0),
                    superelevation: Some(0.06),
                    ..Default::default()
                },
            ],
            ..straight.clone()
        };

        let params = FacilityParams {
            access_point_density: 2.0,
            ..Default::default()
        };
        let mut straight = segment_with(&straight, &params);
        let mut curved = segment_with(&curved, &params);
        assert!(straight.run_pipeline().is_ok());
        assert!(curved.run_pipeline().is_ok());

        let (Ok(tangent_speed), Ok(curve_speed)) =
            (straight.average_speed(), curved.average_speed())
        else {
            panic!("Expected average speeds");
        };
        assert!((tangent_speed - 58.04).abs() < 0.01);
        assert!((curve_speed - 55.82).abs() < 0.01);
        let Ok(alignment) = curved.horizontal_alignment() else {
            panic!("Expected an alignment");
        };
        assert!(alignment.weighted_reduction > 0.0);
    }

    #[test]
    fn passing_lane_density() {
        let mut segment = segment_with(
            &SegmentDescriptor {
                passing_type: 2,
                length: 1.5,
                speed_limit: 55.0,
                volume: 800.0,
                percent_heavy_vehicles: Some(8.0),
                ..descriptor()
            },
            &FacilityParams {
                access_point_density: 2.0,
                ..Default::default()
            },
        );
        assert_eq!(segment.run_pipeline(), Ok(Los::C));

        let Ok(density) = segment.follower_density() else {
            panic!("Expected a follower density");
        };
        assert!((density.entry - 8.93).abs() < 0.01);
        assert!(density.mid_segment.is_some_and(|mid| (mid - 2.78).abs() < 0.01));
        assert!((density.average - 4.44).abs() < 0.01);
    }
}
