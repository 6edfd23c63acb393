//! # Two-Lane Highway Level of Service
//!
//! An implementation of the HCM (7th edition, chapter 15) methodology for two-lane highways.
//! A facility is split into directional segments (passing constrained, passing zone or
//! passing lane), each of which runs through a staged pipeline
//! from vertical classification to a level of service grade.
//! The facility grade is then derived from the length-weighted segment results.

// Private modules by default
mod breakpoints;
mod error;
mod model;
mod segment;

pub mod alignment;
pub mod constraints;
pub mod demand;
pub mod density;
pub mod facility;
pub mod followers;
pub mod los;
pub mod speed;
pub mod tables;
pub mod vertical;

// Flattened re-exports of the types most callers need.
pub use breakpoints::{Breakpoints, Clamp, Lookup};
pub use constraints::{CONSTRAINTS, constraints_json};
pub use error::{
    Advisory, AdvisoryKind, AdvisoryLog, AnalysisError, SequencingError, ValidationError,
};
pub use facility::{AnalysisOptions, Facility, FacilityResults};
pub use los::Los;
pub use model::{
    CurveGeometry, DEFAULT_PEAK_HOUR_FACTOR, FacilityDescriptor, FacilityParams,
    HorizontalClass, LENGTH_TOLERANCE, PassingType, Precomputed, SegmentDescriptor,
    SegmentInputs, SubSegment, SubSegmentDescriptor, SubSegmentKind, VerticalClass,
};
pub use segment::{Segment, Stage};
