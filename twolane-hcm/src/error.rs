use crate::segment::Stage;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use tracing::warn;

/// An input which is missing, malformed, or outside of its valid range.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{}invalid {field}: {reason}", .segment.map_or_else(String::new, |i| format!("segment {i}: ")))]
pub struct ValidationError {
    /// The index of the offending segment, when the error belongs to one.
    pub segment: Option<usize>,
    /// The offending field (subsegment fields are prefixed, e.g. `subsegments[1].design_radius`).
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            segment: None,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Attributes the error to a segment.
    #[must_use]
    pub fn in_segment(mut self, segment: usize) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Prefixes the field with the subsegment it was found in.
    #[must_use]
    pub fn in_subsegment(mut self, subsegment: usize) -> Self {
        self.field = format!("subsegments[{subsegment}].{}", self.field);
        self
    }
}

/// A pipeline stage ran out of order, or a result was read before its stage ran.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SequencingError {
    #[error("segment {segment}: cannot advance to {attempted} while {current}")]
    OutOfOrder {
        segment: usize,
        attempted: Stage,
        current: Stage,
    },
    #[error("segment {segment}: {field} is not available until {required}")]
    NotReady {
        segment: usize,
        field: &'static str,
        required: Stage,
    },
}

/// Fatal errors for the analysis of a segment or facility.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sequencing(#[from] SequencingError),
}

/// A non-fatal note about an input the methodology is not calibrated for.
///
/// The engine always carries on with a clamped or floored value;
/// advisories make sure this never happens unnoticed.
#[derive(Debug, Clone, PartialEq)]
pub struct Advisory {
    pub segment: usize,
    pub kind: AdvisoryKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvisoryKind {
    /// A lookup input was outside of the table domain and was clamped to the nearest boundary.
    LookupOutOfRange {
        table: &'static str,
        input: f64,
        min: f64,
        max: f64,
        clamped_to: f64,
    },
    /// The adjusted free-flow speed fell below the plausible minimum.
    FreeFlowSpeedFloored { computed: f64, floor: f64 },
    /// A given average speed was faster than the free-flow speed, which caps it.
    AverageSpeedCapped { given: f64, free_flow_speed: f64 },
    /// A curve is tighter than the minimum radius for the posted speed.
    RadiusBelowMinimum {
        subsegment: usize,
        radius: f64,
        minimum: f64,
    },
}

impl Display for Advisory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "segment {}: ", self.segment)?;
        match &self.kind {
            AdvisoryKind::LookupOutOfRange {
                table,
                input,
                min,
                max,
                clamped_to,
            } => write!(
                f,
                "{table} input {input} is outside of [{min}, {max}]; clamped to {clamped_to}"
            ),
            AdvisoryKind::FreeFlowSpeedFloored { computed, floor } => write!(
                f,
                "free-flow speed {computed:.2} mph is implausible; floored at {floor} mph"
            ),
            AdvisoryKind::AverageSpeedCapped {
                given,
                free_flow_speed,
            } => write!(
                f,
                "average speed {given} mph exceeds the free-flow speed; capped at {free_flow_speed:.2} mph"
            ),
            AdvisoryKind::RadiusBelowMinimum {
                subsegment,
                radius,
                minimum,
            } => write!(
                f,
                "subsegment {subsegment} radius {radius} ft is below the {minimum:.0} ft minimum for the posted speed"
            ),
        }
    }
}

/// Collects the advisories raised while analysing one segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvisoryLog {
    segment: usize,
    entries: Vec<Advisory>,
}

impl AdvisoryLog {
    pub const fn new(segment: usize) -> Self {
        Self {
            segment,
            entries: Vec::new(),
        }
    }

    pub fn record(&mut self, kind: AdvisoryKind) {
        let advisory = Advisory {
            segment: self.segment,
            kind,
        };
        warn!("{advisory}");
        self.entries.push(advisory);
    }

    /// Records a clamp if the lookup left the table domain.
    pub fn record_lookup(&mut self, table: &'static str, lookup: &crate::breakpoints::Lookup) {
        if let Some(clamp) = lookup.clamp {
            self.record(AdvisoryKind::LookupOutOfRange {
                table,
                input: clamp.input,
                min: clamp.min,
                max: clamp.max,
                clamped_to: clamp.clamped_to,
            });
        }
    }

    pub fn entries(&self) -> &[Advisory] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
