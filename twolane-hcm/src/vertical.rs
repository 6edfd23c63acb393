//! Vertical alignment classification.

use crate::breakpoints::{Clamp, Lookup};
use crate::error::AdvisoryLog;
use crate::model::{PassingType, VerticalClass};
use crate::tables::{DOWNGRADE_BANDS, SEGMENT_LENGTH_LIMITS, UPGRADE_BANDS, VerticalBand};

/// A segment's vertical class and the segment lengths the models are calibrated for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalClassification {
    pub class: VerticalClass,
    /// Shortest calibrated segment length (mi).
    pub min_length: f64,
    /// Longest calibrated segment length (mi).
    pub max_length: f64,
}

impl VerticalClassification {
    pub fn for_class(class: VerticalClass, passing_type: PassingType) -> Self {
        let (min_length, max_length) =
            SEGMENT_LENGTH_LIMITS[class.index()][passing_type.index()];
        Self {
            class,
            min_length,
            max_length,
        }
    }

    /// The length to evaluate the speed and follower models at.
    pub fn model_length(&self, length: f64) -> Lookup {
        let clamped = length.clamp(self.min_length, self.max_length);
        Lookup {
            value: clamped,
            clamp: (length < self.min_length || length > self.max_length).then_some(Clamp {
                input: length,
                min: self.min_length,
                max: self.max_length,
                clamped_to: clamped,
            }),
        }
    }
}

/// The vertical class of a grade (%) sustained over a length (mi).
///
/// A grade or length exactly on a threshold belongs to the higher class.
pub fn vertical_class(grade: f64, length: f64) -> VerticalClass {
    let bands: &[VerticalBand] = if grade >= 0.0 {
        &UPGRADE_BANDS
    } else {
        &DOWNGRADE_BANDS
    };
    let grade = grade.abs();

    let Some(band) = bands.iter().rev().find(|band| length >= band.min_length) else {
        return VerticalClass::One;
    };

    band.class_thresholds
        .iter()
        .zip([
            VerticalClass::Two,
            VerticalClass::Three,
            VerticalClass::Four,
            VerticalClass::Five,
        ])
        .filter(|&(&threshold, _)| grade >= threshold)
        .map(|(_, class)| class)
        .max()
        .unwrap_or(VerticalClass::One)
}

/// Classifies a segment, recording an advisory when its length is outside of the
/// calibrated range for the class.
pub fn classify(
    grade: f64,
    length: f64,
    passing_type: PassingType,
    declared: Option<VerticalClass>,
    log: &mut AdvisoryLog,
) -> VerticalClassification {
    let class = declared.unwrap_or_else(|| vertical_class(grade, length));
    let classification = VerticalClassification::for_class(class, passing_type);
    log.record_lookup("segment_length_limits", &classification.model_length(length));
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_terrain_is_class_one() {
        assert_eq!(vertical_class(0.0, 0.5), VerticalClass::One);
        assert_eq!(vertical_class(1.0, 0.16), VerticalClass::One);
        assert_eq!(vertical_class(1.0, 0.64), VerticalClass::One);
        assert_eq!(vertical_class(-1.5, 2.0), VerticalClass::One);
    }

    #[test]
    fn thresholds_favour_the_higher_class() {
        // Grade thresholds
        assert_eq!(vertical_class(6.99, 0.05), VerticalClass::One);
        assert_eq!(vertical_class(7.0, 0.05), VerticalClass::Two);
        assert_eq!(vertical_class(3.0, 0.25), VerticalClass::Two);
        assert_eq!(vertical_class(9.0, 0.25), VerticalClass::Five);
        assert_eq!(vertical_class(-8.0, 0.05), VerticalClass::Two);
        assert_eq!(vertical_class(-7.99, 0.05), VerticalClass::One);
        // Length thresholds
        assert_eq!(vertical_class(4.0, 0.09), VerticalClass::One);
        assert_eq!(vertical_class(4.0, 0.1), VerticalClass::Two);
        assert_eq!(vertical_class(5.0, 0.8), VerticalClass::Five);
        assert_eq!(vertical_class(5.0, 0.79), VerticalClass::Four);
    }

    #[test]
    fn longer_and_steeper_escalates() {
        assert_eq!(vertical_class(3.5, 0.9), VerticalClass::Three);
        assert_eq!(vertical_class(3.5, 1.5), VerticalClass::Four);
        assert_eq!(vertical_class(6.0, 2.0), VerticalClass::Five);
        assert_eq!(vertical_class(-3.5, 0.75), VerticalClass::Three);
    }

    #[test]
    fn classification_bounds_and_advisories() {
        let mut log = AdvisoryLog::new(0);
        let classification = classify(1.0, 0.16, PassingType::PassingConstrained, None, &mut log);
        assert_eq!(classification.class, VerticalClass::One);
        assert!((classification.min_length - 0.25).abs() < f64::EPSILON);
        assert!((classification.max_length - 3.0).abs() < f64::EPSILON);
        assert_eq!(log.entries().len(), 1);
        assert!((classification.model_length(0.16).value - 0.25).abs() < f64::EPSILON);

        let mut log = AdvisoryLog::new(1);
        let classification = classify(
            1.0,
            0.64,
            PassingType::PassingZone,
            Some(VerticalClass::Three),
            &mut log,
        );
        assert_eq!(classification.class, VerticalClass::Three);
        assert!((classification.max_length - 1.1).abs() < f64::EPSILON);
        assert!(log.is_empty());
    }
}
