//! Piecewise-linear lookups over sorted break points.

use itertools::Itertools;

/// Details of an input that fell outside of a table's domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clamp {
    pub input: f64,
    pub min: f64,
    pub max: f64,
    pub clamped_to: f64,
}

/// The result of a table lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup {
    pub value: f64,
    /// Set when the input had to be clamped to the table domain.
    pub clamp: Option<Clamp>,
}

/// A table of `(input, value)` pairs, sorted by input.
///
/// Lookups interpolate linearly between neighbouring break points.
/// Inputs outside of the table are clamped to the nearest end,
/// and the clamp is reported rather than silently applied.
#[derive(Debug, Clone, Copy)]
pub struct Breakpoints {
    points: &'static [(f64, f64)],
}

impl Breakpoints {
    /// # Panics
    ///
    /// Panics (at compile time for constants) if the table is empty.
    pub const fn new(points: &'static [(f64, f64)]) -> Self {
        assert!(!points.is_empty(), "A break point table needs at least one point");
        Self { points }
    }

    pub const fn points(&self) -> &'static [(f64, f64)] {
        self.points
    }

    /// The smallest and largest inputs covered by the table.
    pub const fn domain(&self) -> (f64, f64) {
        (self.points[0].0, self.points[self.points.len() - 1].0)
    }

    pub fn lookup(&self, input: f64) -> Lookup {
        let (min, max) = self.domain();
        let clamped = input.clamp(min, max);
        let clamp = (input < min || input > max).then_some(Clamp {
            input,
            min,
            max,
            clamped_to: clamped,
        });

        let value = self
            .points
            .iter()
            .tuple_windows()
            .find(|&(&(x0, _), &(x1, _))| clamped >= x0 && clamped <= x1)
            .map_or(self.points[0].1, |(&(x0, y0), &(x1, y1))| {
                if x1 > x0 {
                    y0 + (y1 - y0) * (clamped - x0) / (x1 - x0)
                } else {
                    y0
                }
            });

        Lookup { value, clamp }
    }
}
