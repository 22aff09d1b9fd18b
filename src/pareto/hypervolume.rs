//! Hypervolume indicator
//!
//! Lebesgue measure of the region dominated by a point set and bounded by a
//! reference point, under the minimisation convention. Computed exactly by
//! slicing along the last objective and recursing (HSO); the 2-objective case
//! is a single sweep.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{EvoResult, EvolutionError};

/// Default per-objective offset used to build a reference point
pub const DEFAULT_REFERENCE_OFFSET: f64 = 1e-6;

/// Reference point bounding the hypervolume
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferencePoint(Vec<f64>);

impl ReferencePoint {
    /// Create from explicit coordinates
    pub fn new(coordinates: Vec<f64>) -> Self {
        Self(coordinates)
    }

    /// A reference point sitting `offset` above the origin on every objective
    ///
    /// With non-negative rewards negated on ingestion every fitness lies at or
    /// below the origin, so this point is dominated by all of them.
    pub fn with_offset(num_objectives: usize, offset: f64) -> Self {
        Self(vec![offset; num_objectives])
    }

    /// Coordinates
    pub fn coordinates(&self) -> &[f64] {
        &self.0
    }

    /// Number of objectives
    pub fn dimension(&self) -> usize {
        self.0.len()
    }
}

/// Hypervolume indicator bound to a reference point
#[derive(Clone, Debug)]
pub struct Hypervolume {
    reference: ReferencePoint,
}

impl Hypervolume {
    /// Create a new indicator
    pub fn new(reference: ReferencePoint) -> Self {
        Self { reference }
    }

    /// Indicator with the default offset reference point
    pub fn with_default_reference(num_objectives: usize) -> Self {
        Self::new(ReferencePoint::with_offset(
            num_objectives,
            DEFAULT_REFERENCE_OFFSET,
        ))
    }

    /// The reference point
    pub fn reference(&self) -> &ReferencePoint {
        &self.reference
    }

    /// Hypervolume of a point set
    ///
    /// Empty sets have hypervolume 0. Fails if a point's dimension differs
    /// from the reference point's.
    pub fn compute<T: AsRef<[f64]>>(&self, points: &[T]) -> EvoResult<f64> {
        let reference = self.reference.coordinates();
        for p in points {
            if p.as_ref().len() != reference.len() {
                return Err(EvolutionError::ObjectiveMismatch {
                    expected: reference.len(),
                    actual: p.as_ref().len(),
                });
            }
        }
        Ok(hypervolume(points, reference))
    }
}

/// Hypervolume of `points` with respect to `reference`
///
/// Points that do not strictly dominate the reference point on every axis
/// contribute nothing.
pub fn hypervolume<T: AsRef<[f64]>>(points: &[T], reference: &[f64]) -> f64 {
    let inside: Vec<Vec<f64>> = points
        .iter()
        .map(|p| p.as_ref())
        .filter(|p| p.iter().zip(reference).all(|(x, r)| x < r))
        .map(|p| p.to_vec())
        .collect();

    if inside.is_empty() || reference.is_empty() {
        return 0.0;
    }

    slice_volume(inside, reference)
}

fn slice_volume(mut points: Vec<Vec<f64>>, reference: &[f64]) -> f64 {
    let dim = reference.len();
    match dim {
        0 => 0.0,
        1 => {
            let best = points
                .iter()
                .map(|p| p[0])
                .fold(f64::INFINITY, f64::min);
            reference[0] - best
        }
        2 => sweep_2d(&mut points, reference),
        _ => {
            let last = dim - 1;
            points.sort_by(|a, b| a[last].partial_cmp(&b[last]).unwrap_or(Ordering::Equal));

            let mut volume = 0.0;
            for i in 0..points.len() {
                let upper = points
                    .get(i + 1)
                    .map(|p| p[last])
                    .unwrap_or(reference[last]);
                let depth = upper - points[i][last];
                if depth <= 0.0 {
                    continue;
                }
                let projected: Vec<Vec<f64>> =
                    points[..=i].iter().map(|p| p[..last].to_vec()).collect();
                volume += depth * slice_volume(projected, &reference[..last]);
            }
            volume
        }
    }
}

fn sweep_2d(points: &mut [Vec<f64>], reference: &[f64]) -> f64 {
    points.sort_by(|a, b| {
        a[0].partial_cmp(&b[0])
            .unwrap_or(Ordering::Equal)
            .then_with(|| a[1].partial_cmp(&b[1]).unwrap_or(Ordering::Equal))
    });

    let mut volume = 0.0;
    let mut floor = reference[1];
    for p in points.iter() {
        if p[1] < floor {
            volume += (reference[0] - p[0]) * (floor - p[1]);
            floor = p[1];
        }
    }
    volume
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_point_is_product_of_margins() {
        let hv = hypervolume(&[vec![1.0, 1.0]], &[3.0, 3.0]);
        assert_relative_eq!(hv, 4.0);

        let hv = hypervolume(&[vec![0.0, 1.0, 2.0]], &[3.0, 3.0, 3.0]);
        assert_relative_eq!(hv, 3.0 * 2.0 * 1.0);
    }

    #[test]
    fn test_dominated_point_adds_nothing() {
        let hv = hypervolume(&[vec![1.0, 1.0], vec![2.0, 2.0]], &[3.0, 3.0]);
        assert_relative_eq!(hv, 4.0);
    }

    #[test]
    fn test_staircase_2d() {
        let points = vec![vec![1.0, 4.0], vec![2.0, 2.0], vec![4.0, 1.0]];
        assert_relative_eq!(hypervolume(&points, &[5.0, 5.0]), 11.0);
    }

    #[test]
    fn test_three_objectives_union() {
        // Two unit-offset boxes overlapping in a 1x1x1 cube
        let points = vec![vec![0.0, 1.0, 1.0], vec![1.0, 0.0, 1.0]];
        let hv = hypervolume(&points, &[2.0, 2.0, 2.0]);
        // each box: 2*1*1 = 2; overlap: 1*1*1 = 1
        assert_relative_eq!(hv, 3.0);
    }

    #[test]
    fn test_empty_set_is_zero() {
        let points: Vec<Vec<f64>> = vec![];
        assert_eq!(hypervolume(&points, &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_points_outside_reference_ignored() {
        let hv = hypervolume(&[vec![4.0, 1.0], vec![3.0, 0.0]], &[3.0, 3.0]);
        assert_eq!(hv, 0.0);
    }

    #[test]
    fn test_duplicates_do_not_change_volume() {
        let once = hypervolume(&[vec![1.0, 2.0]], &[3.0, 3.0]);
        let twice = hypervolume(&[vec![1.0, 2.0], vec![1.0, 2.0]], &[3.0, 3.0]);
        assert_relative_eq!(once, twice);
    }

    #[test]
    fn test_indicator_default_reference() {
        let indicator = Hypervolume::with_default_reference(2);
        let hv = indicator.compute(&[vec![-2.0, -3.0]]).unwrap();
        assert_relative_eq!(hv, (2.0 + 1e-6) * (3.0 + 1e-6));
    }

    #[test]
    fn test_indicator_dimension_mismatch() {
        let indicator = Hypervolume::with_default_reference(2);
        assert!(indicator.compute(&[vec![-1.0, -1.0, -1.0]]).is_err());
    }
}
