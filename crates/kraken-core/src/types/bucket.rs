use serde::{Deserialize, Serialize};

use crate::types::TargetFilter;
use crate::{Error, ErrorKind, Result};

/// A weight-range slice of the Target population used by the Uniform
/// allocator (§3, §4.10).
///
/// `allocated_resources` is set exactly once via [`Self::normalise`] against
/// the sum of every bucket's [`Self::weight`] in the same recomputation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    /// Store path the bucketed weight is read from, e.g. `statistics__s1__detail__weight`.
    pub path: String,
    /// Inclusive lower bound of this bucket's weight range.
    pub lower_bound: f64,
    /// Exclusive upper bound of this bucket's weight range.
    pub upper_bound: f64,
    /// Count of targets whose weight falls in `[lower_bound, upper_bound)`.
    pub absolute_size: u64,
    /// Relative importance of targets within this bucket, default `sqrt(k)` for the `k`-th bucket.
    pub importance_factor: f64,
    /// Proportion of the step's total resources allocated to this bucket, set once by [`Self::normalise`].
    pub allocated_resources: Option<f64>,
    /// Additional filter applied to targets within this bucket's range.
    pub filter: TargetFilter,
}

impl Bucket {
    /// Creates an un-normalised bucket with no resources allocated yet.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        lower_bound: f64,
        upper_bound: f64,
        absolute_size: u64,
        importance_factor: f64,
        filter: TargetFilter,
    ) -> Self {
        Self {
            path: path.into(),
            lower_bound,
            upper_bound,
            absolute_size,
            importance_factor,
            allocated_resources: None,
            filter,
        }
    }

    /// `importance_factor × absolute_size`.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.importance_factor * self.absolute_size as f64
    }

    /// Normalises this bucket's weight against `total_weight`, setting
    /// [`Self::allocated_resources`] exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Validation`] if this bucket has already been normalised.
    pub fn normalise(&mut self, total_weight: f64) -> Result<()> {
        if self.allocated_resources.is_some() {
            return Err(Error::new(
                ErrorKind::Validation,
                "cannot normalise an already-normalised bucket",
            ));
        }
        self.allocated_resources = Some(if total_weight > 0.0 {
            self.weight() / total_weight
        } else {
            0.0
        });
        Ok(())
    }

    /// Whether a raw weight value falls within `[lower_bound, upper_bound)`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower_bound && value < self.upper_bound
    }

    /// Normalises every bucket in `buckets` against their collective weight sum.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Validation`] if any bucket was already normalised.
    pub fn normalise_all(buckets: &mut [Self]) -> Result<()> {
        let total_weight: f64 = buckets.iter().map(Self::weight).sum();
        for bucket in buckets {
            bucket.normalise(total_weight)?;
        }
        Ok(())
    }

    /// Default bucket boundaries: `0, 2^0, 2^1, … 2^(B-2)` for `B` buckets (§4.10).
    #[must_use]
    pub fn default_boundaries(bucket_count: usize) -> Vec<f64> {
        let mut boundaries = vec![0.0];
        boundaries.extend((0..bucket_count.saturating_sub(1)).map(|x| 2f64.powi(x as i32)));
        boundaries
    }

    /// Default importance factors: `sqrt(k)` for `k = 1..=bucket_count` (§4.10).
    #[must_use]
    pub fn default_importance_factors(bucket_count: usize) -> Vec<f64> {
        (1..=bucket_count).map(|k| (k as f64).sqrt()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bucket(importance_factor: f64, absolute_size: u64) -> Bucket {
        Bucket::new(
            "statistics__s1__detail__weight",
            0.0,
            1.0,
            absolute_size,
            importance_factor,
            TargetFilter::All,
        )
    }

    #[test]
    fn weight_is_product_of_factor_and_size() {
        let b = bucket(2.0, 10);
        assert_eq!(b.weight(), 20.0);
    }

    #[test]
    fn normalise_sums_to_one() {
        let mut buckets = vec![bucket(1.0, 10), bucket(1.0, 30)];
        Bucket::normalise_all(&mut buckets).unwrap();

        let total: f64 = buckets.iter().map(|b| b.allocated_resources.unwrap()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((buckets[0].allocated_resources.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn normalise_twice_errors() {
        let mut b = bucket(1.0, 10);
        b.normalise(10.0).unwrap();
        assert!(b.normalise(10.0).is_err());
    }

    #[test]
    fn default_boundaries_and_factors_have_expected_shape() {
        let boundaries = Bucket::default_boundaries(4);
        assert_eq!(boundaries, vec![0.0, 1.0, 2.0]);

        let factors = Bucket::default_importance_factors(4);
        assert_eq!(factors.len(), 4);
        assert!((factors[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn contains_checks_half_open_range() {
        let b = bucket(1.0, 10);
        assert!(b.contains(0.0));
        assert!(!b.contains(1.0));
    }
}
