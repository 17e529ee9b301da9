//! Weighted univariate histograms backing the candidate-cut search.
//!
//! Both variants accumulate weights over a half-open value range; values
//! below the range go to an underflow counter and values at or above the
//! upper edge go to an overflow counter, and neither participates in cut
//! selection.

use ordered_float::NotNan;
use std::fmt;

/// Equal-width bins spanning `[min_val, max_val)`.
#[derive(Clone, Debug)]
pub struct LinearHistogram {
    min_val: f64,
    max_val: f64,
    bin_width: f64,
    underflow: f64,
    overflow: f64,
    bin_values: Vec<f64>,
}

impl LinearHistogram {
    pub fn new(min_val: f64, max_val: f64, n_bins: usize) -> Self {
        Self {
            min_val,
            max_val,
            bin_width: (max_val - min_val) / n_bins as f64,
            underflow: 0.,
            overflow: 0.,
            bin_values: vec![0.; n_bins],
        }
    }

    pub fn n_bins(&self) -> usize {
        self.bin_values.len()
    }

    pub fn bins(&self) -> &[f64] {
        &self.bin_values
    }

    pub fn count(&self, i: usize) -> f64 {
        self.bin_values[i]
    }

    pub fn min_val(&self) -> f64 {
        self.min_val
    }

    pub fn max_val(&self) -> f64 {
        self.max_val
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Bin index for an in-range value, clamped to the last bin so that
    /// rounding at the upper edge cannot escape the range.
    pub fn index_for_value(&self, value: f64) -> Option<usize> {
        if self.min_val <= value && value < self.max_val {
            let i = ((value - self.min_val) / self.bin_width) as usize;
            Some(i.min(self.n_bins() - 1))
        } else {
            None
        }
    }

    /// Left edge of bin `i`; `value_for_index(i + 1)` is its right edge.
    pub fn value_for_index(&self, i: usize) -> f64 {
        self.min_val + i as f64 * self.bin_width
    }

    pub fn fill_one(&mut self, value: f64, weight: f64) {
        if let Some(i) = self.index_for_value(value) {
            self.bin_values[i] += weight;
        } else if value < self.min_val {
            self.underflow += weight;
        } else if value >= self.max_val {
            self.overflow += weight;
        }
    }

    pub fn fill(&mut self, values: &[f64], weights: &[f64]) {
        for (&value, &weight) in values.iter().zip(weights) {
            self.fill_one(value, weight);
        }
    }

    /// Fill with unit weight per value.
    pub fn fill_unweighted(&mut self, values: &[f64]) {
        for &value in values {
            self.fill_one(value, 1.);
        }
    }
}

/// Explicitly-edged bins, used with weight-quantile boundaries.
#[derive(Clone, Debug)]
pub struct NonlinearHistogram {
    bin_edges: Vec<f64>,
    bin_values: Vec<f64>,
    underflow: f64,
    overflow: f64,
}

impl NonlinearHistogram {
    /// Build from bin edges; edges are sorted, and `n` edges define
    /// `n - 1` bins.
    pub fn new(mut bin_edges: Vec<f64>) -> Self {
        bin_edges.sort_unstable_by_key(|&e| {
            NotNan::new(e).expect("non-finite bin edge")
        });
        let n_bins = bin_edges.len().saturating_sub(1);
        Self {
            bin_edges,
            bin_values: vec![0.; n_bins],
            underflow: 0.,
            overflow: 0.,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.bin_values.len()
    }

    pub fn bins(&self) -> &[f64] {
        &self.bin_values
    }

    pub fn count(&self, i: usize) -> f64 {
        self.bin_values[i]
    }

    pub fn min_val(&self) -> f64 {
        self.bin_edges[0]
    }

    pub fn max_val(&self) -> f64 {
        *self.bin_edges.last().expect("histogram has no edges")
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    pub fn index_for_value(&self, value: f64) -> Option<usize> {
        if self.min_val() <= value && value < self.max_val() {
            // rightmost edge at or below value
            let i = self.bin_edges.partition_point(|&e| e <= value) - 1;
            Some(i.min(self.n_bins() - 1))
        } else {
            None
        }
    }

    /// Left edge of bin `i`; `value_for_index(i + 1)` is its right edge.
    pub fn value_for_index(&self, i: usize) -> f64 {
        self.bin_edges[i]
    }

    pub fn fill(&mut self, values: &[f64], weights: &[f64]) {
        let (sorted_values, sorted_weights) = Self::sorted_values_weights(values, weights);
        self.fill_presorted(&sorted_values, &sorted_weights);
    }

    /// Fill from values already sorted ascending, walking the edges once.
    pub fn fill_presorted(&mut self, sorted_values: &[f64], sorted_weights: &[f64]) {
        let mut i_bin = 0;
        for (&value, &weight) in sorted_values.iter().zip(sorted_weights) {
            if value < self.bin_edges[0] {
                self.underflow += weight;
                continue;
            }
            if value >= self.max_val() {
                self.overflow += weight;
                continue;
            }
            while value >= self.bin_edges[i_bin + 1] {
                i_bin += 1;
            }
            self.bin_values[i_bin] += weight;
        }
    }

    /// Sort `(value, weight)` pairs by value, returning the two columns.
    pub fn sorted_values_weights(values: &[f64], weights: &[f64]) -> (Vec<f64>, Vec<f64>) {
        assert_eq!(values.len(), weights.len());
        let mut pairs: Vec<(NotNan<f64>, f64)> = values
            .iter()
            .zip(weights)
            .map(|(&v, &w)| (NotNan::new(v).expect("non-finite histogram value"), w))
            .collect();
        pairs.sort_unstable_by_key(|pair| pair.0);
        pairs
            .into_iter()
            .map(|(v, w)| (v.into_inner(), w))
            .unzip()
    }

    /// Bin edges that split the weighted value stream into `n` roughly
    /// equal-weight bins.
    ///
    /// Walks sorted `(value, weight)` pairs and emits a boundary whenever
    /// the accumulated weight crosses `total / n`, retaining the excess as
    /// carryover. The first edge is the minimum value and the last is the
    /// maximum, padded with the maximum so that exactly `n + 1` edges come
    /// back.
    pub fn ntile_boundaries(n: usize, values: &[f64], weights: &[f64]) -> Vec<f64> {
        let (sorted_values, sorted_weights) = Self::sorted_values_weights(values, weights);
        Self::ntile_boundaries_presorted(n, &sorted_values, &sorted_weights)
    }

    pub fn ntile_boundaries_presorted(
        n: usize,
        sorted_values: &[f64],
        sorted_weights: &[f64],
    ) -> Vec<f64> {
        assert_eq!(sorted_values.len(), sorted_weights.len());
        assert!(!sorted_values.is_empty(), "no values to bin");
        let total_weight: f64 = sorted_weights.iter().sum();
        let ntile_weight = total_weight / n as f64;
        let mut bin_edges = Vec::with_capacity(n + 1);
        bin_edges.push(sorted_values[0]);
        let mut weight_so_far = 0.;
        for (&value, &weight) in sorted_values.iter().zip(sorted_weights) {
            weight_so_far += weight;
            if weight_so_far > ntile_weight {
                bin_edges.push(value);
                weight_so_far = weight_so_far + weight - ntile_weight;
            }
            if bin_edges.len() == n + 1 {
                break;
            }
        }
        let max_val = *sorted_values.last().expect("no values to bin");
        while bin_edges.len() < n + 1 {
            bin_edges.push(max_val);
        }
        bin_edges
    }
}

impl fmt::Display for LinearHistogram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, count) in self.bin_values.iter().enumerate() {
            writeln!(
                f,
                "{} to {}: {}",
                self.value_for_index(i),
                self.value_for_index(i + 1),
                count
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for NonlinearHistogram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, count) in self.bin_values.iter().enumerate() {
            writeln!(
                f,
                "{} to {}: {}",
                self.bin_edges[i],
                self.bin_edges[i + 1],
                count
            )?;
        }
        Ok(())
    }
}

/// Dispatch over the two binning strategies during the cut scan.
#[derive(Clone, Debug)]
pub enum Histogram {
    Linear(LinearHistogram),
    Nonlinear(NonlinearHistogram),
}

impl Histogram {
    pub fn n_bins(&self) -> usize {
        match self {
            Histogram::Linear(h) => h.n_bins(),
            Histogram::Nonlinear(h) => h.n_bins(),
        }
    }

    pub fn bins(&self) -> &[f64] {
        match self {
            Histogram::Linear(h) => h.bins(),
            Histogram::Nonlinear(h) => h.bins(),
        }
    }

    pub fn value_for_index(&self, i: usize) -> f64 {
        match self {
            Histogram::Linear(h) => h.value_for_index(i),
            Histogram::Nonlinear(h) => h.value_for_index(i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_linear_index_for_value() {
        let h = LinearHistogram::new(0., 10., 5);
        assert_eq!(h.index_for_value(0.), Some(0));
        assert_eq!(h.index_for_value(1.9), Some(0));
        assert_eq!(h.index_for_value(2.), Some(1));
        assert_eq!(h.index_for_value(9.999), Some(4));
        assert_eq!(h.index_for_value(-0.1), None);
        assert_eq!(h.index_for_value(10.), None);
    }

    #[test]
    fn test_linear_under_and_overflow() {
        let mut h = LinearHistogram::new(0., 1., 2);
        h.fill(&[-1., 0.25, 0.75, 1., 2.], &[1., 2., 3., 4., 5.]);
        assert_eq!(h.bins(), [2., 3.]);
        assert_eq!(h.underflow(), 1.);
        assert_eq!(h.overflow(), 9.);
    }

    #[test]
    fn test_linear_edges() {
        let h = LinearHistogram::new(-1., 1., 4);
        assert_approx_eq!(h.value_for_index(0), -1.);
        assert_approx_eq!(h.value_for_index(2), 0.);
        assert_approx_eq!(h.value_for_index(4), 1.);
    }

    #[test]
    fn test_nonlinear_fill() {
        let mut h = NonlinearHistogram::new(vec![0., 1., 10., 100.]);
        h.fill(&[50., 0.5, 5., 0.5, 100.], &[1., 1., 1., 1., 7.]);
        assert_eq!(h.bins(), [2., 1., 1.]);
        assert_eq!(h.overflow(), 7.);
        assert_eq!(h.underflow(), 0.);
    }

    #[test]
    fn test_nonlinear_edges_sorted() {
        let h = NonlinearHistogram::new(vec![3., 1., 2.]);
        assert_eq!(h.min_val(), 1.);
        assert_eq!(h.max_val(), 3.);
        assert_eq!(h.index_for_value(2.5), Some(1));
    }

    #[test]
    fn test_ntile_boundary_count() {
        // exactly n + 1 edges, whatever the weights
        let values: Vec<f64> = (0..100).map(f64::from).collect();
        let weights = vec![1.; 100];
        for n in [1, 2, 5, 20, 50] {
            let edges = NonlinearHistogram::ntile_boundaries(n, &values, &weights);
            assert_eq!(edges.len(), n + 1);
        }
    }

    #[test]
    fn test_ntile_boundaries_bracket_the_range() {
        let values = vec![5., 1., 9., 3., 7.];
        let weights = vec![1.; 5];
        let edges = NonlinearHistogram::ntile_boundaries(2, &values, &weights);
        assert_eq!(edges.len(), 3);
        assert_eq!(edges[0], 1.);
        assert_eq!(*edges.last().unwrap(), 9.);
    }

    #[test]
    fn test_ntile_boundaries_roughly_equal_weight() {
        let values: Vec<f64> = (0..1000).map(f64::from).collect();
        let weights = vec![1.; 1000];
        let edges = NonlinearHistogram::ntile_boundaries(4, &values, &weights);
        let mut h = NonlinearHistogram::new(edges);
        h.fill(&values, &weights);
        for &count in h.bins() {
            assert!(count >= 200., "bin weight {} far below the quartile", count);
            assert!(count <= 300., "bin weight {} far above the quartile", count);
        }
    }

    #[test]
    fn test_ntile_padding_with_degenerate_weights() {
        // one dominant weight exhausts every quota immediately
        let values = vec![1., 2., 3.];
        let weights = vec![100., 0.001, 0.001];
        let edges = NonlinearHistogram::ntile_boundaries(5, &values, &weights);
        assert_eq!(edges.len(), 6);
        assert_eq!(edges[0], 1.);
        assert_eq!(*edges.last().unwrap(), 3.);
    }

    #[test]
    fn test_display_lists_bins() {
        let mut h = NonlinearHistogram::new(vec![0., 1., 10.]);
        h.fill(&[0.5, 5.], &[2., 3.]);
        assert_eq!(h.to_string(), "0 to 1: 2\n1 to 10: 3\n");
    }

    #[test]
    fn test_histogram_dispatch() {
        let mut lin = LinearHistogram::new(0., 1., 4);
        lin.fill_unweighted(&[0.1, 0.6]);
        let h = Histogram::Linear(lin);
        assert_eq!(h.n_bins(), 4);
        assert_eq!(h.bins(), [1., 0., 1., 0.]);
        assert_approx_eq!(h.value_for_index(1), 0.25);
    }
}
