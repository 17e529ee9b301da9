use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A single row of feature values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    values: Vec<f64>,
}

impl Event {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn value(&self, index: usize) -> f64 {
        self.values[index]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// An event is finite iff every component is finite.
    pub fn all_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl std::ops::Index<usize> for Event {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.values[index]
    }
}

/// Row filter applied at construction, for simple holdout splits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subset {
    All,
    Even,
    Odd,
}

impl Subset {
    fn keeps(self, row: usize) -> bool {
        match self {
            Subset::All => true,
            Subset::Even => row % 2 == 0,
            Subset::Odd => row % 2 == 1,
        }
    }
}

/// A named set of equal-length columns of doubles.
///
/// Column names are unique and kept sorted; rows are addressed by index and
/// materialized as [`Event`]s on demand. The optional livetime scalar is
/// carried for downstream consumers and never read by the learners.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSet {
    names: Vec<String>,
    cols: Vec<Vec<f64>>,
    n_events: usize,
    livetime: Option<f64>,
}

impl DataSet {
    /// Build a dataset from named columns, keeping every row.
    pub fn new(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        Self::with_subset(columns, Subset::All)
    }

    /// Build a dataset from named columns, keeping only the rows selected
    /// by `subset`.
    pub fn with_subset(columns: Vec<(String, Vec<f64>)>, subset: Subset) -> Result<Self> {
        let mut columns = columns;
        columns.sort_by(|(a, _), (b, _)| a.cmp(b));

        let expected = columns.first().map_or(0, |(_, col)| col.len());
        let mut names = Vec::with_capacity(columns.len());
        let mut cols = Vec::with_capacity(columns.len());
        for (name, col) in columns {
            if names.contains(&name) {
                return Err(Error::DuplicateColumn(name));
            }
            if col.len() != expected {
                return Err(Error::ColumnLengthMismatch {
                    name,
                    len: col.len(),
                    expected,
                });
            }
            names.push(name);
            let kept: Vec<f64> = col
                .into_iter()
                .enumerate()
                .filter(|&(row, _)| subset.keeps(row))
                .map(|(_, v)| v)
                .collect();
            cols.push(kept);
        }
        let n_events = cols.first().map_or(0, Vec::len);
        Ok(Self {
            names,
            cols,
            n_events,
            livetime: None,
        })
    }

    /// A projected dataset over a named subset of columns, preserving row
    /// order and the requested column order.
    pub fn project(&self, names: &[String]) -> Result<Self> {
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            cols.push(self.column(name)?.to_vec());
        }
        Ok(Self {
            names: names.to_vec(),
            cols,
            n_events: self.n_events,
            livetime: self.livetime,
        })
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        let index = self.column_index(name)?;
        Ok(&self.cols[index])
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::MissingColumn(name.to_owned()))
    }

    pub fn event(&self, row: usize) -> Event {
        Event::new(self.cols.iter().map(|col| col[row]).collect())
    }

    /// Materialize every row in order.
    pub fn events(&self) -> Vec<Event> {
        (0..self.n_events).map(|row| self.event(row)).collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_events(&self) -> usize {
        self.n_events
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn livetime(&self) -> Option<f64> {
        self.livetime
    }

    pub fn set_livetime(&mut self, livetime: f64) {
        self.livetime = Some(livetime);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataSet {
        DataSet::new(vec![
            ("b".to_owned(), vec![10., 20., 30., 40.]),
            ("a".to_owned(), vec![1., 2., 3., 4.]),
        ])
        .unwrap()
    }

    #[test]
    fn test_names_sorted_at_construction() {
        let ds = sample();
        assert_eq!(ds.names(), ["a", "b"]);
        assert_eq!(ds.column("a").unwrap(), [1., 2., 3., 4.]);
        assert_eq!(ds.column("b").unwrap(), [10., 20., 30., 40.]);
    }

    #[test]
    fn test_events_follow_sorted_order() {
        let ds = sample();
        assert_eq!(ds.event(2), Event::new(vec![3., 30.]));
        assert_eq!(ds.events().len(), 4);
    }

    #[test]
    fn test_even_odd_subsets() {
        let cols = vec![("a".to_owned(), vec![1., 2., 3., 4., 5.])];
        let even = DataSet::with_subset(cols.clone(), Subset::Even).unwrap();
        assert_eq!(even.column("a").unwrap(), [1., 3., 5.]);
        assert_eq!(even.n_events(), 3);

        let odd = DataSet::with_subset(cols, Subset::Odd).unwrap();
        assert_eq!(odd.column("a").unwrap(), [2., 4.]);
        assert_eq!(odd.n_events(), 2);
    }

    #[test]
    fn test_project_preserves_requested_order() {
        let ds = sample();
        let projected = ds.project(&["b".to_owned()]).unwrap();
        assert_eq!(projected.names(), ["b"]);
        assert_eq!(projected.event(0), Event::new(vec![10.]));
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let ds = sample();
        assert!(matches!(ds.column("z"), Err(Error::MissingColumn(_))));
        assert!(ds.project(&["z".to_owned()]).is_err());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let result = DataSet::new(vec![
            ("a".to_owned(), vec![1., 2.]),
            ("b".to_owned(), vec![1.]),
        ]);
        assert!(matches!(
            result,
            Err(Error::ColumnLengthMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = DataSet::new(vec![
            ("a".to_owned(), vec![1.]),
            ("a".to_owned(), vec![2.]),
        ]);
        assert!(matches!(result, Err(Error::DuplicateColumn(_))));
    }

    #[test]
    fn test_all_finite() {
        assert!(Event::new(vec![1., 2.]).all_finite());
        assert!(!Event::new(vec![1., f64::NAN]).all_finite());
        assert!(!Event::new(vec![f64::INFINITY]).all_finite());
    }
}
