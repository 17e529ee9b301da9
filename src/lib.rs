/*!
`bdtree` trains and applies boosted decision tree ensembles for two-class
classification of weighted tabular data.

Events are rows of `f64` feature values labeled *signal* or *background*,
each carrying a real-valued weight. A [`DTLearner`] grows a single decision
tree by histogram-binned cut search; a [`BDTLearner`] drives AdaBoost rounds
over an inner tree learner; a [`VineLearner`] trains independent sub-models
on overlapping slices of one feature. Trained models score events in
`[-1, +1]`, report variable importance, and round-trip through
[`model::save`] / [`model::load`].

# Example

```
use bdtree::{BDTLearner, DataSet, Learner, Model};

let sig = DataSet::new(vec![("x".to_owned(), vec![1.0; 50])]).unwrap();
let bg = DataSet::new(vec![("x".to_owned(), vec![-1.0; 50])]).unwrap();

let mut learner = BDTLearner::new(vec!["x".to_owned()]);
learner.hyper_param_mut().num_trees = 10;
learner.hyper_param_mut().quiet = true;
let model = learner.train(&sig, &bg).unwrap();

assert!(model.score_event(&[1.0], false) > 0.0);
assert!(model.score_event(&[-1.0], false) < 0.0);
```
*/

pub mod data;
pub mod histogram;
pub mod model;
pub mod random;

pub use crate::data::{DataSet, Event, Subset};
pub use crate::model::bdt::BDTModel;
pub use crate::model::prune::Pruner;
pub use crate::model::train::{
    BDTHyperParam, BDTLearner, DTHyperParam, DTLearner, Learner, Separation,
};
pub use crate::model::vine::{VineLearner, VineModel};
pub use crate::model::{DTModel, DTNode, Model};
pub use crate::random::RandomSampler;

use thiserror::Error as ThisError;

/// Errors surfaced by dataset construction, training, and model subsetting.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("dataset does not contain a column named {0:?}")]
    MissingColumn(String),

    #[error("column {name:?} has length {len}, expected {expected}")]
    ColumnLengthMismatch {
        name: String,
        len: usize,
        expected: usize,
    },

    #[error("duplicate column name {0:?}")]
    DuplicateColumn(String),

    #[error("unknown separation type {0:?}")]
    UnknownSeparation(String),

    #[error("invalid tree range [{start}, {end}) for an ensemble of {len} trees")]
    InvalidSubsetRange {
        start: usize,
        end: usize,
        len: usize,
    },

    #[error("tree index {index} out of bounds for an ensemble of {len} trees")]
    InvalidTreeIndex { index: usize, len: usize },

    #[error("{0} sample has zero total weight")]
    ZeroWeight(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
