//! The boosted ensemble: an ordered list of trees with per-round
//! coefficients.

use crate::model::{importance_by_name, DTModel, Model};
use crate::{Error, Result};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// A boosted decision tree model.
///
/// Scores are the coefficient-weighted mean of the per-tree scores,
/// clipped to `[-1, +1]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BDTModel {
    feature_names: Vec<String>,
    dtmodels: Vec<DTModel>,
    alphas: Vec<f64>,
    max_response: f64,
}

impl BDTModel {
    pub fn new(feature_names: Vec<String>, dtmodels: Vec<DTModel>, alphas: Vec<f64>) -> Self {
        assert_eq!(
            dtmodels.len(),
            alphas.len(),
            "each tree needs exactly one coefficient"
        );
        let max_response = alphas.iter().sum();
        Self {
            feature_names,
            dtmodels,
            alphas,
            max_response,
        }
    }

    pub fn n_dtmodels(&self) -> usize {
        self.dtmodels.len()
    }

    pub fn dtmodels(&self) -> &[DTModel] {
        &self.dtmodels
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn get_dtmodel(&self, m: usize) -> Option<&DTModel> {
        self.dtmodels.get(m)
    }

    pub fn get_alpha(&self, m: usize) -> Option<f64> {
        self.alphas.get(m).copied()
    }

    /// The sub-ensemble over trees `[n_i, n_f)`.
    pub fn get_subset(&self, n_i: usize, n_f: usize) -> Result<BDTModel> {
        if n_i >= n_f || n_f > self.n_dtmodels() {
            return Err(Error::InvalidSubsetRange {
                start: n_i,
                end: n_f,
                len: self.n_dtmodels(),
            });
        }
        Ok(Self::new(
            self.feature_names.clone(),
            self.dtmodels[n_i..n_f].to_vec(),
            self.alphas[n_i..n_f].to_vec(),
        ))
    }

    /// The sub-ensemble over an arbitrary subsequence of tree indices.
    pub fn get_subset_by_indices(&self, indices: &[usize]) -> Result<BDTModel> {
        let mut dtmodels = Vec::with_capacity(indices.len());
        let mut alphas = Vec::with_capacity(indices.len());
        for &index in indices {
            if index >= self.n_dtmodels() {
                return Err(Error::InvalidTreeIndex {
                    index,
                    len: self.n_dtmodels(),
                });
            }
            dtmodels.push(self.dtmodels[index].clone());
            alphas.push(self.alphas[index]);
        }
        Ok(Self::new(self.feature_names.clone(), dtmodels, alphas))
    }

    /// Keep tree 0 plus every tree whose coefficient step away from its
    /// predecessor exceeds `threshold` percent of the largest step.
    pub fn get_trimmed(&self, threshold: f64) -> BDTModel {
        if self.dtmodels.is_empty() {
            return self.clone();
        }
        let d_alpha = |i: usize| (self.alphas[i] - self.alphas[i - 1]).abs();
        let mut max_param: f64 = 0.;
        for i in 1..self.n_dtmodels() {
            max_param = max_param.max(d_alpha(i));
        }
        let mut dtmodels = vec![self.dtmodels[0].clone()];
        let mut alphas = vec![self.alphas[0]];
        for i in 1..self.n_dtmodels() {
            if d_alpha(i) / max_param > threshold / 100. {
                dtmodels.push(self.dtmodels[i].clone());
                alphas.push(self.alphas[i]);
            }
        }
        Self::new(self.feature_names.clone(), dtmodels, alphas)
    }

    /// Ensemble variable importance: the sum of each tree's normalized
    /// importance, optionally weighted by its coefficient, renormalized.
    /// Single-leaf trees contribute nothing.
    pub fn variable_importance(&self, sep_weighted: bool, tree_weighted: bool) -> Vec<f64> {
        self.combined_importance(tree_weighted, |dtmodel| {
            dtmodel.variable_importance(sep_weighted)
        })
    }

    /// [`Self::variable_importance`] keyed by feature name.
    pub fn variable_importance_by_name(
        &self,
        sep_weighted: bool,
        tree_weighted: bool,
    ) -> HashMap<String, f64> {
        importance_by_name(
            &self.feature_names,
            self.variable_importance(sep_weighted, tree_weighted),
        )
    }

    /// As [`Self::variable_importance`], over only the nodes one event
    /// passes through.
    pub fn event_variable_importance(
        &self,
        values: &[f64],
        sep_weighted: bool,
        tree_weighted: bool,
    ) -> Vec<f64> {
        self.combined_importance(tree_weighted, |dtmodel| {
            dtmodel.event_variable_importance(values, sep_weighted)
        })
    }

    fn combined_importance<F>(&self, tree_weighted: bool, per_tree: F) -> Vec<f64>
    where
        F: Fn(&DTModel) -> Vec<f64>,
    {
        let mut abs_var_imp = vec![0.; self.feature_names.len()];
        for (dtmodel, &alpha) in self.dtmodels.iter().zip(&self.alphas) {
            if dtmodel.root().max_depth() == 0 {
                continue;
            }
            for (total, this) in abs_var_imp.iter_mut().zip(per_tree(dtmodel)) {
                *total += if tree_weighted { this * alpha } else { this };
            }
        }
        let sum: f64 = abs_var_imp.iter().sum();
        if sum > 0. {
            for v in &mut abs_var_imp {
                *v /= sum;
            }
        }
        abs_var_imp
    }
}

impl Model for BDTModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn base_score(&self, values: &[f64], use_purity: bool) -> f64 {
        let mut score = 0.;
        for (dtmodel, &alpha) in self.dtmodels.iter().zip(&self.alphas) {
            score += dtmodel.base_score(values, use_purity) * alpha / self.max_response;
        }
        score.clamp(-1., 1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataSet;
    use crate::model::train::{BDTLearner, Learner};
    use crate::model::{load, save, DTNode};
    use assert_approx_eq::assert_approx_eq;

    fn leaf(w_sig: f64, w_bg: f64, n_sig: usize, n_bg: usize) -> DTNode {
        DTNode::Leaf {
            sep_index: 0.,
            w_sig,
            w_bg,
            n_sig,
            n_bg,
        }
    }

    fn stump(cut: f64) -> DTModel {
        let root = DTNode::Split {
            sep_gain: 0.2,
            sep_index: 0.25,
            feature_id: 0,
            feature_val: cut,
            w_sig: 0.5,
            w_bg: 0.5,
            n_sig: 50,
            n_bg: 50,
            left: Box::new(leaf(0.1, 0.4, 10, 40)),
            right: Box::new(leaf(0.4, 0.1, 40, 10)),
        };
        DTModel::new(vec!["x".to_owned()], root)
    }

    fn trained() -> BDTModel {
        let sig = DataSet::new(vec![(
            "x".to_owned(),
            (0..80).map(|i| 1. + f64::from(i % 9)).collect(),
        )])
        .unwrap();
        let bg = DataSet::new(vec![(
            "x".to_owned(),
            (0..80).map(|i| -1. - f64::from(i % 6)).collect(),
        )])
        .unwrap();
        let mut learner = BDTLearner::new(vec!["x".to_owned()]);
        learner.hyper_param_mut().num_trees = 10;
        learner.hyper_param_mut().frac_random_events = 0.8;
        learner.hyper_param_mut().quiet = true;
        learner.train(&sig, &bg).unwrap()
    }

    #[test]
    fn test_full_subset_scores_identically() {
        let model = trained();
        let n = model.n_dtmodels();
        let subset = model.get_subset(0, n).unwrap();
        for x in [-7., -2.5, -1., 0., 1., 3.3, 9.] {
            assert_eq!(
                model.score_event(&[x], false),
                subset.score_event(&[x], false)
            );
            assert_eq!(
                model.score_event(&[x], true),
                subset.score_event(&[x], true)
            );
        }
    }

    #[test]
    fn test_subset_range_checks() {
        let model = BDTModel::new(
            vec!["x".to_owned()],
            vec![stump(0.), stump(1.)],
            vec![1., 2.],
        );
        assert!(model.get_subset(0, 2).is_ok());
        assert!(matches!(
            model.get_subset(1, 1),
            Err(Error::InvalidSubsetRange { .. })
        ));
        assert!(matches!(
            model.get_subset(2, 1),
            Err(Error::InvalidSubsetRange { .. })
        ));
        assert!(matches!(
            model.get_subset(0, 3),
            Err(Error::InvalidSubsetRange { .. })
        ));
        assert!(matches!(
            model.get_subset_by_indices(&[0, 2]),
            Err(Error::InvalidTreeIndex { .. })
        ));
    }

    #[test]
    fn test_subset_by_indices_reorders() {
        let model = BDTModel::new(
            vec!["x".to_owned()],
            vec![stump(0.), stump(1.), stump(2.)],
            vec![1., 2., 3.],
        );
        let subset = model.get_subset_by_indices(&[2, 0]).unwrap();
        assert_eq!(subset.n_dtmodels(), 2);
        assert_eq!(subset.alphas(), [3., 1.]);
    }

    #[test]
    fn test_trimming_keeps_first_and_large_steps() {
        let model = BDTModel::new(
            vec!["x".to_owned()],
            vec![stump(0.); 4],
            vec![5., 5., 3., 2.9],
        );
        // steps: |5-5|=0, |3-5|=2 (max), |2.9-3|=0.1
        let trimmed = model.get_trimmed(10.);
        assert_eq!(trimmed.alphas(), [5., 3.]);
        // a zero threshold still drops exactly-zero steps
        let trimmed = model.get_trimmed(0.);
        assert_eq!(trimmed.alphas(), [5., 3., 2.9]);
    }

    #[test]
    fn test_scores_clipped_to_unit_interval() {
        let model = trained();
        for x in [-10., -0.5, 0.5, 10.] {
            assert!(model.score_event(&[x], false).abs() <= 1.);
            assert!(model.score_event(&[x], true).abs() <= 1.);
        }
    }

    #[test]
    fn test_variable_importance_normalized() {
        let model = trained();
        for (sep_weighted, tree_weighted) in
            [(false, false), (false, true), (true, false), (true, true)]
        {
            let imp = model.variable_importance(sep_weighted, tree_weighted);
            assert_approx_eq!(imp.iter().sum::<f64>(), 1.);
        }
        let imp = model.event_variable_importance(&[1.5], false, true);
        assert_approx_eq!(imp.iter().sum::<f64>(), 1.);

        let by_name = model.variable_importance_by_name(true, true);
        assert_approx_eq!(by_name["x"], 1.);
    }

    #[test]
    fn test_single_leaf_trees_contribute_nothing() {
        let single = DTModel::new(vec!["x".to_owned()], leaf(1., 0., 10, 0));
        let model = BDTModel::new(vec!["x".to_owned()], vec![single], vec![1.]);
        assert_eq!(model.variable_importance(false, false), [0.]);
    }

    #[test]
    fn test_save_load_round_trip() {
        let model = trained();
        let mut buf = Vec::new();
        save(&model, &mut buf).unwrap();
        let loaded: BDTModel = load(buf.as_slice()).unwrap();
        assert_eq!(model, loaded);
        assert_eq!(
            model.score_event(&[2.], true),
            loaded.score_event(&[2.], true)
        );
    }
}
