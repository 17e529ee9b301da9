//! Learners: single-tree training and the AdaBoost ensemble loop.

use crate::data::{DataSet, Event};
use crate::histogram::{Histogram, LinearHistogram, NonlinearHistogram};
use crate::model::bdt::BDTModel;
use crate::model::prune::Pruner;
use crate::model::{DTModel, DTNode, Model};
use crate::random::RandomSampler;
use crate::{Error, Result};
use const_default::ConstDefault;
use itertools::Itertools;
use log::{info, warn};
use pbr::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;

/// Errors numerically indistinguishable from zero or one are clamped this
/// far inside (0, 1) before the boost factor is computed.
const ERR_EPS: f64 = 1e-12;

/// Impurity function applied to the weighted signal fraction of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separation {
    Gini,
    CrossEntropy,
    MisclassError,
}

impl Separation {
    /// Impurity at purity `p`; `0 * ln 0` is taken as zero.
    pub fn index(self, p: f64) -> f64 {
        match self {
            Separation::Gini => p * (1. - p),
            Separation::CrossEntropy => {
                let term = |q: f64| if q > 0. { -q * q.ln() } else { 0. };
                term(p) + term(1. - p)
            }
            Separation::MisclassError => 1. - p.max(1. - p),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Separation::Gini => "gini",
            Separation::CrossEntropy => "cross_entropy",
            Separation::MisclassError => "misclass_error",
        }
    }
}

impl FromStr for Separation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gini" => Ok(Separation::Gini),
            "cross_entropy" => Ok(Separation::CrossEntropy),
            "misclass_error" => Ok(Separation::MisclassError),
            _ => Err(Error::UnknownSeparation(s.to_owned())),
        }
    }
}

impl fmt::Display for Separation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hyper-parameters for single-tree training.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DTHyperParam {
    /// Maximum tree depth; a root-only tree has depth 0.
    pub max_depth: usize,
    /// Minimum unweighted event count required in either child of a cut.
    pub min_split: usize,
    /// Histogram resolution for the candidate-cut search.
    pub num_cuts: usize,
    /// Equal-width bins when true, weight-quantile bins when false.
    pub linear_cuts: bool,
    /// If nonzero, the number of features drawn per node; zero considers
    /// every feature.
    pub num_random_variables: usize,
    pub separation: Separation,
    pub seed: u64,
}

impl ConstDefault for DTHyperParam {
    const DEFAULT: Self = Self {
        max_depth: 5,
        min_split: 20,
        num_cuts: 20,
        linear_cuts: true,
        num_random_variables: 0,
        separation: Separation::Gini,
        seed: 0,
    };
}

impl Default for DTHyperParam {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Hyper-parameters for the boosting loop.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BDTHyperParam {
    /// AdaBoost exponent; zero fixes every tree coefficient at 1.
    pub beta: f64,
    /// Fraction of each class drawn (with replacement) per round.
    pub frac_random_events: f64,
    pub num_trees: usize,
    pub quiet: bool,
}

impl ConstDefault for BDTHyperParam {
    const DEFAULT: Self = Self {
        beta: 1.,
        frac_random_events: 1.,
        num_trees: 300,
        quiet: false,
    };
}

impl Default for BDTHyperParam {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Trains a classification model from weighted signal and background
/// samples.
///
/// `train` resolves weight columns and normalizes each class to unit
/// weight; `train_given_weights` projects the datasets through the
/// learner's feature schema and drops events with non-finite values;
/// `train_given_everything` is the raw entry point over prepared events.
/// Training mutates the learner's sampler state, so all three take
/// `&mut self`.
pub trait Learner {
    type Output: Model;

    fn feature_names(&self) -> &[String];
    fn sig_weight_name(&self) -> &str;
    fn bg_weight_name(&self) -> &str;

    fn train_given_everything(
        &mut self,
        sig: &[Event],
        bg: &[Event],
        sig_weights: &[f64],
        bg_weights: &[f64],
    ) -> Self::Output;

    fn train(&mut self, sig: &DataSet, bg: &DataSet) -> Result<Self::Output> {
        let sig_weights = class_weights(sig, self.sig_weight_name(), "signal")?;
        let bg_weights = class_weights(bg, self.bg_weight_name(), "background")?;
        self.train_given_weights(sig, bg, &sig_weights, &bg_weights)
    }

    fn train_given_weights(
        &mut self,
        sig: &DataSet,
        bg: &DataSet,
        sig_weights: &[f64],
        bg_weights: &[f64],
    ) -> Result<Self::Output> {
        let train_sig = sig.project(self.feature_names())?;
        let train_bg = bg.project(self.feature_names())?;
        let (sig_events, sig_weights) = keep_finite(train_sig.events(), sig_weights);
        let (bg_events, bg_weights) = keep_finite(train_bg.events(), bg_weights);
        Ok(self.train_given_everything(&sig_events, &bg_events, &sig_weights, &bg_weights))
    }
}

/// Weight column of one class, normalized to unit sum; an empty weight
/// name means uniform weights.
fn class_weights(dataset: &DataSet, weight_name: &str, class: &'static str) -> Result<Vec<f64>> {
    let mut weights = if weight_name.is_empty() {
        vec![1.; dataset.n_events()]
    } else {
        dataset.column(weight_name)?.to_vec()
    };
    let total: f64 = weights.iter().sum();
    if !weights.is_empty() {
        if !(total > 0.) {
            return Err(Error::ZeroWeight(class));
        }
        for w in &mut weights {
            *w /= total;
        }
    }
    Ok(weights)
}

/// Drop events with any non-finite component, keeping weights aligned.
fn keep_finite(events: Vec<Event>, weights: &[f64]) -> (Vec<Event>, Vec<f64>) {
    events
        .into_iter()
        .zip(weights)
        .filter(|(event, _)| event.all_finite())
        .map(|(event, &weight)| (event, weight))
        .unzip()
}

fn normalized(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    weights.iter().map(|w| w / total).collect()
}

/// Trains a single decision tree by recursive histogram-binned cut search.
#[derive(Clone, Debug)]
pub struct DTLearner {
    feature_names: Vec<String>,
    sig_weight_name: String,
    bg_weight_name: String,
    hyper_param: DTHyperParam,
    sampler: RandomSampler,
}

impl DTLearner {
    /// A learner with uniform weights over the given features.
    pub fn new(feature_names: Vec<String>) -> Self {
        Self::with_weight_names(feature_names, "", "")
    }

    /// A learner reading both class weights from one column.
    pub fn with_weight_name(feature_names: Vec<String>, weight_name: &str) -> Self {
        Self::with_weight_names(feature_names, weight_name, weight_name)
    }

    /// A learner with separate signal and background weight columns;
    /// empty names mean uniform weights. Feature names are sorted so that
    /// trained model indices stay meaningful across inputs.
    pub fn with_weight_names(
        mut feature_names: Vec<String>,
        sig_weight_name: &str,
        bg_weight_name: &str,
    ) -> Self {
        feature_names.sort();
        let hyper_param = DTHyperParam::default();
        Self {
            feature_names,
            sig_weight_name: sig_weight_name.to_owned(),
            bg_weight_name: bg_weight_name.to_owned(),
            sampler: RandomSampler::new(hyper_param.seed),
            hyper_param,
        }
    }

    /// Replace the hyper-parameters, reseeding the sampler.
    pub fn with_hyper_param(mut self, hyper_param: DTHyperParam) -> Self {
        self.sampler = RandomSampler::new(hyper_param.seed);
        self.hyper_param = hyper_param;
        self
    }

    pub fn hyper_param(&self) -> &DTHyperParam {
        &self.hyper_param
    }

    pub fn hyper_param_mut(&mut self) -> &mut DTHyperParam {
        &mut self.hyper_param
    }

    /// The impurity function as its public string.
    pub fn separation_type(&self) -> &'static str {
        self.hyper_param.separation.name()
    }

    /// Select the impurity function by its public string.
    pub fn set_separation_type(&mut self, name: &str) -> Result<()> {
        self.hyper_param.separation = name.parse()?;
        Ok(())
    }

    fn build_tree(
        &mut self,
        sig_events: &[&Event],
        bg_events: &[&Event],
        sig_weights: &[f64],
        bg_weights: &[f64],
        depth: usize,
    ) -> DTNode {
        let hp = self.hyper_param;
        let n_sig = sig_events.len();
        let n_bg = bg_events.len();
        let w_sig: f64 = sig_weights.iter().sum();
        let w_bg: f64 = bg_weights.iter().sum();
        let w_here = w_sig + w_bg;
        let sep_here = hp.separation.index(w_sig / w_here);

        // too few events, max depth, or all one class: leaf now
        if n_sig + n_bg < hp.min_split || depth == hp.max_depth || n_sig == 0 || n_bg == 0 {
            return DTNode::Leaf {
                sep_index: sep_here,
                w_sig,
                w_bg,
                n_sig,
                n_bg,
            };
        }

        let n_available = self.feature_names.len();
        let n_split_features = if hp.num_random_variables != 0 {
            hp.num_random_variables
        } else {
            n_available
        };
        let split_features: Vec<usize> = if n_split_features == n_available {
            (0..n_available).collect()
        } else {
            self.sampler
                .sample_range(n_split_features, 0, n_available, false)
        };

        // each candidate feature scans independently; the reduction below
        // keeps the first-seen winner among equal gains
        let candidates: Vec<Option<(f64, f64)>> = split_features
            .par_iter()
            .map(|&i_f| {
                scan_feature(
                    i_f,
                    sig_events,
                    bg_events,
                    sig_weights,
                    bg_weights,
                    w_sig,
                    w_bg,
                    w_here,
                    sep_here,
                    &hp,
                )
            })
            .collect();

        let mut best: Option<(usize, f64, f64)> = None;
        for (&i_f, candidate) in split_features.iter().zip_eq(&candidates) {
            if let Some((sep_gain, cut_val)) = *candidate {
                if best.map_or(true, |(_, best_gain, _)| sep_gain > best_gain) {
                    best = Some((i_f, sep_gain, cut_val));
                }
            }
        }

        let (best_i_f, best_sep_gain, best_cut_val) = match best {
            Some(found) => found,
            None => {
                return DTNode::Leaf {
                    sep_index: sep_here,
                    w_sig,
                    w_bg,
                    n_sig,
                    n_bg,
                }
            }
        };

        let mut sig_left = Vec::with_capacity(n_sig);
        let mut sig_right = Vec::with_capacity(n_sig);
        let mut sig_weights_left = Vec::with_capacity(n_sig);
        let mut sig_weights_right = Vec::with_capacity(n_sig);
        for (&event, &weight) in sig_events.iter().zip_eq(sig_weights) {
            if event.value(best_i_f) < best_cut_val {
                sig_left.push(event);
                sig_weights_left.push(weight);
            } else {
                sig_right.push(event);
                sig_weights_right.push(weight);
            }
        }
        let mut bg_left = Vec::with_capacity(n_bg);
        let mut bg_right = Vec::with_capacity(n_bg);
        let mut bg_weights_left = Vec::with_capacity(n_bg);
        let mut bg_weights_right = Vec::with_capacity(n_bg);
        for (&event, &weight) in bg_events.iter().zip_eq(bg_weights) {
            if event.value(best_i_f) < best_cut_val {
                bg_left.push(event);
                bg_weights_left.push(weight);
            } else {
                bg_right.push(event);
                bg_weights_right.push(weight);
            }
        }

        let left = self.build_tree(
            &sig_left,
            &bg_left,
            &sig_weights_left,
            &bg_weights_left,
            depth + 1,
        );
        let right = self.build_tree(
            &sig_right,
            &bg_right,
            &sig_weights_right,
            &bg_weights_right,
            depth + 1,
        );
        DTNode::Split {
            sep_gain: best_sep_gain,
            sep_index: sep_here,
            feature_id: best_i_f,
            feature_val: best_cut_val,
            w_sig,
            w_bg,
            n_sig,
            n_bg,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

impl Learner for DTLearner {
    type Output = DTModel;

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn sig_weight_name(&self) -> &str {
        &self.sig_weight_name
    }

    fn bg_weight_name(&self) -> &str {
        &self.bg_weight_name
    }

    fn train_given_everything(
        &mut self,
        sig: &[Event],
        bg: &[Event],
        sig_weights: &[f64],
        bg_weights: &[f64],
    ) -> DTModel {
        debug_assert_eq!(sig.len(), sig_weights.len());
        debug_assert_eq!(bg.len(), bg_weights.len());
        let sig_refs: Vec<&Event> = sig.iter().collect();
        let bg_refs: Vec<&Event> = bg.iter().collect();
        let root = self.build_tree(&sig_refs, &bg_refs, sig_weights, bg_weights, 0);
        DTModel::new(self.feature_names.clone(), root)
    }
}

/// Best cut on one feature: `(sep_gain, cut_val)`, or `None` when no
/// boundary satisfies the `min_split` requirement.
#[allow(clippy::too_many_arguments)]
fn scan_feature(
    i_f: usize,
    sig_events: &[&Event],
    bg_events: &[&Event],
    sig_weights: &[f64],
    bg_weights: &[f64],
    w_sig: f64,
    w_bg: f64,
    w_here: f64,
    sep_here: f64,
    hp: &DTHyperParam,
) -> Option<(f64, f64)> {
    let sig_values: Vec<f64> = sig_events.iter().map(|e| e.value(i_f)).collect();
    let bg_values: Vec<f64> = bg_events.iter().map(|e| e.value(i_f)).collect();
    let feature_min = sig_values
        .iter()
        .chain(&bg_values)
        .cloned()
        .fold(f64::INFINITY, f64::min);
    let feature_max = sig_values
        .iter()
        .chain(&bg_values)
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);

    let (w_h_sig, w_h_bg, n_h_sig, n_h_bg) = if hp.linear_cuts {
        let n_bins = hp.num_cuts + 1;
        let mut w_h_sig = LinearHistogram::new(feature_min, feature_max, n_bins);
        let mut w_h_bg = LinearHistogram::new(feature_min, feature_max, n_bins);
        let mut n_h_sig = LinearHistogram::new(feature_min, feature_max, n_bins);
        let mut n_h_bg = LinearHistogram::new(feature_min, feature_max, n_bins);
        w_h_sig.fill(&sig_values, sig_weights);
        w_h_bg.fill(&bg_values, bg_weights);
        n_h_sig.fill_unweighted(&sig_values);
        n_h_bg.fill_unweighted(&bg_values);
        (
            Histogram::Linear(w_h_sig),
            Histogram::Linear(w_h_bg),
            Histogram::Linear(n_h_sig),
            Histogram::Linear(n_h_bg),
        )
    } else {
        let (sig_sorted_values, sig_sorted_weights) =
            NonlinearHistogram::sorted_values_weights(&sig_values, sig_weights);
        let (bg_sorted_values, bg_sorted_weights) =
            NonlinearHistogram::sorted_values_weights(&bg_values, bg_weights);
        let mut all_values = sig_sorted_values.clone();
        all_values.extend_from_slice(&bg_sorted_values);
        let mut all_weights = sig_sorted_weights.clone();
        all_weights.extend_from_slice(&bg_sorted_weights);
        let bin_edges = NonlinearHistogram::ntile_boundaries(hp.num_cuts, &all_values, &all_weights);

        let mut w_h_sig = NonlinearHistogram::new(bin_edges.clone());
        w_h_sig.fill_presorted(&sig_sorted_values, &sig_sorted_weights);
        let mut w_h_bg = NonlinearHistogram::new(bin_edges.clone());
        w_h_bg.fill_presorted(&bg_sorted_values, &bg_sorted_weights);
        let mut n_h_sig = NonlinearHistogram::new(bin_edges.clone());
        n_h_sig.fill_presorted(&sig_sorted_values, &vec![1.; sig_sorted_values.len()]);
        let mut n_h_bg = NonlinearHistogram::new(bin_edges);
        n_h_bg.fill_presorted(&bg_sorted_values, &vec![1.; bg_sorted_values.len()]);
        (
            Histogram::Nonlinear(w_h_sig),
            Histogram::Nonlinear(w_h_bg),
            Histogram::Nonlinear(n_h_sig),
            Histogram::Nonlinear(n_h_bg),
        )
    };

    let n_sig = sig_events.len() as f64;
    let n_bg = bg_events.len() as f64;
    let min_split = hp.min_split as f64;
    let mut w_sig_left = 0.;
    let mut w_bg_left = 0.;
    let mut n_sig_left = 0.;
    let mut n_bg_left = 0.;
    let mut w_sig_right = w_sig;
    let mut w_bg_right = w_bg;
    let mut n_sig_right = n_sig;
    let mut n_bg_right = n_bg;

    // the cut sits at the right edge of each bin, so the last bin offers
    // no boundary to check
    let n_bins = w_h_sig.n_bins();
    let mut best_sep_gain = -1.;
    let mut best: Option<(f64, f64)> = None;
    for i_bin in 0..n_bins.saturating_sub(1) {
        w_sig_left += w_h_sig.bins()[i_bin];
        w_bg_left += w_h_bg.bins()[i_bin];
        n_sig_left += n_h_sig.bins()[i_bin];
        n_bg_left += n_h_bg.bins()[i_bin];
        w_sig_right -= w_h_sig.bins()[i_bin];
        w_bg_right -= w_h_bg.bins()[i_bin];
        n_sig_right -= n_h_sig.bins()[i_bin];
        n_bg_right -= n_h_bg.bins()[i_bin];

        let n_left = n_sig_left + n_bg_left;
        let n_right = n_sig_right + n_bg_right;
        if n_left < min_split {
            continue; // not enough to the left yet
        }
        if n_right < min_split {
            break; // not enough remaining to the right anymore
        }
        let w_left = w_sig_left + w_bg_left;
        let w_right = w_sig_right + w_bg_right;
        let purity_left = w_sig_left / w_left;
        let purity_right = w_sig_right / w_right;
        let sep_gain = w_here * sep_here
            - w_left * hp.separation.index(purity_left)
            - w_right * hp.separation.index(purity_right);
        if sep_gain > best_sep_gain {
            best_sep_gain = sep_gain;
            best = Some((sep_gain, w_h_sig.value_for_index(i_bin + 1)));
        }
    }
    best
}

/// Trains a boosted decision tree: AdaBoost rounds over an inner
/// [`DTLearner`], with optional pruning before and after each round's
/// weight update.
#[derive(Clone, Debug)]
pub struct BDTLearner {
    dtlearner: DTLearner,
    hyper_param: BDTHyperParam,
    before_pruners: Vec<Pruner>,
    after_pruners: Vec<Pruner>,
}

impl BDTLearner {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self::with_weight_names(feature_names, "", "")
    }

    pub fn with_weight_name(feature_names: Vec<String>, weight_name: &str) -> Self {
        Self::with_weight_names(feature_names, weight_name, weight_name)
    }

    pub fn with_weight_names(
        feature_names: Vec<String>,
        sig_weight_name: &str,
        bg_weight_name: &str,
    ) -> Self {
        Self {
            dtlearner: DTLearner::with_weight_names(feature_names, sig_weight_name, bg_weight_name),
            hyper_param: BDTHyperParam::default(),
            before_pruners: Vec::new(),
            after_pruners: Vec::new(),
        }
    }

    pub fn dtlearner(&self) -> &DTLearner {
        &self.dtlearner
    }

    pub fn dtlearner_mut(&mut self) -> &mut DTLearner {
        &mut self.dtlearner
    }

    pub fn with_hyper_param(mut self, hyper_param: BDTHyperParam) -> Self {
        self.hyper_param = hyper_param;
        self
    }

    pub fn hyper_param(&self) -> &BDTHyperParam {
        &self.hyper_param
    }

    pub fn hyper_param_mut(&mut self) -> &mut BDTHyperParam {
        &mut self.hyper_param
    }

    /// Pruners applied to each round's tree before the weight update.
    pub fn add_before_pruner(&mut self, pruner: Pruner) {
        self.before_pruners.push(pruner);
    }

    /// Pruners applied after the weight update.
    pub fn add_after_pruner(&mut self, pruner: Pruner) {
        self.after_pruners.push(pruner);
    }

    pub fn clear_before_pruners(&mut self) {
        self.before_pruners.clear();
    }

    pub fn clear_after_pruners(&mut self) {
        self.after_pruners.clear();
    }
}

impl Learner for BDTLearner {
    type Output = BDTModel;

    fn feature_names(&self) -> &[String] {
        self.dtlearner.feature_names()
    }

    fn sig_weight_name(&self) -> &str {
        self.dtlearner.sig_weight_name()
    }

    fn bg_weight_name(&self) -> &str {
        self.dtlearner.bg_weight_name()
    }

    fn train_given_everything(
        &mut self,
        all_sig: &[Event],
        all_bg: &[Event],
        init_sig_weights: &[f64],
        init_bg_weights: &[f64],
    ) -> BDTModel {
        let n_sig = all_sig.len();
        let n_bg = all_bg.len();
        let n_features = self.dtlearner.feature_names.len();
        let mut all_sig_weights = normalized(init_sig_weights);
        let mut all_bg_weights = normalized(init_bg_weights);

        // shallow trees on large samples: insist on a sample-size-scaled
        // minimum split, restored once the ensemble is built
        let save_min_split = self.dtlearner.hyper_param.min_split;
        self.dtlearner.hyper_param.min_split =
            save_min_split.max((n_sig + n_bg) / (n_features * n_features) / 20);

        let hp = self.hyper_param;
        let mut dtmodels = Vec::with_capacity(hp.num_trees);
        let mut alphas = Vec::with_capacity(hp.num_trees);
        let mut progress = if hp.quiet {
            None
        } else {
            let mut pb = ProgressBar::on(io::stderr(), hp.num_trees as u64);
            pb.message("training decision trees ");
            Some(pb)
        };

        for m in 0..hp.num_trees {
            let n_sig_used = (hp.frac_random_events * n_sig as f64) as usize;
            let n_bg_used = (hp.frac_random_events * n_bg as f64) as usize;
            let picked;
            let (sig_events, sig_weights, bg_events, bg_weights): (
                &[Event],
                &[f64],
                &[Event],
                &[f64],
            ) = if n_sig_used < n_sig || n_bg_used < n_bg {
                let sig_indices =
                    self.dtlearner
                        .sampler
                        .sample_range(n_sig_used, 0, n_sig, true);
                let bg_indices = self.dtlearner.sampler.sample_range(n_bg_used, 0, n_bg, true);
                picked = (
                    sig_indices
                        .iter()
                        .map(|&i| all_sig[i].clone())
                        .collect::<Vec<_>>(),
                    sig_indices
                        .iter()
                        .map(|&i| all_sig_weights[i])
                        .collect::<Vec<_>>(),
                    bg_indices
                        .iter()
                        .map(|&i| all_bg[i].clone())
                        .collect::<Vec<_>>(),
                    bg_indices
                        .iter()
                        .map(|&i| all_bg_weights[i])
                        .collect::<Vec<_>>(),
                );
                (&picked.0, &picked.1, &picked.2, &picked.3)
            } else {
                (all_sig, &all_sig_weights, all_bg, &all_bg_weights)
            };

            let mut dtmodel =
                self.dtlearner
                    .train_given_everything(sig_events, bg_events, sig_weights, bg_weights);

            for pruner in &self.before_pruners {
                pruner.prune(&mut dtmodel);
            }

            // label-mode scores of every original event drive the update
            let all_sig_result = dtmodel.score_events(all_sig, false);
            let all_bg_result = dtmodel.score_events(all_bg, false);

            let sum_sig_weights: f64 = all_sig_weights.iter().sum();
            let sum_bg_weights: f64 = all_bg_weights.iter().sum();
            let sum_wrong_sig_weights: f64 = all_sig_weights
                .iter()
                .zip_eq(&all_sig_result)
                .filter(|&(_, &result)| result < 0.)
                .map(|(&weight, _)| weight)
                .sum();
            let sum_wrong_bg_weights: f64 = all_bg_weights
                .iter()
                .zip_eq(&all_bg_result)
                .filter(|&(_, &result)| result > 0.)
                .map(|(&weight, _)| weight)
                .sum();

            let err_m = (sum_wrong_sig_weights + sum_wrong_bg_weights)
                / (sum_sig_weights + sum_bg_weights);
            let err = err_m.clamp(ERR_EPS, 1. - ERR_EPS);
            let boost_factor = ((1. - err) / err).powf(hp.beta);
            let alpha_m = if hp.beta != 0. { boost_factor.ln() } else { 1. };

            for (weight, &result) in all_sig_weights.iter_mut().zip_eq(&all_sig_result) {
                if result < 0. {
                    *weight *= boost_factor;
                }
            }
            for (weight, &result) in all_bg_weights.iter_mut().zip_eq(&all_bg_result) {
                if result > 0. {
                    *weight *= boost_factor;
                }
            }
            let new_total_weight: f64 =
                all_sig_weights.iter().sum::<f64>() + all_bg_weights.iter().sum::<f64>();
            for weight in all_sig_weights
                .iter_mut()
                .chain(all_bg_weights.iter_mut())
            {
                *weight /= new_total_weight;
            }

            for pruner in &self.after_pruners {
                pruner.prune(&mut dtmodel);
            }
            dtmodels.push(dtmodel);
            alphas.push(alpha_m);
            if let Some(pb) = progress.as_mut() {
                pb.inc();
            }

            if err_m <= 0. {
                info!(
                    "boosting round {} classified every event correctly; stopping early",
                    m + 1
                );
                break;
            }
            if err_m >= 0.5 {
                warn!(
                    "boosting round {}: weighted error {:.4} is no better than chance",
                    m + 1,
                    err_m
                );
            }
        }

        if let Some(pb) = progress.as_mut() {
            pb.finish_print("training decision trees | done");
        }
        self.dtlearner.hyper_param.min_split = save_min_split;

        BDTModel::new(self.dtlearner.feature_names.clone(), dtmodels, alphas)
    }
}
