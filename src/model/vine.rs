//! The vine ensemble: independent sub-models over overlapping slices of
//! one designated feature, averaged at inference.

use crate::data::Event;
use crate::model::train::Learner;
use crate::model::Model;
use crate::{Error, Result};
use log::info;
use serde::{Deserialize, Serialize};

/// Trains one base-learner sub-model per window `[f, f + width)` for
/// `f = min, min + step, ...` while `f + width <= max`. With `width`
/// larger than `step` the windows overlap and events train several
/// sub-models.
#[derive(Clone, Debug)]
pub struct VineLearner<L> {
    vine_feature: String,
    vine_feature_min: f64,
    vine_feature_max: f64,
    vine_feature_width: f64,
    vine_feature_step: f64,
    vine_feature_i: usize,
    learner: L,
    quiet: bool,
}

impl<L: Learner> VineLearner<L> {
    pub fn new(
        vine_feature: &str,
        vine_feature_min: f64,
        vine_feature_max: f64,
        vine_feature_width: f64,
        vine_feature_step: f64,
        learner: L,
    ) -> Result<Self> {
        let vine_feature_i = learner
            .feature_names()
            .iter()
            .position(|name| name == vine_feature)
            .ok_or_else(|| Error::MissingColumn(vine_feature.to_owned()))?;
        Ok(Self {
            vine_feature: vine_feature.to_owned(),
            vine_feature_min,
            vine_feature_max,
            vine_feature_width,
            vine_feature_step,
            vine_feature_i,
            learner,
            quiet: false,
        })
    }

    pub fn vine_feature(&self) -> &str {
        &self.vine_feature
    }

    pub fn vine_feature_min(&self) -> f64 {
        self.vine_feature_min
    }

    pub fn vine_feature_max(&self) -> f64 {
        self.vine_feature_max
    }

    pub fn vine_feature_width(&self) -> f64 {
        self.vine_feature_width
    }

    pub fn vine_feature_step(&self) -> f64 {
        self.vine_feature_step
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut L {
        &mut self.learner
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }
}

impl<L: Learner> Learner for VineLearner<L> {
    type Output = VineModel<L::Output>;

    fn feature_names(&self) -> &[String] {
        self.learner.feature_names()
    }

    fn sig_weight_name(&self) -> &str {
        self.learner.sig_weight_name()
    }

    fn bg_weight_name(&self) -> &str {
        self.learner.bg_weight_name()
    }

    fn train_given_everything(
        &mut self,
        sig: &[Event],
        bg: &[Event],
        init_sig_weights: &[f64],
        init_bg_weights: &[f64],
    ) -> VineModel<L::Output> {
        let total_sig: f64 = init_sig_weights.iter().sum();
        let total_bg: f64 = init_bg_weights.iter().sum();
        let sig_weights: Vec<f64> = init_sig_weights.iter().map(|w| w / total_sig).collect();
        let bg_weights: Vec<f64> = init_bg_weights.iter().map(|w| w / total_bg).collect();

        let mut bin_mins = Vec::new();
        let mut bin_maxs = Vec::new();
        let mut models = Vec::new();
        let mut feature_min = self.vine_feature_min;
        while feature_min + self.vine_feature_width <= self.vine_feature_max {
            let feature_max = feature_min + self.vine_feature_width;
            if !self.quiet {
                info!(
                    "Working on {} <= {} < {}...",
                    feature_min, self.vine_feature, feature_max
                );
            }

            let in_window = |event: &&Event| {
                let value = event.value(self.vine_feature_i);
                feature_min <= value && value < feature_max
            };
            let (bin_sig, bin_sig_weights): (Vec<Event>, Vec<f64>) = sig
                .iter()
                .zip(&sig_weights)
                .filter(|(event, _)| in_window(event))
                .map(|(event, &weight)| (event.clone(), weight))
                .unzip();
            let (bin_bg, bin_bg_weights): (Vec<Event>, Vec<f64>) = bg
                .iter()
                .zip(&bg_weights)
                .filter(|(event, _)| in_window(event))
                .map(|(event, &weight)| (event.clone(), weight))
                .unzip();

            let bin_model = self.learner.train_given_everything(
                &bin_sig,
                &bin_bg,
                &bin_sig_weights,
                &bin_bg_weights,
            );
            bin_mins.push(feature_min);
            bin_maxs.push(feature_max);
            models.push(bin_model);

            feature_min += self.vine_feature_step;
        }

        VineModel {
            feature_names: self.feature_names().to_vec(),
            vine_feature: self.vine_feature.clone(),
            vine_feature_i: self.vine_feature_i,
            bin_mins,
            bin_maxs,
            models,
        }
    }
}

/// Sub-models over half-open windows of the vine feature.
///
/// An event is scored by every window containing its vine-feature value
/// and receives the arithmetic mean of those sub-scores; an event in no
/// window scores NaN.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VineModel<M> {
    feature_names: Vec<String>,
    vine_feature: String,
    vine_feature_i: usize,
    bin_mins: Vec<f64>,
    bin_maxs: Vec<f64>,
    models: Vec<M>,
}

impl<M: Model> VineModel<M> {
    pub fn vine_feature(&self) -> &str {
        &self.vine_feature
    }

    pub fn n_models(&self) -> usize {
        self.models.len()
    }

    pub fn models(&self) -> &[M] {
        &self.models
    }

    pub fn bin_mins(&self) -> &[f64] {
        &self.bin_mins
    }

    pub fn bin_maxs(&self) -> &[f64] {
        &self.bin_maxs
    }
}

impl<M: Model> Model for VineModel<M> {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn base_score(&self, values: &[f64], use_purity: bool) -> f64 {
        let value = values[self.vine_feature_i];
        let mut scores = Vec::with_capacity(8);
        for (m, model) in self.models.iter().enumerate() {
            if self.bin_mins[m] <= value && value < self.bin_maxs[m] {
                scores.push(model.score_event(values, use_purity));
            }
        }
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}
