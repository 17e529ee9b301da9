pub mod bdt;
pub mod prune;
pub mod train;
pub mod vine;

use crate::data::{DataSet, Event};
use crate::Result;
use hashbrown::HashMap;
use log::info;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::time::Instant;

/// A trained classifier scoring events in `[-1, +1]`.
pub trait Model {
    fn feature_names(&self) -> &[String];

    /// Score an event whose components are all finite.
    fn base_score(&self, values: &[f64], use_purity: bool) -> f64;

    /// Score a single event; any non-finite component yields NaN.
    fn score_event(&self, values: &[f64], use_purity: bool) -> f64 {
        if values.iter().all(|v| v.is_finite()) {
            self.base_score(values, use_purity)
        } else {
            f64::NAN
        }
    }

    /// Score a batch of events, in order.
    fn score_events(&self, events: &[Event], use_purity: bool) -> Vec<f64>
    where
        Self: Sync,
    {
        events
            .par_iter()
            .map(|e| self.score_event(e.values(), use_purity))
            .collect()
    }

    /// Score every row of a dataset, projecting it through this model's
    /// feature schema first.
    fn score_dataset(&self, dataset: &DataSet, use_purity: bool) -> Result<Vec<f64>>
    where
        Self: Sync,
    {
        let projected = dataset.project(self.feature_names())?;
        Ok(self.score_events(&projected.events(), use_purity))
    }
}

/// A decision-tree node: either a leaf or a single-feature cut owning two
/// children.
///
/// An event routes left when its value on the cut feature is below the cut
/// and right otherwise; leaf labels are +1 when the weighted signal fraction
/// exceeds one half and -1 otherwise.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum DTNode {
    Leaf {
        sep_index: f64,
        w_sig: f64,
        w_bg: f64,
        n_sig: usize,
        n_bg: usize,
    },
    Split {
        sep_gain: f64,
        sep_index: f64,
        feature_id: usize,
        feature_val: f64,
        w_sig: f64,
        w_bg: f64,
        n_sig: usize,
        n_bg: usize,
        left: Box<DTNode>,
        right: Box<DTNode>,
    },
}

impl DTNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, DTNode::Leaf { .. })
    }

    pub fn w_sig(&self) -> f64 {
        match *self {
            DTNode::Leaf { w_sig, .. } | DTNode::Split { w_sig, .. } => w_sig,
        }
    }

    pub fn w_bg(&self) -> f64 {
        match *self {
            DTNode::Leaf { w_bg, .. } | DTNode::Split { w_bg, .. } => w_bg,
        }
    }

    pub fn n_sig(&self) -> usize {
        match *self {
            DTNode::Leaf { n_sig, .. } | DTNode::Split { n_sig, .. } => n_sig,
        }
    }

    pub fn n_bg(&self) -> usize {
        match *self {
            DTNode::Leaf { n_bg, .. } | DTNode::Split { n_bg, .. } => n_bg,
        }
    }

    pub fn w_total(&self) -> f64 {
        self.w_sig() + self.w_bg()
    }

    pub fn n_total(&self) -> usize {
        self.n_sig() + self.n_bg()
    }

    /// Weighted signal fraction at this node.
    pub fn purity(&self) -> f64 {
        self.w_sig() / self.w_total()
    }

    pub fn sep_index(&self) -> f64 {
        match *self {
            DTNode::Leaf { sep_index, .. } | DTNode::Split { sep_index, .. } => sep_index,
        }
    }

    /// Separation gain of the cut; zero at a leaf.
    pub fn sep_gain(&self) -> f64 {
        match *self {
            DTNode::Leaf { .. } => 0.,
            DTNode::Split { sep_gain, .. } => sep_gain,
        }
    }

    /// Classification label, +1 or -1.
    pub fn label(&self) -> i32 {
        if self.purity() > 0.5 {
            1
        } else {
            -1
        }
    }

    pub fn feature_id(&self) -> Option<usize> {
        match *self {
            DTNode::Leaf { .. } => None,
            DTNode::Split { feature_id, .. } => Some(feature_id),
        }
    }

    pub fn feature_val(&self) -> Option<f64> {
        match *self {
            DTNode::Leaf { .. } => None,
            DTNode::Split { feature_val, .. } => Some(feature_val),
        }
    }

    /// Cut feature name resolved through a model's name table.
    pub fn feature_name<'a>(&self, feature_names: &'a [String]) -> &'a str {
        match self.feature_id() {
            Some(id) => &feature_names[id],
            None => "[leaf]",
        }
    }

    pub fn left(&self) -> Option<&DTNode> {
        match self {
            DTNode::Leaf { .. } => None,
            DTNode::Split { left, .. } => Some(left),
        }
    }

    pub fn right(&self) -> Option<&DTNode> {
        match self {
            DTNode::Leaf { .. } => None,
            DTNode::Split { right, .. } => Some(right),
        }
    }

    pub fn tree_size(&self) -> usize {
        match self {
            DTNode::Leaf { .. } => 1,
            DTNode::Split { left, right, .. } => 1 + left.tree_size() + right.tree_size(),
        }
    }

    pub fn max_depth(&self) -> usize {
        match self {
            DTNode::Leaf { .. } => 0,
            DTNode::Split { left, right, .. } => 1 + left.max_depth().max(right.max_depth()),
        }
    }

    pub fn n_leaves(&self) -> usize {
        match self {
            DTNode::Leaf { .. } => 1,
            DTNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }

    /// Collapse this node to a leaf, dropping both children. The label is
    /// re-derived from the stored weights.
    pub fn prune(&mut self) {
        if let DTNode::Split {
            sep_index,
            w_sig,
            w_bg,
            n_sig,
            n_bg,
            ..
        } = *self
        {
            *self = DTNode::Leaf {
                sep_index,
                w_sig,
                w_bg,
                n_sig,
                n_bg,
            };
        }
    }

    /// The leaf an event descends to.
    pub fn trace(&self, values: &[f64]) -> &DTNode {
        let mut node = self;
        while let DTNode::Split {
            feature_id,
            feature_val,
            left,
            right,
            ..
        } = node
        {
            node = if values[*feature_id] < *feature_val {
                left
            } else {
                right
            };
        }
        node
    }

    /// Every node on the path from here to the leaf an event descends to.
    pub fn trace_path(&self, values: &[f64]) -> Vec<&DTNode> {
        let mut out = Vec::new();
        let mut node = self;
        loop {
            out.push(node);
            match node {
                DTNode::Leaf { .. } => return out,
                DTNode::Split {
                    feature_id,
                    feature_val,
                    left,
                    right,
                    ..
                } => {
                    node = if values[*feature_id] < *feature_val {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    fn leaf_score(&self, use_purity: bool) -> f64 {
        if use_purity {
            2. * self.purity() - 1.
        } else {
            f64::from(self.label())
        }
    }
}

/// A single decision tree with its feature-name schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DTModel {
    feature_names: Vec<String>,
    root: DTNode,
}

impl DTModel {
    pub fn new(feature_names: Vec<String>, root: DTNode) -> Self {
        Self {
            feature_names,
            root,
        }
    }

    pub fn root(&self) -> &DTNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut DTNode {
        &mut self.root
    }

    /// Relative importance of each feature over the whole tree.
    ///
    /// Every internal node contributes 1 per use of its feature, or
    /// `(sep_gain * w_total)^2` in separation-weighted mode. The result is
    /// normalized to sum to 1, or all-zero for a single-leaf tree.
    pub fn variable_importance(&self, sep_weighted: bool) -> Vec<f64> {
        let mut abs_var_imp = vec![0.; self.feature_names.len()];
        let mut queue = VecDeque::new();
        queue.push_back(&self.root);
        while let Some(node) = queue.pop_front() {
            accumulate_importance(node, sep_weighted, &mut abs_var_imp);
            if let DTNode::Split { left, right, .. } = node {
                queue.push_back(left);
                queue.push_back(right);
            }
        }
        normalize_importance(abs_var_imp)
    }

    /// Relative importance over only the nodes an event passes through.
    pub fn event_variable_importance(&self, values: &[f64], sep_weighted: bool) -> Vec<f64> {
        let mut abs_var_imp = vec![0.; self.feature_names.len()];
        for node in self.root.trace_path(values) {
            accumulate_importance(node, sep_weighted, &mut abs_var_imp);
        }
        normalize_importance(abs_var_imp)
    }

    /// [`Self::variable_importance`] keyed by feature name.
    pub fn variable_importance_by_name(&self, sep_weighted: bool) -> HashMap<String, f64> {
        importance_by_name(&self.feature_names, self.variable_importance(sep_weighted))
    }
}

impl Model for DTModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn base_score(&self, values: &[f64], use_purity: bool) -> f64 {
        self.root.trace(values).leaf_score(use_purity)
    }
}

impl fmt::Display for DTModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt_node(f, &self.root, &self.feature_names, 0)
    }
}

fn fmt_node(
    f: &mut fmt::Formatter,
    node: &DTNode,
    feature_names: &[String],
    depth: usize,
) -> fmt::Result {
    let indent = 2 * depth;
    match node {
        DTNode::Leaf { .. } => writeln!(
            f,
            "{:indent$}leaf: label {:+}, purity {:.4}",
            "",
            node.label(),
            node.purity(),
        ),
        DTNode::Split {
            feature_val,
            sep_gain,
            left,
            right,
            ..
        } => {
            writeln!(
                f,
                "{:indent$}{} < {} (gain {:.6})",
                "",
                node.feature_name(feature_names),
                feature_val,
                sep_gain,
            )?;
            fmt_node(f, left, feature_names, depth + 1)?;
            fmt_node(f, right, feature_names, depth + 1)
        }
    }
}

fn accumulate_importance(node: &DTNode, sep_weighted: bool, abs_var_imp: &mut [f64]) {
    if let DTNode::Split {
        feature_id,
        sep_gain,
        ..
    } = node
    {
        abs_var_imp[*feature_id] += if sep_weighted {
            (sep_gain * node.w_total()).powi(2)
        } else {
            1.
        };
    }
}

fn normalize_importance(abs_var_imp: Vec<f64>) -> Vec<f64> {
    let sum: f64 = abs_var_imp.iter().sum();
    if sum > 0. {
        abs_var_imp.into_iter().map(|v| v / sum).collect()
    } else {
        abs_var_imp
    }
}

pub(crate) fn importance_by_name(names: &[String], shares: Vec<f64>) -> HashMap<String, f64> {
    names.iter().cloned().zip(shares).collect()
}

/// Serialize a model.
pub fn save<M: Serialize, W: io::Write>(model: &M, writer: W) -> io::Result<()> {
    info!("Saving model...");
    let start_t = Instant::now();

    serde_cbor::to_writer(writer, model)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    info!(
        "Model saved; it took {:.2}s",
        start_t.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Deserialize a model.
pub fn load<M: DeserializeOwned, R: io::Read>(reader: R) -> io::Result<M> {
    info!("Loading model...");
    let start_t = Instant::now();

    let model: M = serde_cbor::from_reader(reader)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

    info!(
        "Model loaded; it took {:.2}s",
        start_t.elapsed().as_secs_f64()
    );
    Ok(model)
}
