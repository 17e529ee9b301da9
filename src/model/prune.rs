//! Tree pruning strategies, applied in place between boosting rounds.

use crate::model::{DTModel, DTNode};
use std::collections::VecDeque;

/// A pruning strategy; `prune` replaces internal nodes of the tree with
/// leaves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pruner {
    /// Collapse internal nodes whose two children are leaves with the same
    /// label.
    SameLeaf,
    /// Weakest-link cost-complexity pruning; `strength` in `[0, 100]` is
    /// the percentage of the prune sequence applied.
    CostComplexity { strength: f64 },
    /// Statistical-error pruning; larger `strength` demands a larger error
    /// reduction from a subtree to survive.
    Error { strength: f64 },
}

impl Pruner {
    pub fn prune(&self, model: &mut DTModel) {
        match *self {
            Pruner::SameLeaf => prune_same_leaf(model.root_mut()),
            Pruner::CostComplexity { strength } => {
                prune_cost_complexity(model.root_mut(), strength)
            }
            Pruner::Error { strength } => {
                prune_error(model.root_mut(), strength);
            }
        }
    }
}

fn prune_same_leaf(node: &mut DTNode) {
    let collapse = if let DTNode::Split { left, right, .. } = node {
        prune_same_leaf(left);
        prune_same_leaf(right);
        left.is_leaf() && right.is_leaf() && left.label() == right.label()
    } else {
        false
    };
    if collapse {
        node.prune();
    }
}

/// Path from the root, one flag per level; `true` descends right.
type NodePath = Vec<bool>;

fn node_mut<'a>(mut node: &'a mut DTNode, path: &[bool]) -> &'a mut DTNode {
    for &go_right in path {
        node = match node {
            DTNode::Split { left, right, .. } => {
                if go_right {
                    right
                } else {
                    left
                }
            }
            DTNode::Leaf { .. } => unreachable!("prune path descends into a leaf"),
        };
    }
    node
}

fn cc_gain(node: &DTNode) -> f64 {
    debug_assert!(node.w_total().is_finite());
    debug_assert!(node.purity().is_finite());
    node.w_total() * node.purity() * (1. - node.purity())
}

fn cc_rho(node: &DTNode) -> f64 {
    match node {
        DTNode::Leaf { .. } => f64::INFINITY,
        DTNode::Split { left, right, .. } => {
            let c = cc_gain(node);
            let c_left = cc_gain(left);
            let c_right = cc_gain(right);
            let rho = (c - (c_left + c_right)) / (node.n_leaves() - 1) as f64;
            debug_assert!(!rho.is_nan());
            rho
        }
    }
}

/// Build the weakest-link prune sequence on a disposable copy, then apply
/// the first `strength` percent of it to the real tree.
fn prune_cost_complexity(root: &mut DTNode, strength: f64) {
    let mut test_root = root.clone();
    let mut prune_sequence: Vec<NodePath> = Vec::with_capacity(test_root.tree_size());
    while !test_root.is_leaf() {
        // internal node with the smallest rho over the current copy; ties
        // go to the last visited in breadth-first order
        let mut next: Option<(f64, NodePath)> = None;
        let mut queue: VecDeque<(&DTNode, NodePath)> = VecDeque::new();
        queue.push_back((&test_root, NodePath::new()));
        while let Some((node, path)) = queue.pop_front() {
            if let DTNode::Split { left, right, .. } = node {
                let rho = cc_rho(node);
                if next.as_ref().map_or(true, |(best, _)| rho <= *best) {
                    next = Some((rho, path.clone()));
                }
                let mut left_path = path.clone();
                left_path.push(false);
                let mut right_path = path;
                right_path.push(true);
                queue.push_back((left, left_path));
                queue.push_back((right, right_path));
            }
        }
        let (_, path) = next.expect("a non-leaf tree has an internal node");
        let pruned_the_root = path.is_empty();
        node_mut(&mut test_root, &path).prune();
        prune_sequence.push(path);
        if pruned_the_root {
            break;
        }
    }
    let prune_count = (strength / 100. * prune_sequence.len() as f64) as usize;
    for path in prune_sequence.iter().take(prune_count) {
        node_mut(root, path).prune();
    }
}

fn error_pruner_node_error(node: &DTNode, strength: f64) -> f64 {
    let w_total = node.w_total();
    let f = node.purity().max(1. - node.purity());
    let df = (f * (1. - f) / w_total).sqrt();
    (1. - (f - strength * df)).min(1.)
}

/// Post-order error pruning. The return value is the subtree error of the
/// node *before* any collapsing, so every decision is made against the
/// unpruned tree.
fn prune_error(node: &mut DTNode, strength: f64) -> f64 {
    let subtree_error = match node {
        DTNode::Leaf { .. } => return error_pruner_node_error(node, strength),
        DTNode::Split { left, right, .. } => {
            let w_left = left.w_total();
            let w_right = right.w_total();
            let left_error = prune_error(left, strength);
            let right_error = prune_error(right, strength);
            (w_left * left_error + w_right * right_error) / (w_left + w_right)
        }
    };
    if subtree_error >= error_pruner_node_error(node, strength) {
        node.prune();
    }
    subtree_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataSet;
    use crate::model::train::{DTLearner, Learner};

    fn leaf(w_sig: f64, w_bg: f64, n_sig: usize, n_bg: usize) -> DTNode {
        DTNode::Leaf {
            sep_index: 0.,
            w_sig,
            w_bg,
            n_sig,
            n_bg,
        }
    }

    fn split(feature_val: f64, left: DTNode, right: DTNode) -> DTNode {
        DTNode::Split {
            sep_gain: 0.1,
            sep_index: 0.25,
            feature_id: 0,
            feature_val,
            w_sig: left.w_sig() + right.w_sig(),
            w_bg: left.w_bg() + right.w_bg(),
            n_sig: left.n_sig() + right.n_sig(),
            n_bg: left.n_bg() + right.n_bg(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// A depth-3 tree grown on overlapping classes.
    fn trained_deep_tree() -> DTModel {
        let sig: Vec<f64> = (0..240).map(|i| f64::from(i % 12)).collect();
        let bg: Vec<f64> = (0..240).map(|i| f64::from(i % 16) - 8.).collect();
        let sig = DataSet::new(vec![("x".to_owned(), sig)]).unwrap();
        let bg = DataSet::new(vec![("x".to_owned(), bg)]).unwrap();
        let mut learner = DTLearner::new(vec!["x".to_owned()]);
        learner.hyper_param_mut().max_depth = 3;
        let model = learner.train(&sig, &bg).unwrap();
        assert!(model.root().max_depth() >= 2, "tree too shallow to prune");
        model
    }

    #[test]
    fn test_same_leaf_collapses_equal_labels() {
        // both leaves label -1
        let root = split(0., leaf(0.1, 0.4, 10, 40), leaf(0.2, 0.3, 20, 30));
        let mut model = DTModel::new(vec!["x".to_owned()], root);
        Pruner::SameLeaf.prune(&mut model);
        assert!(model.root().is_leaf());
        assert_eq!(model.root().label(), -1);
    }

    #[test]
    fn test_same_leaf_keeps_mixed_labels() {
        let root = split(0., leaf(0.1, 0.4, 10, 40), leaf(0.4, 0.1, 40, 10));
        let mut model = DTModel::new(vec!["x".to_owned()], root);
        Pruner::SameLeaf.prune(&mut model);
        assert_eq!(model.root().tree_size(), 3);
    }

    #[test]
    fn test_same_leaf_collapses_recursively_and_is_idempotent() {
        // every leaf votes -1, so the whole tree folds to one leaf
        let lower = split(1., leaf(0.05, 0.2, 5, 20), leaf(0.05, 0.2, 5, 20));
        let root = split(0., lower, leaf(0.1, 0.4, 10, 40));
        let mut model = DTModel::new(vec!["x".to_owned()], root);
        Pruner::SameLeaf.prune(&mut model);
        assert!(model.root().is_leaf());

        let again = model.clone();
        Pruner::SameLeaf.prune(&mut model);
        assert_eq!(model, again);
    }

    #[test]
    fn test_cost_complexity_full_strength_prunes_to_a_single_leaf() {
        let mut model = trained_deep_tree();
        Pruner::CostComplexity { strength: 100. }.prune(&mut model);
        assert_eq!(model.root().tree_size(), 1);
    }

    #[test]
    fn test_cost_complexity_zero_strength_is_a_no_op() {
        let mut model = trained_deep_tree();
        let before = model.clone();
        Pruner::CostComplexity { strength: 0. }.prune(&mut model);
        assert_eq!(model, before);
    }

    #[test]
    fn test_cost_complexity_partial_strength_shrinks_the_tree() {
        let mut model = trained_deep_tree();
        let before_size = model.root().tree_size();
        Pruner::CostComplexity { strength: 50. }.prune(&mut model);
        let after_size = model.root().tree_size();
        assert!(after_size < before_size);
        assert!(after_size >= 1);
    }

    #[test]
    fn test_error_pruner_zero_strength_leaves_only_improving_subtrees() {
        let mut model = trained_deep_tree();
        Pruner::Error { strength: 0. }.prune(&mut model);
        // after pruning, every surviving internal node's subtree error is
        // strictly below its node error, so a second pass changes nothing
        let again = model.clone();
        let mut model_2 = again.clone();
        Pruner::Error { strength: 0. }.prune(&mut model_2);
        assert_eq!(model_2, again);
    }

    #[test]
    fn test_error_pruner_high_strength_prunes_harder() {
        let mut weak = trained_deep_tree();
        let mut strong = weak.clone();
        Pruner::Error { strength: 0. }.prune(&mut weak);
        Pruner::Error { strength: 10. }.prune(&mut strong);
        assert!(strong.root().tree_size() <= weak.root().tree_size());
    }

    #[test]
    fn test_pruning_to_a_single_leaf_is_valid_not_an_error() {
        let root = split(0., leaf(0.3, 0.2, 30, 20), leaf(0.2, 0.3, 20, 30));
        let mut model = DTModel::new(vec!["x".to_owned()], root);
        Pruner::CostComplexity { strength: 100. }.prune(&mut model);
        assert!(model.root().is_leaf());
        // label re-derived from aggregated weights: w_sig == w_bg ties to -1
        assert_eq!(model.root().label(), -1);
    }
}
