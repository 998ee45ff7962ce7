//! Feature binning and leaf-wise histogram tree growth shared by the
//! histogram-based boosters.

use crate::error::{BenchError, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Per-feature bin thresholds.
///
/// A value `v` falls in bin `#{t : t < v}`; NaN goes to the missing bin,
/// which is always the last one (`max_bins`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BinMapper {
    max_bins: usize,
    thresholds: Vec<Vec<f64>>,
}

impl BinMapper {
    pub(crate) fn fit(x: &Array2<f64>, max_bins: usize) -> Result<Self> {
        if !(2..=255).contains(&max_bins) {
            return Err(BenchError::invalid_param(
                "max_bins",
                max_bins,
                "must be in [2, 255]",
            ));
        }

        let thresholds = x
            .columns()
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|col| feature_thresholds(col, max_bins))
            .collect();

        Ok(Self {
            max_bins,
            thresholds,
        })
    }

    pub(crate) fn missing_bin(&self) -> u8 {
        self.max_bins as u8
    }

    pub(crate) fn n_features(&self) -> usize {
        self.thresholds.len()
    }

    fn bin_value(&self, feature: usize, value: f64) -> u8 {
        if value.is_nan() {
            return self.missing_bin();
        }
        self.thresholds[feature].partition_point(|&t| t < value) as u8
    }

    /// Bin every cell, stored column-major
    pub(crate) fn transform(&self, x: &Array2<f64>) -> Result<BinnedMatrix> {
        if x.ncols() != self.n_features() {
            return Err(BenchError::Shape {
                expected: format!("{} features", self.n_features()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let columns = (0..self.n_features())
            .into_par_iter()
            .map(|f| x.column(f).iter().map(|&v| self.bin_value(f, v)).collect())
            .collect();

        Ok(BinnedMatrix {
            columns,
            n_rows: x.nrows(),
        })
    }
}

fn feature_thresholds(col: ArrayView1<f64>, max_bins: usize) -> Vec<f64> {
    let mut values: Vec<f64> = col.iter().copied().filter(|v| !v.is_nan()).collect();
    values.sort_by(f64::total_cmp);

    let mut distinct = values.clone();
    distinct.dedup();

    if distinct.len() <= max_bins {
        return distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();
    }

    // Quantiles with linear interpolation
    let last = (values.len() - 1) as f64;
    let mut thresholds: Vec<f64> = (1..max_bins)
        .map(|k| {
            let pos = last * k as f64 / max_bins as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
        })
        .collect();
    thresholds.dedup();
    thresholds
}

/// Column-major binned feature matrix
#[derive(Debug, Clone)]
pub(crate) struct BinnedMatrix {
    columns: Vec<Vec<u8>>,
    n_rows: usize,
}

impl BinnedMatrix {
    pub(crate) fn n_rows(&self) -> usize {
        self.n_rows
    }

    fn get(&self, row: usize, feature: usize) -> u8 {
        self.columns[feature][row]
    }
}

/// Constraints on tree growth
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowerParams {
    pub max_leaf_nodes: usize,
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub min_hessian_leaf: f64,
    pub l2_regularization: f64,
    pub l1_regularization: f64,
    pub min_gain_to_split: f64,
    /// Multiplier applied to every leaf value
    pub shrinkage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum HistNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        bin: u8,
        threshold: f64,
        missing_go_left: bool,
        left: usize,
        right: usize,
    },
}

/// A fitted regression tree over binned features, stored as an arena
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct HistTree {
    nodes: Vec<HistNode>,
}

impl HistTree {
    pub(crate) fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                HistNode::Leaf { value } => return *value,
                HistNode::Split {
                    feature,
                    threshold,
                    missing_go_left,
                    left,
                    right,
                    ..
                } => {
                    let v = row[*feature];
                    let go_left = if v.is_nan() {
                        *missing_go_left
                    } else {
                        v <= *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    pub(crate) fn predict_binned(&self, binned: &BinnedMatrix, row: usize, missing_bin: u8) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                HistNode::Leaf { value } => return *value,
                HistNode::Split {
                    feature,
                    bin,
                    missing_go_left,
                    left,
                    right,
                    ..
                } => {
                    let b = binned.get(row, *feature);
                    let go_left = if b == missing_bin {
                        *missing_go_left
                    } else {
                        b <= *bin
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }

    pub(crate) fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, HistNode::Leaf { .. }))
            .count()
    }

    pub(crate) fn depth(&self) -> usize {
        fn walk(nodes: &[HistNode], idx: usize) -> usize {
            match &nodes[idx] {
                HistNode::Leaf { .. } => 0,
                HistNode::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BinStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl BinStats {
    fn add(&mut self, other: &BinStats) {
        self.grad += other.grad;
        self.hess += other.hess;
        self.count += other.count;
    }

    fn sub(&self, other: &BinStats) -> BinStats {
        BinStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }
}

#[derive(Debug, Clone)]
struct SplitInfo {
    gain: f64,
    node_id: usize,
    feature: usize,
    bin: u8,
    missing_go_left: bool,
    left: BinStats,
    right: BinStats,
}

impl PartialEq for SplitInfo {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SplitInfo {}

impl PartialOrd for SplitInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SplitInfo {
    // Max-heap on gain; earlier nodes win ties
    fn cmp(&self, other: &Self) -> Ordering {
        self.gain
            .total_cmp(&other.gain)
            .then_with(|| other.node_id.cmp(&self.node_id))
    }
}

/// Leaf-wise (best-first) tree grower on gradient histograms
pub(crate) struct TreeGrower<'a> {
    binned: &'a BinnedMatrix,
    mapper: &'a BinMapper,
    gradients: &'a [f64],
    hessians: &'a [f64],
    params: GrowerParams,
}

impl<'a> TreeGrower<'a> {
    pub(crate) fn new(
        binned: &'a BinnedMatrix,
        mapper: &'a BinMapper,
        gradients: &'a [f64],
        hessians: &'a [f64],
        params: GrowerParams,
    ) -> Self {
        Self {
            binned,
            mapper,
            gradients,
            hessians,
            params,
        }
    }

    fn leaf_value(&self, stats: &BinStats) -> f64 {
        let l1 = self.params.l1_regularization;
        let g = if stats.grad.abs() <= l1 {
            0.0
        } else {
            stats.grad - l1 * stats.grad.signum()
        };
        let denom = stats.hess + self.params.l2_regularization;
        if denom <= 0.0 {
            return 0.0;
        }
        -g / denom * self.params.shrinkage
    }

    fn score(&self, stats: &BinStats) -> f64 {
        let denom = stats.hess + self.params.l2_regularization;
        if denom <= 0.0 {
            0.0
        } else {
            stats.grad * stats.grad / denom
        }
    }

    fn node_stats(&self, samples: &[usize]) -> BinStats {
        samples.iter().fold(BinStats::default(), |mut acc, &i| {
            acc.grad += self.gradients[i];
            acc.hess += self.hessians[i];
            acc.count += 1;
            acc
        })
    }

    fn histogram(&self, samples: &[usize], feature: usize) -> Vec<BinStats> {
        let mut hist = vec![BinStats::default(); self.mapper.max_bins + 1];
        for &i in samples {
            let b = &mut hist[self.binned.get(i, feature) as usize];
            b.grad += self.gradients[i];
            b.hess += self.hessians[i];
            b.count += 1;
        }
        hist
    }

    fn admissible(&self, left: &BinStats, right: &BinStats) -> bool {
        left.count >= self.params.min_samples_leaf
            && right.count >= self.params.min_samples_leaf
            && left.hess >= self.params.min_hessian_leaf
            && right.hess >= self.params.min_hessian_leaf
    }

    fn best_split_for_feature(
        &self,
        samples: &[usize],
        feature: usize,
        total: &BinStats,
        node_id: usize,
    ) -> Option<SplitInfo> {
        let hist = self.histogram(samples, feature);
        let missing = hist[self.mapper.missing_bin() as usize];
        let n_bins = self.mapper.thresholds[feature].len() + 1;
        let parent_score = self.score(total);

        let mut best: Option<SplitInfo> = None;
        let mut cumulative = BinStats::default();

        for bin in 0..n_bins - 1 {
            cumulative.add(&hist[bin]);

            let directions: &[bool] = if missing.count > 0 {
                &[false, true]
            } else {
                &[false]
            };

            for &missing_left in directions {
                let mut left = cumulative;
                if missing_left {
                    left.add(&missing);
                }
                let right = total.sub(&left);
                if !self.admissible(&left, &right) {
                    continue;
                }

                let gain = self.score(&left) + self.score(&right) - parent_score;
                if gain <= self.params.min_gain_to_split {
                    continue;
                }
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let missing_go_left = if missing.count > 0 {
                        missing_left
                    } else {
                        left.count >= right.count
                    };
                    best = Some(SplitInfo {
                        gain,
                        node_id,
                        feature,
                        bin: bin as u8,
                        missing_go_left,
                        left,
                        right,
                    });
                }
            }
        }

        best
    }

    fn find_split(
        &self,
        samples: &[usize],
        features: &[usize],
        total: &BinStats,
        node_id: usize,
        depth: usize,
    ) -> Option<SplitInfo> {
        if self.params.max_depth.map_or(false, |d| depth >= d)
            || total.count < 2 * self.params.min_samples_leaf.max(1)
        {
            return None;
        }

        features
            .par_iter()
            .filter_map(|&f| self.best_split_for_feature(samples, f, total, node_id))
            .max_by(|a, b| a.gain.total_cmp(&b.gain).then_with(|| b.feature.cmp(&a.feature)))
    }

    /// Grow one tree over `samples` using the candidate `features`
    pub(crate) fn grow(&self, samples: &[usize], features: &[usize]) -> HistTree {
        struct OpenLeaf {
            samples: Vec<usize>,
            depth: usize,
        }

        let root_stats = self.node_stats(samples);
        let mut nodes = vec![HistNode::Leaf {
            value: self.leaf_value(&root_stats),
        }];
        let mut open: Vec<Option<OpenLeaf>> = vec![Some(OpenLeaf {
            samples: samples.to_vec(),
            depth: 0,
        })];

        let mut heap = BinaryHeap::new();
        if let Some(split) = self.find_split(samples, features, &root_stats, 0, 0) {
            heap.push(split);
        }

        let mut n_leaves = 1;
        while n_leaves < self.params.max_leaf_nodes.max(1) {
            let Some(split) = heap.pop() else { break };
            let Some(leaf) = open[split.node_id].take() else {
                continue;
            };

            let missing_bin = self.mapper.missing_bin();
            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
                leaf.samples.iter().partition(|&&i| {
                    let b = self.binned.get(i, split.feature);
                    if b == missing_bin {
                        split.missing_go_left
                    } else {
                        b <= split.bin
                    }
                });

            let left_id = nodes.len();
            let right_id = left_id + 1;
            nodes.push(HistNode::Leaf {
                value: self.leaf_value(&split.left),
            });
            nodes.push(HistNode::Leaf {
                value: self.leaf_value(&split.right),
            });
            nodes[split.node_id] = HistNode::Split {
                feature: split.feature,
                bin: split.bin,
                threshold: self.mapper.thresholds[split.feature][split.bin as usize],
                missing_go_left: split.missing_go_left,
                left: left_id,
                right: right_id,
            };
            n_leaves += 1;

            let depth = leaf.depth + 1;
            for (id, child_samples, stats) in [
                (left_id, left_samples, split.left),
                (right_id, right_samples, split.right),
            ] {
                if let Some(s) = self.find_split(&child_samples, features, &stats, id, depth) {
                    heap.push(s);
                }
                open.push(Some(OpenLeaf {
                    samples: child_samples,
                    depth,
                }));
            }
        }

        HistTree { nodes }
    }
}
