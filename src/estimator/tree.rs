use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// L2 regularization on gradient-boosted leaf weights.
const LAMBDA: f64 = 1.0;

/// Minimum improvement for a split to be kept.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

/// Binary decision tree stored as a flat node list, root at index 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Leaf value reached by `row`.
    pub fn evaluate(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split { feature, threshold, left, right } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
                Node::Leaf { value } => return value,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Leaf values, in node order.
    pub fn leaves(&self) -> impl Iterator<Item = &[f64]> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Leaf { value } => Some(value.as_slice()),
            Node::Split { .. } => None,
        })
    }

    /// Checks that `evaluate` terminates and stays in bounds for any row of
    /// `n_features` values.
    ///
    /// Children must come after their parent, which rules out cycles.
    pub fn validate(&self, n_features: usize, leaf_len: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".into());
        }
        let n_nodes = self.nodes.len();
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split { feature, threshold, left, right } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            index, feature, n_features
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {} has a non-finite threshold", index));
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= n_nodes {
                            return Err(format!(
                                "node {} points to node {} ({} nodes)",
                                index, child, n_nodes
                            ));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != leaf_len {
                        return Err(format!(
                            "leaf {} holds {} values, expected {}",
                            index,
                            value.len(),
                            leaf_len
                        ));
                    }
                    if value.iter().any(|v| !v.is_finite()) {
                        return Err(format!("leaf {} holds a non-finite value", index));
                    }
                }
            }
        }
        Ok(())
    }
}

/// What a tree is grown against.
pub(crate) enum Target<'a> {
    /// Class indices, leaves hold the class distribution
    Classes { labels: &'a [usize], n_classes: usize },
    /// First and second order log-loss derivatives, leaves hold a Newton step
    Gradients { gradients: &'a [f64], hessians: &'a [f64] },
}

impl Target<'_> {
    fn stats_len(&self) -> usize {
        match self {
            Target::Classes { n_classes, .. } => *n_classes,
            Target::Gradients { .. } => 2,
        }
    }

    fn accumulate(&self, stats: &mut [f64], sample: usize) {
        match self {
            Target::Classes { labels, .. } => stats[labels[sample]] += 1.0,
            Target::Gradients { gradients, hessians } => {
                stats[0] += gradients[sample];
                stats[1] += hessians[sample];
            }
        }
    }

    /// Node quality, higher is better. Split gain is
    /// `quality(left) + quality(right) - quality(parent)`.
    fn quality(&self, stats: &[f64]) -> f64 {
        match self {
            Target::Classes { .. } => {
                // Negative weighted Gini impurity, without the constant term.
                let n: f64 = stats.iter().sum();
                if n == 0.0 {
                    0.0
                } else {
                    stats.iter().map(|c| c * c).sum::<f64>() / n
                }
            }
            Target::Gradients { .. } => stats[0] * stats[0] / (stats[1] + LAMBDA),
        }
    }

    fn leaf(&self, stats: &[f64]) -> Vec<f64> {
        match self {
            Target::Classes { .. } => {
                let n: f64 = stats.iter().sum();
                stats.iter().map(|c| c / n).collect()
            }
            Target::Gradients { .. } => vec![-stats[0] / (stats[1] + LAMBDA)],
        }
    }

    fn is_pure(&self, stats: &[f64]) -> bool {
        match self {
            Target::Classes { .. } => stats.iter().filter(|&&c| c > 0.0).count() <= 1,
            Target::Gradients { .. } => false,
        }
    }
}

/// Grows trees with a fixed set of stopping rules.
pub(crate) struct TreeBuilder {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    /// Features drawn at random per split, all of them when `None`
    pub max_features: Option<usize>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder {
    pub fn grow(
        &self,
        x: ArrayView2<'_, f64>,
        target: &Target<'_>,
        samples: Vec<usize>,
        rng: &mut StdRng,
    ) -> Tree {
        let mut nodes = Vec::new();
        self.build(x, target, samples, 0, rng, &mut nodes);
        Tree { nodes }
    }

    fn build(
        &self,
        x: ArrayView2<'_, f64>,
        target: &Target<'_>,
        samples: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<Node>,
    ) -> usize {
        let id = nodes.len();
        let mut stats = vec![0.0; target.stats_len()];
        for &s in &samples {
            target.accumulate(&mut stats, s);
        }
        nodes.push(Node::Leaf { value: target.leaf(&stats) });

        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
        if depth_reached
            || samples.len() < self.min_samples_split.max(2)
            || target.is_pure(&stats)
        {
            return id;
        }

        let Some(split) = self.best_split(x, target, &samples, &stats, rng) else {
            return id;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| x[[s, split.feature]] <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return id;
        }

        let left_id = self.build(x, target, left, depth + 1, rng, nodes);
        let right_id = self.build(x, target, right, depth + 1, rng, nodes);
        nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: left_id,
            right: right_id,
        };
        id
    }

    fn candidate_features(&self, n_features: usize, rng: &mut StdRng) -> Vec<usize> {
        match self.max_features {
            Some(k) if k < n_features => rand::seq::index::sample(rng, n_features, k).into_vec(),
            _ => (0..n_features).collect(),
        }
    }

    fn best_split(
        &self,
        x: ArrayView2<'_, f64>,
        target: &Target<'_>,
        samples: &[usize],
        parent: &[f64],
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let parent_quality = target.quality(parent);
        let mut best: Option<BestSplit> = None;
        let mut order = samples.to_vec();

        for feature in self.candidate_features(x.ncols(), rng) {
            order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut left = vec![0.0; parent.len()];
            for i in 0..order.len() - 1 {
                target.accumulate(&mut left, order[i]);

                let current = x[[order[i], feature]];
                let next = x[[order[i + 1], feature]];
                if current == next {
                    continue;
                }

                let right: Vec<f64> = parent.iter().zip(&left).map(|(p, l)| p - l).collect();
                let gain = target.quality(&left) + target.quality(&right) - parent_quality;
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: current + (next - current) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}
