//! Binary dissimilarity and Ward agglomerative clustering.
//!
//! Distances are the asymmetric binary ("Jaccard") distance between incidence
//! rows. Clustering uses Ward's minimum-variance criterion through the
//! Lance–Williams recurrence on squared distances; reported merge heights are
//! the square root of the merged pair's updated squared distance (Ward D2).
//! Everything is deterministic: the closest pair is found by a fixed
//! row-major scan and the first minimum wins.

use crate::aggregate::IncidenceMatrix;

/// Symmetric distance matrix stored as its strict upper triangle.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    condensed: Vec<f64>,
}

impl DistanceMatrix {
    /// Build from a full function over index pairs `i < j`.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut condensed = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                condensed.push(f(i, j));
            }
        }
        Self { n, condensed }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Distance between `i` and `j`; zero on the diagonal.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        // Offset of row i in the condensed upper triangle.
        let row_start = i * self.n - i * (i + 1) / 2;
        self.condensed[row_start + (j - i - 1)]
    }
}

/// Binary distance between two presence vectors.
///
/// Among positions where at least one vector is set, the fraction where
/// exactly one is set. Positions where both are unset are ignored; two
/// all-unset vectors are at distance 0.
pub fn binary_distance(a: &[bool], b: &[bool]) -> f64 {
    let mut either = 0usize;
    let mut differ = 0usize;
    for (&x, &y) in a.iter().zip(b) {
        if x || y {
            either += 1;
            if x != y {
                differ += 1;
            }
        }
    }
    if either == 0 {
        0.0
    } else {
        differ as f64 / either as f64
    }
}

/// Pairwise binary distances between every paper row of the matrix.
pub fn binary_distances(matrix: &IncidenceMatrix) -> DistanceMatrix {
    DistanceMatrix::from_fn(matrix.n_papers(), |i, j| {
        binary_distance(matrix.row(i), matrix.row(j))
    })
}

/// A dendrogram node: an original observation or an earlier merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Leaf(usize),
    /// Index into [`Dendrogram::merges`].
    Cluster(usize),
}

/// One agglomeration step.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: Node,
    pub right: Node,
    pub height: f64,
    /// Number of leaves under this merge.
    pub size: usize,
}

/// Result of hierarchical clustering: leaf labels plus `n - 1` merges in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    pub labels: Vec<String>,
    pub merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn n_leaves(&self) -> usize {
        self.labels.len()
    }

    pub fn root(&self) -> Option<Node> {
        match (self.merges.len(), self.labels.len()) {
            (0, 0) => None,
            (0, _) => Some(Node::Leaf(0)),
            (m, _) => Some(Node::Cluster(m - 1)),
        }
    }

    /// Leaves in drawing order (left subtree before right, from the root).
    pub fn leaf_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.labels.len());
        let Some(root) = self.root() else {
            return order;
        };
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node {
                Node::Leaf(i) => order.push(i),
                Node::Cluster(m) => {
                    stack.push(self.merges[m].right);
                    stack.push(self.merges[m].left);
                }
            }
        }
        order
    }

    pub fn max_height(&self) -> f64 {
        self.merges.iter().map(|m| m.height).fold(0.0, f64::max)
    }
}

struct Active {
    node: Node,
    size: usize,
}

/// Ward minimum-variance agglomerative clustering over `distances`.
///
/// `labels` names the observations, in the same order as the matrix.
pub fn ward_linkage(distances: &DistanceMatrix, labels: Vec<String>) -> Dendrogram {
    let n = distances.len();
    debug_assert_eq!(n, labels.len());

    // Full squared-distance matrix, updated in place as clusters merge.
    let mut d2: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| distances.get(i, j).powi(2)).collect())
        .collect();
    let mut active: Vec<Option<Active>> = (0..n)
        .map(|i| {
            Some(Active {
                node: Node::Leaf(i),
                size: 1,
            })
        })
        .collect();
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for _ in 1..n {
        let Some((i, j)) = closest_pair(&d2, &active) else {
            break;
        };
        let (Some(a), Some(b)) = (active[i].take(), active[j].take()) else {
            break;
        };
        let dij = d2[i][j];

        for k in 0..n {
            let Some(c) = active[k].as_ref() else {
                continue;
            };
            let (ni, nj, nk) = (a.size as f64, b.size as f64, c.size as f64);
            let updated = ((ni + nk) * d2[i][k] + (nj + nk) * d2[j][k] - nk * dij) / (ni + nj + nk);
            d2[i][k] = updated;
            d2[k][i] = updated;
        }

        let size = a.size + b.size;
        merges.push(Merge {
            left: a.node,
            right: b.node,
            height: dij.max(0.0).sqrt(),
            size,
        });
        active[i] = Some(Active {
            node: Node::Cluster(merges.len() - 1),
            size,
        });
    }

    Dendrogram { labels, merges }
}

/// The active pair `(i, j)`, `i < j`, with the smallest squared distance.
fn closest_pair(d2: &[Vec<f64>], active: &[Option<Active>]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for i in 0..active.len() {
        if active[i].is_none() {
            continue;
        }
        for j in (i + 1)..active.len() {
            if active[j].is_none() {
                continue;
            }
            let d = d2[i][j];
            if best.is_none_or(|(_, _, b)| d < b) {
                best = Some((i, j, d));
            }
        }
    }
    best.map(|(i, j, _)| (i, j))
}
