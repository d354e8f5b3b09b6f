//! Distance computations and average-linkage agglomerative clustering over
//! unit-length feature vectors.

/// Dot product of two unit-length vectors, i.e. their cosine similarity.
/// Vectors of different dimension are treated as unrelated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| *x as f64 * *y as f64).sum()
}

/// `1 - similarity`, clamped to [0, 1].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 1.0)
}

/// Symmetric pairwise distance matrix with a zero diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    size: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    pub fn from_features(features: &[&[f32]]) -> Self {
        let size = features.len();
        let mut values = vec![0.0; size * size];

        for i in 0..size {
            for j in (i + 1)..size {
                let distance = cosine_distance(features[i], features[j]);
                values[i * size + j] = distance;
                values[j * size + i] = distance;
            }
        }

        Self { size, values }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    /// Average-linkage (UPGMA) agglomeration of every point into one tree.
    pub fn average_linkage(&self) -> Dendrogram {
        let n = self.size;
        let mut distances = self.values.clone();
        let mut active = vec![true; n];
        let mut sizes = vec![1usize; n];
        // node id currently held by each slot: leaves are 0..n, merges n..
        let mut node_ids: Vec<usize> = (0..n).collect();
        let mut merges = Vec::with_capacity(n.saturating_sub(1));

        for step in 0..n.saturating_sub(1) {
            let mut best: Option<(usize, usize, f64)> = None;
            for i in 0..n {
                if !active[i] {
                    continue;
                }
                for j in (i + 1)..n {
                    if !active[j] {
                        continue;
                    }
                    let d = distances[i * n + j];
                    if best.is_none_or(|(_, _, best_d)| d < best_d) {
                        best = Some((i, j, d));
                    }
                }
            }

            let Some((i, j, distance)) = best else {
                break;
            };

            let merged_size = sizes[i] + sizes[j];
            merges.push(Merge {
                left: node_ids[i],
                right: node_ids[j],
                distance,
                size: merged_size,
            });

            // slot i becomes the merged cluster, slot j retires
            for k in 0..n {
                if !active[k] || k == i || k == j {
                    continue;
                }
                let updated = (distances[i * n + k] * sizes[i] as f64
                    + distances[j * n + k] * sizes[j] as f64)
                    / merged_size as f64;
                distances[i * n + k] = updated;
                distances[k * n + i] = updated;
            }

            active[j] = false;
            sizes[i] = merged_size;
            node_ids[i] = n + step;
        }

        Dendrogram { leaves: n, merges }
    }
}

/// One agglomeration step. `left`/`right` below `leaves` are points, higher
/// ids refer to the merge at index `id - leaves`.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    leaves: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    pub fn leaves(&self) -> usize {
        self.leaves
    }

    /// Flat cluster label per point, keeping every merge at or below
    /// `max_distance`. Labels count up from 0 in order of first member.
    pub fn cut(&self, max_distance: f64) -> Vec<usize> {
        let n = self.leaves;
        let mut parent: Vec<usize> = (0..n).collect();
        // representative leaf of every node id
        let mut representative: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }

        for merge in &self.merges {
            let left = representative[merge.left];
            let right = representative[merge.right];
            representative.push(left);

            if merge.distance <= max_distance {
                let left_root = find(&mut parent, left);
                let right_root = find(&mut parent, right);
                if left_root != right_root {
                    parent[right_root] = left_root;
                }
            }
        }

        let mut labels = vec![usize::MAX; n];
        let mut root_labels: Vec<Option<usize>> = vec![None; n];
        let mut next_label = 0;
        for point in 0..n {
            let root = find(&mut parent, point);
            let label = *root_labels[root].get_or_insert_with(|| {
                next_label += 1;
                next_label - 1
            });
            labels[point] = label;
        }

        labels
    }
}
