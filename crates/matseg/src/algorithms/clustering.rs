use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::debug;
use crate::{
    error::{Result, SegmentError},
    traits::Clusterer,
    types::{ClusterResult, FeatureMatrix},
};

/// Lloyd's k-means with k-means++ seeding and several restarts.
///
/// All restarts draw from one `StdRng` seeded with `seed`, so a given input
/// always yields the same result. The best restart (lowest inertia) wins and
/// its clusters are renumbered by ascending centroid brightness, which makes
/// cluster ids independent of the initialization order.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance, relative to the mean per-feature variance
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeans {
    fn default() -> Self {
        Self {
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-4,
            seed: 42,
        }
    }
}

impl Clusterer for KMeans {
    fn fit(&self, features: &FeatureMatrix, k: usize) -> Result<ClusterResult> {
        if k == 0 {
            return Err(SegmentError::InvalidConfig("cluster count must be at least 1".into()));
        }
        let distinct = features.distinct_rows_up_to(k);
        if distinct < k {
            return Err(SegmentError::DegenerateInput { distinct, requested: k });
        }

        let tol = self.tolerance * mean_variance(features);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut best: Option<Run> = None;

        for attempt in 0..self.n_init.max(1) {
            let seeds = kmeans_plus_plus(features, k, &mut rng);
            let run = lloyd(features, seeds, self.max_iter, tol);
            debug!(attempt, inertia = run.inertia, iterations = run.iterations, "k-means restart finished");
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        let Some(best) = best else {
            return Err(SegmentError::InvalidConfig("k-means produced no run".into()));
        };
        Ok(canonical_order(best))
    }
}

struct Run {
    labels: Vec<usize>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
}

fn squared_distance(a: &[f32], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &c)| {
            let d = x as f64 - c;
            d * d
        })
        .sum()
}

fn nearest(row: &[f32], centroids: &[Vec<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(row, c);
        if d < best.1 {
            best = (i, d);
        }
    }
    best
}

fn mean_variance(features: &FeatureMatrix) -> f64 {
    let n = features.rows() as f64;
    let dim = features.dim();
    let mut sum = vec![0.0f64; dim];
    let mut sum_sq = vec![0.0f64; dim];
    for row in features.iter_rows() {
        for (j, &v) in row.iter().enumerate() {
            let v = v as f64;
            sum[j] += v;
            sum_sq[j] += v * v;
        }
    }
    let total: f64 = (0..dim)
        .map(|j| {
            let mean = sum[j] / n;
            (sum_sq[j] / n - mean * mean).max(0.0)
        })
        .sum();
    total / dim as f64
}

/// D²-weighted seeding.
fn kmeans_plus_plus(features: &FeatureMatrix, k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = features.rows();
    let to_f64 = |row: &[f32]| row.iter().map(|&v| v as f64).collect::<Vec<f64>>();

    let mut centroids = Vec::with_capacity(k);
    centroids.push(to_f64(features.row(rng.gen_range(0..n))));

    let mut closest: Vec<f64> = features
        .iter_rows()
        .map(|row| squared_distance(row, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let pick = if total > 0.0 {
            let target = rng.gen_range(0.0..total);
            let mut acc = 0.0;
            let mut chosen = closest.iter().rposition(|&d| d > 0.0).unwrap_or(n - 1);
            for (i, &d) in closest.iter().enumerate() {
                acc += d;
                if acc > target && d > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };

        let centroid = to_f64(features.row(pick));
        for (i, row) in features.iter_rows().enumerate() {
            let d = squared_distance(row, &centroid);
            if d < closest[i] {
                closest[i] = d;
            }
        }
        centroids.push(centroid);
    }
    centroids
}

fn lloyd(features: &FeatureMatrix, mut centroids: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> Run {
    let k = centroids.len();
    let dim = features.dim();
    let mut labels = vec![0usize; features.rows()];
    let mut distances = vec![0.0f64; features.rows()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        assign(features, &centroids, &mut labels, &mut distances);

        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];
        for (row, &label) in features.iter_rows().zip(&labels) {
            counts[label] += 1;
            for (s, &v) in sums[label].iter_mut().zip(row) {
                *s += v as f64;
            }
        }

        let mut updated: Vec<Vec<f64>> = sums
            .into_iter()
            .zip(&counts)
            .zip(&centroids)
            .map(|((sum, &count), old)| {
                if count == 0 {
                    old.clone()
                } else {
                    sum.into_iter().map(|s| s / count as f64).collect()
                }
            })
            .collect();

        // An emptied cluster takes over the point worst served by its centroid.
        for cluster in 0..k {
            if counts[cluster] == 0 {
                if let Some((far, _)) = distances
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.total_cmp(b.1))
                {
                    updated[cluster] = features.row(far).iter().map(|&v| v as f64).collect();
                    distances[far] = 0.0;
                }
            }
        }

        let shift: f64 = centroids
            .iter()
            .zip(&updated)
            .map(|(old, new)| old.iter().zip(new).map(|(a, b)| (a - b) * (a - b)).sum::<f64>())
            .sum();
        centroids = updated;

        if shift <= tol {
            break;
        }
    }

    assign(features, &centroids, &mut labels, &mut distances);
    let inertia = distances.iter().sum();
    Run { labels, centroids, inertia, iterations }
}

fn assign(features: &FeatureMatrix, centroids: &[Vec<f64>], labels: &mut [usize], distances: &mut [f64]) {
    for (i, row) in features.iter_rows().enumerate() {
        let (label, d) = nearest(row, centroids);
        labels[i] = label;
        distances[i] = d;
    }
}

/// Renumber clusters by ascending centroid sum, ties keeping the original order.
fn canonical_order(run: Run) -> ClusterResult {
    let k = run.centroids.len();
    let score = |c: &Vec<f64>| c.iter().sum::<f64>();

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| {
        score(&run.centroids[a])
            .total_cmp(&score(&run.centroids[b]))
            .then(a.cmp(&b))
    });

    let mut remap = vec![0usize; k];
    for (new_id, &old_id) in order.iter().enumerate() {
        remap[old_id] = new_id;
    }

    ClusterResult {
        labels: run.labels.iter().map(|&l| remap[l]).collect(),
        centroids: order
            .iter()
            .map(|&old| run.centroids[old].iter().map(|&v| v as f32).collect())
            .collect(),
        inertia: run.inertia,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_groups() -> FeatureMatrix {
        let mut data = Vec::new();
        for i in 0..20 {
            data.push(200.0 + (i % 3) as f32);
        }
        for i in 0..30 {
            data.push(20.0 + (i % 4) as f32);
        }
        FeatureMatrix::new(data, 1).expect("Should build matrix")
    }

    #[test]
    fn test_separates_two_groups() {
        let result = KMeans::default().fit(&two_groups(), 2).expect("Should cluster");

        assert_eq!(result.labels.len(), 50);
        assert_eq!(result.k(), 2);
        // Darker cluster is numbered first
        assert!(result.labels[..20].iter().all(|&l| l == 1));
        assert!(result.labels[20..].iter().all(|&l| l == 0));
        assert_eq!(result.counts(), vec![30, 20]);
        assert!(result.centroid_score(0) < result.centroid_score(1));
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let features = FeatureMatrix::new(
            (0..300).map(|i| ((i * 37) % 255) as f32).collect(),
            1,
        )
        .expect("Should build matrix");
        let engine = KMeans::default();
        let a = engine.fit(&features, 2).expect("Should cluster");
        let b = engine.fit(&features, 2).expect("Should cluster");
        assert_eq!(a, b);
    }

    #[test]
    fn test_identical_rows_are_degenerate() {
        let features = FeatureMatrix::new(vec![5.0; 16], 1).expect("Should build matrix");
        let err = KMeans::default().fit(&features, 2).unwrap_err();
        assert!(matches!(err, SegmentError::DegenerateInput { distinct: 1, requested: 2 }));
    }

    #[test]
    fn test_empty_input_is_degenerate() {
        let features = FeatureMatrix::new(Vec::new(), 3).expect("Should build matrix");
        let err = KMeans::default().fit(&features, 2).unwrap_err();
        assert!(matches!(err, SegmentError::DegenerateInput { distinct: 0, .. }));
    }

    #[test]
    fn test_three_color_clusters() {
        let mut data = Vec::new();
        for _ in 0..10 {
            data.extend([250.0, 10.0, 10.0]);
            data.extend([10.0, 10.0, 10.0]);
            data.extend([250.0, 250.0, 250.0]);
        }
        let features = FeatureMatrix::new(data, 3).expect("Should build matrix");
        let result = KMeans::default().fit(&features, 3).expect("Should cluster");

        assert_eq!(result.counts(), vec![10, 10, 10]);
        assert_eq!(&result.labels[0..3], &[1, 0, 2]);
        assert!(result.inertia < 1e-6);
    }

    #[test]
    fn test_exactly_k_distinct_values() {
        let features = FeatureMatrix::new(vec![0.0, 0.0, 1.0, 0.0], 1).expect("Should build matrix");
        let result = KMeans::default().fit(&features, 2).expect("Should cluster");
        assert_eq!(result.labels, vec![0, 0, 1, 0]);
    }
}
