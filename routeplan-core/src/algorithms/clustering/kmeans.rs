//! This module contains a K-Means implementation with farthest-point seeding.

#[cfg(test)]
#[path = "../../../tests/unit/algorithms/clustering/kmeans_test.rs"]
mod kmeans_test;

use crate::models::Coordinate;
use crate::utils::Random;

/// Represents a cluster as indices of the source points.
pub type ClusterIndices = Vec<usize>;

/// A result of k-means clustering.
#[derive(Clone, Debug)]
pub struct KMeansResult {
    /// Final centroids, one per cluster.
    pub centroids: Vec<Coordinate>,
    /// Point indices assigned to each cluster, in source order.
    pub clusters: Vec<ClusterIndices>,
    /// Amount of iterations done.
    pub iterations: usize,
}

/// Creates `k` clusters of points using K-Means algorithm: centroids are seeded with
/// farthest-point sampling, empty clusters are reseeded to a random point.
pub fn create_kmeans(points: &[Coordinate], k: usize, max_iterations: usize, random: &dyn Random) -> KMeansResult {
    if points.is_empty() || k == 0 {
        return KMeansResult { centroids: vec![], clusters: vec![Vec::default(); k], iterations: 0 };
    }

    KMeans { k, max_iterations, random }.calculate(points)
}

/// Selects `k` seeds: the first point, then repeatedly the point which maximizes its minimum
/// distance to already selected seeds. Ties are resolved in favor of the earlier point.
pub fn select_farthest_points(points: &[Coordinate], k: usize) -> Vec<Coordinate> {
    let Some(first) = points.first() else {
        return vec![];
    };

    let mut seeds = Vec::with_capacity(k);
    seeds.push(*first);

    while seeds.len() < k {
        let next = points
            .iter()
            .map(|point| {
                let min_distance = seeds.iter().map(|seed| point.distance_to(seed)).fold(f64::INFINITY, f64::min);
                (point, min_distance)
            })
            .fold(None, |best: Option<(&Coordinate, f64)>, (point, distance)| match best {
                Some((_, best_distance)) if best_distance >= distance => best,
                _ => Some((point, distance)),
            });

        match next {
            Some((point, _)) => seeds.push(*point),
            None => break,
        }
    }

    seeds
}

/// Returns index of the nearest centroid, the first one wins ties.
pub fn nearest_centroid(point: &Coordinate, centroids: &[Coordinate]) -> Option<usize> {
    centroids
        .iter()
        .enumerate()
        .map(|(idx, centroid)| (idx, point.distance_to(centroid)))
        .min_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(idx, _)| idx)
}

struct KMeans<'a> {
    k: usize,
    max_iterations: usize,
    random: &'a dyn Random,
}

impl KMeans<'_> {
    fn calculate(&self, points: &[Coordinate]) -> KMeansResult {
        let mut centroids = select_farthest_points(points, self.k);
        let mut clusters = self.assign(points, &centroids);
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;

            let new_centroids = self.update(points, &clusters);
            let is_stable = new_centroids.iter().zip(centroids.iter()).all(|(a, b)| a.distance_to(b) < f64::EPSILON);

            centroids = new_centroids;
            clusters = self.assign(points, &centroids);

            if is_stable {
                break;
            }
        }

        KMeansResult { centroids, clusters, iterations }
    }

    fn assign(&self, points: &[Coordinate], centroids: &[Coordinate]) -> Vec<ClusterIndices> {
        points.iter().enumerate().fold(vec![Vec::default(); self.k], |mut clusters, (idx, point)| {
            if let Some(cluster_idx) = nearest_centroid(point, centroids) {
                clusters[cluster_idx].push(idx);
            }

            clusters
        })
    }

    fn update(&self, points: &[Coordinate], clusters: &[ClusterIndices]) -> Vec<Coordinate> {
        clusters
            .iter()
            .map(|cluster| {
                if cluster.is_empty() {
                    // empty cluster: reseed it to a random point
                    return points[self.random.uniform_index(points.len())];
                }

                let (lat, lng) = cluster
                    .iter()
                    .map(|&idx| points[idx])
                    .fold((0., 0.), |(lat, lng), point| (lat + point.lat, lng + point.lng));
                let size = cluster.len() as f64;

                Coordinate::new(lat / size, lng / size)
            })
            .collect()
    }
}
